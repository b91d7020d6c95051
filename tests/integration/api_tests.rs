//! API integration tests
//!
//! Tests the API endpoints with real requests against the full router.

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::common::*;

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = TestApp::new().await;
    let response = app.get_anonymous("/api/v1/health").await;

    response.assert_ok();

    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_detailed_health_reports_integrations() {
    let app = TestApp::new().await;
    let response = app.get_anonymous("/api/v1/health/detailed").await;

    response.assert_ok();

    let json: Value = response.json();
    assert_eq!(json["components"]["database"]["status"], "healthy");
    assert_eq!(json["components"]["generation"]["status"], "not_configured");
    assert_eq!(json["components"]["workflow"]["status"], "not_configured");
}

#[tokio::test]
async fn test_detailed_health_probes_configured_integrations() {
    let generation = mock_generation_api("unused", 0, 0).await;
    let mut config = test_config();
    config.generation = Some(generation_config(&generation));
    config.workflow = Some(campaign_hub::config::WorkflowConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        ..workflow_config(&generation)
    });
    let app = TestApp::with_config(config).await;

    let response = app.get_anonymous("/api/v1/health/detailed").await;
    response.assert_ok();

    let json: Value = response.json();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["components"]["generation"]["status"], "reachable");
    assert!(json["components"]["generation"]["http_status"].is_u64());
    assert_eq!(json["components"]["workflow"]["status"], "unreachable");
    assert!(json["components"]["workflow"]["message"].is_string());
}

#[tokio::test]
async fn test_liveness_and_readiness_probes() {
    let app = TestApp::new().await;
    app.get_anonymous("/api/v1/health/live").await.assert_ok();
    app.get_anonymous("/api/v1/health/ready").await.assert_ok();
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new().await;

    let response = app.get_anonymous("/api/v1/campaigns").await;
    response.assert_unauthorized();
    let json: Value = response.json();
    assert_eq!(json["error"], "unauthorized");

    app.get_as("not-a-jwt", "/api/v1/campaigns")
        .await
        .assert_unauthorized();
}

#[tokio::test]
async fn test_campaign_crud() {
    let app = TestApp::new().await;

    let campaign = create_campaign(&app, &app.token, "Spring launch").await;
    let id = id_of(&campaign);
    assert_eq!(campaign["owner_id"], app.user_id.to_string());

    let fetched: Value = app.get(&format!("/api/v1/campaigns/{}", id)).await.json();
    assert_eq!(fetched["name"], "Spring launch");

    let response = app
        .put_json(
            &format!("/api/v1/campaigns/{}", id),
            json!({ "name": "Summer launch", "description": "" }),
        )
        .await;
    response.assert_ok();
    let updated: Value = response.json();
    assert_eq!(updated["name"], "Summer launch");
    assert!(updated["description"].is_null());

    let list: Vec<Value> = app.get("/api/v1/campaigns").await.json();
    assert_eq!(list.len(), 1);

    app.delete(&format!("/api/v1/campaigns/{}", id))
        .await
        .assert_no_content();
    app.get(&format!("/api/v1/campaigns/{}", id))
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_campaign_validation() {
    let app = TestApp::new().await;

    app.post_json("/api/v1/campaigns", json!({ "name": "" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let starts = Utc::now() + Duration::days(10);
    let ends = Utc::now() + Duration::days(1);
    app.post_json(
        "/api/v1/campaigns",
        json!({ "name": "Backwards", "starts_at": starts, "ends_at": ends }),
    )
    .await
    .assert_bad_request();

    app.get("/api/v1/campaigns/not-a-uuid")
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_campaign_objects_listed_under_campaign() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;

    let objects: Vec<Value> = app
        .get(&format!("/api/v1/campaigns/{}/objects", setup.campaign_id))
        .await
        .json();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0]["status"], "draft");

    let filtered: Vec<Value> = app
        .get(&format!(
            "/api/v1/campaign-objects?campaign_id={}",
            setup.campaign_id
        ))
        .await
        .json();
    assert_eq!(filtered.len(), 1);

    app.get(&format!("/api/v1/campaigns/{}/objects", uuid::Uuid::new_v4()))
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_object_status_workflow() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let uri = format!("/api/v1/campaign-objects/{}/status", setup.object_id);

    app.post_json(&uri, json!({ "status": "approved" }))
        .await
        .assert_conflict();

    let review: Value = app.post_json(&uri, json!({ "status": "review" })).await.json();
    assert_eq!(review["status"], "review");

    let approved: Value = app
        .post_json(&uri, json!({ "status": "approved" }))
        .await
        .json();
    assert_eq!(approved["status"], "approved");
}

#[tokio::test]
async fn test_object_media_url_must_be_a_url() {
    let app = TestApp::new().await;
    let campaign = create_campaign(&app, &app.token, "Media").await;

    app.post_json(
        "/api/v1/campaign-objects",
        json!({
            "campaign_id": id_of(&campaign),
            "title": "Hero image",
            "object_type": "image",
            "media_url": "not a url"
        }),
    )
    .await
    .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_account_deactivation() {
    let app = TestApp::new().await;
    let account = create_account(&app, &app.token).await;
    assert_eq!(account["is_active"], true);

    let updated: Value = app
        .put_json(
            &format!("/api/v1/accounts/{}", id_of(&account)),
            json!({ "is_active": false }),
        )
        .await
        .json();
    assert_eq!(updated["is_active"], false);
    assert_eq!(updated["platform"], "linkedin");
}

#[tokio::test]
async fn test_publication_draft_then_schedule() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;

    let publication =
        create_publication(&app, &app.token, setup.object_id, setup.account_id, None).await;
    assert_eq!(publication["status"], "draft");

    let at = Utc::now() + Duration::hours(3);
    let response = app
        .post_json(
            &format!("/api/v1/publications/{}/schedule", id_of(&publication)),
            json!({ "scheduled_at": at }),
        )
        .await;
    response.assert_ok();
    let scheduled: Value = response.json();
    assert_eq!(scheduled["status"], "scheduled");

    // Rescheduling keeps it scheduled
    let later = at + Duration::hours(1);
    let rescheduled: Value = app
        .post_json(
            &format!("/api/v1/publications/{}/schedule", id_of(&publication)),
            json!({ "scheduled_at": later }),
        )
        .await
        .json();
    assert_eq!(rescheduled["status"], "scheduled");
    assert_ne!(rescheduled["scheduled_at"], scheduled["scheduled_at"]);
}

#[tokio::test]
async fn test_publication_calendar_window() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let base = Utc::now() + Duration::days(7);

    for offset in [0, 2, 30] {
        create_publication(
            &app,
            &app.token,
            setup.object_id,
            setup.account_id,
            Some(base + Duration::days(offset)),
        )
        .await;
    }
    create_publication(&app, &app.token, setup.object_id, setup.account_id, None).await;

    let from = (base - Duration::hours(1)).format("%Y-%m-%dT%H:%M:%SZ");
    let to = (base + Duration::days(3)).format("%Y-%m-%dT%H:%M:%SZ");
    let window: Vec<Value> = app
        .get(&format!("/api/v1/publications?from={}&to={}", from, to))
        .await
        .json();
    assert_eq!(window.len(), 2);

    let drafts: Vec<Value> = app.get("/api/v1/publications?status=draft").await.json();
    assert_eq!(drafts.len(), 1);

    app.get(&format!("/api/v1/publications?from={}&to={}", to, from))
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_publication_delete() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let publication =
        create_publication(&app, &app.token, setup.object_id, setup.account_id, None).await;
    let uri = format!("/api/v1/publications/{}", id_of(&publication));

    app.delete(&uri).await.assert_no_content();
    app.get(&uri).await.assert_not_found();
}

#[tokio::test]
async fn test_generation_without_configuration() {
    let app = TestApp::new().await;

    let response = app
        .post_json(
            "/api/v1/generation/text",
            json!({ "content_type": "post", "prompt": "Announce our launch" }),
        )
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = response.json();
    assert_eq!(json["error"], "not_configured");
}

#[tokio::test]
async fn test_dispatch_endpoint_accepts() {
    let app = TestApp::new().await;

    let response = app.post_json("/api/v1/publications/dispatch", json!({})).await;
    response.assert_status(StatusCode::ACCEPTED);
    let json: Value = response.json();
    assert_eq!(json["status"], "accepted");
}

#[tokio::test]
async fn test_audit_log_lists_own_entries() {
    let app = TestApp::new().await;
    let campaign = create_campaign(&app, &app.token, "Audited").await;

    let logs: Vec<Value> = app
        .get(&format!(
            "/api/v1/audit-logs?entity_type=Campaign&entity_id={}",
            id_of(&campaign)
        ))
        .await
        .json();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["action"], "create");
    assert_eq!(logs[0]["new_values"]["name"], "Audited");
    assert!(logs[0]["old_values"].is_null());

    let other = app.token_for(uuid::Uuid::new_v4());
    let foreign: Vec<Value> = app.get_as(&other, "/api/v1/audit-logs").await.json();
    assert!(foreign.is_empty());

    let single = app
        .get_as(&other, &format!("/api/v1/audit-logs/{}", logs[0]["id"].as_str().unwrap()))
        .await;
    single.assert_not_found();
}

#[tokio::test]
async fn test_parents_of_in_flight_publication_cannot_be_deleted() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let publication = create_publication(
        &app,
        &app.token,
        setup.object_id,
        setup.account_id,
        Some(Utc::now() - Duration::minutes(1)),
    )
    .await;
    let publication_id = id_of(&publication);

    sqlx::query(
        "UPDATE publications SET status = 'publishing', claimed_by = 'dispatcher-busy', claimed_at = ? WHERE id = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(publication_id.to_string())
    .execute(&app.state.db)
    .await
    .unwrap();

    for uri in [
        format!("/api/v1/accounts/{}", setup.account_id),
        format!("/api/v1/campaign-objects/{}", setup.object_id),
        format!("/api/v1/campaigns/{}", setup.campaign_id),
    ] {
        app.delete(&uri).await.assert_conflict();
    }

    let still_there: Value = app
        .get(&format!("/api/v1/publications/{}", publication_id))
        .await
        .json();
    assert_eq!(still_there["status"], "publishing");
}

#[tokio::test]
async fn test_parents_of_settled_publication_can_be_deleted() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let publication = create_publication(
        &app,
        &app.token,
        setup.object_id,
        setup.account_id,
        Some(Utc::now() + Duration::hours(1)),
    )
    .await;

    app.delete(&format!("/api/v1/accounts/{}", setup.account_id))
        .await
        .assert_no_content();
    app.get(&format!("/api/v1/publications/{}", id_of(&publication)))
        .await
        .assert_not_found();
}
