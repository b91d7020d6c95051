//! Owner scoping tests
//!
//! One user's data is invisible to another: lists come back empty and
//! direct lookups look exactly like a missing record.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::common::*;

struct TwoUsers {
    app: TestApp,
    other: String,
    setup: ContentSetup,
    publication_id: Uuid,
}

async fn two_users() -> TwoUsers {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let publication =
        create_publication(&app, &app.token, setup.object_id, setup.account_id, None).await;
    let other = app.token_for(Uuid::new_v4());

    TwoUsers {
        publication_id: id_of(&publication),
        app,
        other,
        setup,
    }
}

#[tokio::test]
async fn test_lists_are_scoped_to_owner() {
    let t = two_users().await;

    for uri in [
        "/api/v1/campaigns",
        "/api/v1/campaign-objects",
        "/api/v1/accounts",
        "/api/v1/publications",
    ] {
        let own: Vec<Value> = t.app.get(uri).await.json();
        assert_eq!(own.len(), 1, "owner should see one record at {}", uri);

        let foreign: Vec<Value> = t.app.get_as(&t.other, uri).await.json();
        assert!(foreign.is_empty(), "other user saw records at {}", uri);
    }
}

#[tokio::test]
async fn test_foreign_records_are_not_found() {
    let t = two_users().await;

    for uri in [
        format!("/api/v1/campaigns/{}", t.setup.campaign_id),
        format!("/api/v1/campaigns/{}/objects", t.setup.campaign_id),
        format!("/api/v1/campaign-objects/{}", t.setup.object_id),
        format!("/api/v1/accounts/{}", t.setup.account_id),
        format!("/api/v1/publications/{}", t.publication_id),
    ] {
        t.app.get_as(&t.other, &uri).await.assert_not_found();
    }
}

#[tokio::test]
async fn test_foreign_records_cannot_be_changed() {
    let t = two_users().await;

    t.app
        .post_json_as(
            &t.other,
            &format!("/api/v1/campaign-objects/{}/status", t.setup.object_id),
            json!({ "status": "review" }),
        )
        .await
        .assert_not_found();

    t.app
        .post_json_as(
            &t.other,
            &format!("/api/v1/publications/{}/schedule", t.publication_id),
            json!({ "scheduled_at": chrono::Utc::now() + chrono::Duration::hours(1) }),
        )
        .await
        .assert_not_found();

    // The owner's record is untouched
    let object: Value = t
        .app
        .get(&format!("/api/v1/campaign-objects/{}", t.setup.object_id))
        .await
        .json();
    assert_eq!(object["status"], "draft");
}

#[tokio::test]
async fn test_cannot_attach_to_foreign_campaign() {
    let t = two_users().await;

    t.app
        .post_json_as(
            &t.other,
            "/api/v1/campaign-objects",
            json!({
                "campaign_id": t.setup.campaign_id,
                "title": "Hijack",
                "object_type": "post"
            }),
        )
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_cannot_publish_through_foreign_account() {
    let t = two_users().await;
    let own = content_setup(&t.app, &t.other).await;

    // Own content, someone else's account
    t.app
        .post_json_as(
            &t.other,
            "/api/v1/publications",
            json!({
                "campaign_object_id": own.object_id,
                "social_account_id": t.setup.account_id,
            }),
        )
        .await
        .assert_not_found();

    // Someone else's content, own account
    t.app
        .post_json_as(
            &t.other,
            "/api/v1/publications",
            json!({
                "campaign_object_id": t.setup.object_id,
                "social_account_id": own.account_id,
            }),
        )
        .await
        .assert_not_found();

    let publications: Vec<Value> = t.app.get_as(&t.other, "/api/v1/publications").await.json();
    assert!(publications.is_empty());
}

#[tokio::test]
async fn test_foreign_delete_is_not_found() {
    let t = two_users().await;

    t.app
        .request(
            axum::http::Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/campaigns/{}", t.setup.campaign_id))
                .header("Authorization", format!("Bearer {}", t.other))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .assert_not_found();

    t.app
        .get(&format!("/api/v1/campaigns/{}", t.setup.campaign_id))
        .await
        .assert_ok();
}
