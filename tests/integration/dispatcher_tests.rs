//! Publication dispatcher tests
//!
//! Passes run against a real database with scripted publishers.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, SubsecRound, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use campaign_hub::{
    config::DispatcherConfig,
    db::{AuditRepository, PublicationRepository, Scope},
    models::{AuditAction, AuditLogQuery, PublicationStatus},
    services::{PublicationDispatcher, Publisher},
};

use crate::common::*;

fn dispatcher(app: &TestApp, publisher: Arc<dyn Publisher>) -> PublicationDispatcher {
    PublicationDispatcher::new(app.state.db.clone(), publisher, DispatcherConfig::default())
}

async fn status_of(app: &TestApp, id: Uuid) -> PublicationStatus {
    let mut conn = app.state.db.acquire().await.unwrap();
    PublicationRepository::new(&mut conn)
        .find(Scope::Unrestricted, id)
        .await
        .unwrap()
        .expect("publication exists")
        .status
}

#[tokio::test]
async fn test_only_due_publications_are_processed() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let now = Utc::now();

    let past = create_publication(
        &app,
        &app.token,
        setup.object_id,
        setup.account_id,
        Some(now - Duration::minutes(5)),
    )
    .await;
    let future = create_publication(
        &app,
        &app.token,
        setup.object_id,
        setup.account_id,
        Some(now + Duration::minutes(5)),
    )
    .await;

    let publisher = CountingPublisher::with_delay(StdDuration::ZERO);
    let result = dispatcher(&app, publisher.clone())
        .dispatch_due(Utc::now())
        .await
        .unwrap();

    assert_eq!(result.claimed, 1);
    assert_eq!(result.published, 1);
    assert_eq!(result.failed, 0);
    assert_eq!(publisher.calls(), 1);
    assert_eq!(result.outcomes[0].publication_id, id_of(&past));

    let published: Value = app
        .get(&format!("/api/v1/publications/{}", id_of(&past)))
        .await
        .json();
    assert_eq!(published["status"], "published");
    assert_eq!(
        published["external_post_id"],
        format!("post-{}", id_of(&past))
    );
    assert!(published["published_at"].is_string());

    assert_eq!(
        status_of(&app, id_of(&future)).await,
        PublicationStatus::Scheduled
    );

    // A second pass finds nothing left to do
    let again = dispatcher(&app, publisher.clone())
        .dispatch_due(Utc::now())
        .await
        .unwrap();
    assert_eq!(again.claimed, 0);
    assert_eq!(publisher.calls(), 1);
}

#[tokio::test]
async fn test_pass_drains_more_than_one_batch() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let due = Utc::now() - Duration::minutes(1);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let publication =
            create_publication(&app, &app.token, setup.object_id, setup.account_id, Some(due))
                .await;
        ids.push(id_of(&publication));
    }

    let config = DispatcherConfig {
        batch_size: 2,
        ..DispatcherConfig::default()
    };
    let publisher = CountingPublisher::with_delay(StdDuration::ZERO);
    let dispatcher = PublicationDispatcher::new(app.state.db.clone(), publisher.clone(), config);

    let due_now = dispatcher.list_due(Utc::now()).await.unwrap();
    assert_eq!(due_now.len(), 3);

    let result = dispatcher.dispatch_due(Utc::now()).await.unwrap();
    assert_eq!(result.claimed, 3);
    assert_eq!(result.published, 3);
    assert_eq!(result.outcomes.len(), 3);
    assert_eq!(publisher.calls(), 3);

    for id in ids {
        assert_eq!(status_of(&app, id).await, PublicationStatus::Published);
    }
}

#[tokio::test]
async fn test_due_check_keeps_subsecond_precision() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let second = Utc::now().trunc_subsecs(0) - Duration::minutes(1);
    let scheduled_at = second + Duration::milliseconds(900);

    let publication = create_publication(
        &app,
        &app.token,
        setup.object_id,
        setup.account_id,
        Some(scheduled_at),
    )
    .await;
    let id = id_of(&publication);

    let publisher = CountingPublisher::with_delay(StdDuration::ZERO);
    let early = dispatcher(&app, publisher.clone())
        .dispatch_due(second + Duration::milliseconds(100))
        .await
        .unwrap();
    assert_eq!(early.claimed, 0);
    assert_eq!(status_of(&app, id).await, PublicationStatus::Scheduled);

    let on_time = dispatcher(&app, publisher.clone())
        .dispatch_due(scheduled_at)
        .await
        .unwrap();
    assert_eq!(on_time.claimed, 1);
    assert_eq!(status_of(&app, id).await, PublicationStatus::Published);
}

#[tokio::test]
async fn test_draft_publications_are_never_claimed() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let draft = create_publication(&app, &app.token, setup.object_id, setup.account_id, None).await;

    let result = dispatcher(&app, Arc::new(campaign_hub::services::LogPublisher))
        .dispatch_due(Utc::now())
        .await
        .unwrap();

    assert_eq!(result.claimed, 0);
    assert_eq!(status_of(&app, id_of(&draft)).await, PublicationStatus::Draft);
}

#[tokio::test]
async fn test_concurrent_passes_never_double_publish() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let due = Utc::now() - Duration::minutes(1);

    let mut ids = Vec::new();
    for _ in 0..6 {
        let publication =
            create_publication(&app, &app.token, setup.object_id, setup.account_id, Some(due))
                .await;
        ids.push(id_of(&publication));
    }

    let publisher = CountingPublisher::with_delay(StdDuration::from_millis(20));
    let first = dispatcher(&app, publisher.clone());
    let second = dispatcher(&app, publisher.clone());
    let now = Utc::now();

    let (a, b) = tokio::join!(first.dispatch_due(now), second.dispatch_due(now));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.worker_id, b.worker_id);
    assert_eq!(a.claimed + b.claimed, ids.len());
    assert_eq!(a.published + b.published, ids.len());
    assert_eq!(publisher.calls(), ids.len());

    for id in ids {
        assert_eq!(status_of(&app, id).await, PublicationStatus::Published);
    }
}

#[tokio::test]
async fn test_inactive_account_fails_publication() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let publication = create_publication(
        &app,
        &app.token,
        setup.object_id,
        setup.account_id,
        Some(Utc::now() - Duration::minutes(5)),
    )
    .await;

    app.put_json(
        &format!("/api/v1/accounts/{}", setup.account_id),
        json!({ "is_active": false }),
    )
    .await
    .assert_ok();

    let publisher = CountingPublisher::with_delay(StdDuration::ZERO);
    let result = dispatcher(&app, publisher.clone())
        .dispatch_due(Utc::now())
        .await
        .unwrap();

    assert_eq!(result.failed, 1);
    assert!(result.has_failures());
    assert_eq!(publisher.calls(), 0);

    let failed: Value = app
        .get(&format!("/api/v1/publications/{}", id_of(&publication)))
        .await
        .json();
    assert_eq!(failed["status"], "failed");
    assert!(failed["error_message"].as_str().unwrap().contains("inactive"));
}

#[tokio::test]
async fn test_publisher_error_is_recorded() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let publication = create_publication(
        &app,
        &app.token,
        setup.object_id,
        setup.account_id,
        Some(Utc::now() - Duration::minutes(5)),
    )
    .await;

    let result = dispatcher(&app, Arc::new(FailingPublisher))
        .dispatch_due(Utc::now())
        .await
        .unwrap();

    assert_eq!(result.failed, 1);
    let outcome = &result.outcomes[0];
    assert_eq!(outcome.status, PublicationStatus::Failed);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .contains("platform rejected the post"));

    // Terminal publications can no longer be edited
    app.put_json(
        &format!("/api/v1/publications/{}", id_of(&publication)),
        json!({ "scheduled_at": Utc::now() + Duration::days(1) }),
    )
    .await
    .assert_conflict();
    app.delete(&format!("/api/v1/publications/{}", id_of(&publication)))
        .await
        .assert_conflict();
}

#[tokio::test]
async fn test_stale_claims_are_failed() {
    let app = TestApp::new().await;
    let setup = content_setup(&app, &app.token).await;
    let publication = create_publication(
        &app,
        &app.token,
        setup.object_id,
        setup.account_id,
        Some(Utc::now() - Duration::hours(2)),
    )
    .await;
    let id = id_of(&publication);

    // A worker that claimed the row an hour ago and never came back
    sqlx::query(
        "UPDATE publications SET status = 'publishing', claimed_by = 'dead-worker', claimed_at = ? WHERE id = ?",
    )
    .bind((Utc::now() - Duration::hours(1)).to_rfc3339())
    .bind(id.to_string())
    .execute(&app.state.db)
    .await
    .unwrap();

    let publisher = CountingPublisher::with_delay(StdDuration::ZERO);
    let result = dispatcher(&app, publisher.clone())
        .dispatch_due(Utc::now())
        .await
        .unwrap();

    assert_eq!(result.recovered_stale, 1);
    assert_eq!(result.claimed, 0);
    assert_eq!(publisher.calls(), 0);

    let failed: Value = app
        .get(&format!("/api/v1/publications/{}", id))
        .await
        .json();
    assert_eq!(failed["status"], "failed");
    assert_eq!(failed["error_message"], "claim expired");
}

#[tokio::test]
async fn test_dispatch_transitions_are_audited_as_system() {
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
    let id = id_of(&publication);

    dispatcher(&app, CountingPublisher::with_delay(StdDuration::ZERO))
        .dispatch_due(Utc::now())
        .await
        .unwrap();

    let mut conn = app.state.db.acquire().await.unwrap();
    let entries = AuditRepository::new(&mut conn)
        .list(
            Scope::Unrestricted,
            &AuditLogQuery {
                entity_type: Some("Publication".to_string()),
                entity_id: Some(id),
                action: Some(AuditAction::Update),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // scheduled -> publishing, then publishing -> published
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.actor_id.is_none()));

    let statuses: Vec<&Value> = entries
        .iter()
        .filter_map(|e| e.new_values.as_ref())
        .filter_map(|v| v.get("status"))
        .collect();
    assert!(statuses.contains(&&json!("publishing")));
    assert!(statuses.contains(&&json!("published")));

    let pending = AuditRepository::new(&mut conn).pending_count().await.unwrap();
    assert_eq!(pending, 0);
}
