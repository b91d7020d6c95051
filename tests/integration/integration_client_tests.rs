//! External integration tests
//!
//! Generation API, workflow webhooks and the publish webhook, each against
//! a `wiremock` server.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use rstest::rstest;
use serde_json::{json, Value};
use wiremock::{
    matchers::{header_exists, method, path},
    Mock, MockServer, ResponseTemplate,
};

use campaign_hub::{
    config::DispatcherConfig,
    services::{
        workflow::{sign, verify_signature, SIGNATURE_HEADER},
        PublicationDispatcher, WebhookPublisher,
    },
};

use crate::common::*;

async fn app_with_generation(server: &MockServer) -> TestApp {
    let mut config = test_config();
    config.generation = Some(generation_config(server));
    TestApp::with_config(config).await
}

async fn app_with_workflow(server: &MockServer) -> TestApp {
    let mut config = test_config();
    config.workflow = Some(workflow_config(server));
    TestApp::with_config(config).await
}

/// Start a media job and return its JSON
async fn start_media_job(app: &TestApp, object_id: uuid::Uuid) -> Value {
    let response = app
        .post_json(
            &format!("/api/v1/campaign-objects/{}/media-jobs", object_id),
            json!({ "kind": "image", "prompt": "A bright product shot", "options": { "ratio": "1:1" } }),
        )
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    response.json()
}

async fn send_callback(app: &TestApp, body: Value, signature: Option<String>) -> TestResponse {
    let bytes = serde_json::to_vec(&body).unwrap();
    match signature {
        Some(sig) => {
            app.post_raw("/api/v1/webhooks/workflow", &[(SIGNATURE_HEADER, sig.as_str())], bytes)
                .await
        }
        None => app.post_raw("/api/v1/webhooks/workflow", &[], bytes).await,
    }
}

fn signed(body: &Value) -> String {
    sign(TEST_WEBHOOK_SECRET, &serde_json::to_vec(body).unwrap()).unwrap()
}

#[tokio::test]
async fn test_text_generation_reports_tokens() {
    let server = mock_generation_api("Big news is coming.", 120, 30).await;
    let app = app_with_generation(&server).await;

    let response = app
        .post_json(
            "/api/v1/generation/text",
            json!({
                "content_type": "post",
                "prompt": "Tease the launch",
                "options": { "tone": "playful", "length": "short" }
            }),
        )
        .await;
    response.assert_ok();

    let generated: Value = response.json();
    assert_eq!(generated["content"], "Big news is coming.");
    assert_eq!(generated["tokens_used"], 150);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["model"], "test-model");
    assert_eq!(sent["messages"][0]["content"], "Tease the launch");
}

#[tokio::test]
async fn test_generate_for_object_applies_content() {
    let server = mock_generation_api("Fresh copy for the launch.", 10, 5).await;
    let app = app_with_generation(&server).await;
    let setup = content_setup(&app, &app.token).await;

    let response = app
        .post_json(
            &format!("/api/v1/campaign-objects/{}/generate", setup.object_id),
            json!({ "prompt": "Rewrite the teaser", "apply": true }),
        )
        .await;
    response.assert_ok();
    let result: Value = response.json();
    assert_eq!(result["content"], "Fresh copy for the launch.");
    assert_eq!(result["object"]["content"], "Fresh copy for the launch.");

    let object: Value = app
        .get(&format!("/api/v1/campaign-objects/{}", setup.object_id))
        .await
        .json();
    assert_eq!(object["content"], "Fresh copy for the launch.");
}

#[tokio::test]
async fn test_generate_without_apply_leaves_object() {
    let server = mock_generation_api("Draft only.", 1, 1).await;
    let app = app_with_generation(&server).await;
    let setup = content_setup(&app, &app.token).await;

    let result: Value = app
        .post_json(
            &format!("/api/v1/campaign-objects/{}/generate", setup.object_id),
            json!({ "prompt": "Try something" }),
        )
        .await
        .json();
    assert_eq!(result["content"], "Draft only.");
    assert!(result.get("object").is_none());

    let object: Value = app
        .get(&format!("/api/v1/campaign-objects/{}", setup.object_id))
        .await
        .json();
    assert_eq!(object["content"], "Something big is coming.");
}

#[rstest]
#[case(500)]
#[case(429)]
#[tokio::test]
async fn test_generation_api_errors_are_bad_gateway(#[case] status: u16) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(status).set_body_string("upstream trouble"))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_with_generation(&server).await;

    app.post_json(
        "/api/v1/generation/text",
        json!({ "content_type": "article", "prompt": "Write it" }),
    )
    .await
    .assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_generation_without_text_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [],
            "usage": { "input_tokens": 3, "output_tokens": 0 }
        })))
        .mount(&server)
        .await;
    let app = app_with_generation(&server).await;

    app.post_json(
        "/api/v1/generation/text",
        json!({ "content_type": "post", "prompt": "Anything" }),
    )
    .await
    .assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_media_job_is_signed_and_processing() {
    let server = mock_workflow(200).await;
    let app = app_with_workflow(&server).await;
    let setup = content_setup(&app, &app.token).await;

    let job = start_media_job(&app, setup.object_id).await;
    assert_eq!(job["status"], "processing");
    assert_eq!(job["kind"], "image");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/image-process");

    let signature = requests[0]
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .expect("signature header");
    assert!(verify_signature(TEST_WEBHOOK_SECRET, &requests[0].body, signature));

    let payload: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(payload["jobId"], job["id"]);
    assert_eq!(payload["objectId"], setup.object_id.to_string());
    assert_eq!(payload["type"], "image");
    assert_eq!(payload["options"]["ratio"], "1:1");

    let jobs: Vec<Value> = app
        .get(&format!("/api/v1/campaign-objects/{}/media-jobs", setup.object_id))
        .await
        .json();
    assert_eq!(jobs.len(), 1);
}

#[tokio::test]
async fn test_workflow_failure_marks_job_failed() {
    let server = mock_workflow(500).await;
    let app = app_with_workflow(&server).await;
    let setup = content_setup(&app, &app.token).await;

    app.post_json(
        &format!("/api/v1/campaign-objects/{}/media-jobs", setup.object_id),
        json!({ "kind": "video", "prompt": "Thirty second teaser" }),
    )
    .await
    .assert_status(StatusCode::BAD_GATEWAY);

    let jobs: Vec<Value> = app
        .get(&format!("/api/v1/campaign-objects/{}/media-jobs", setup.object_id))
        .await
        .json();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["status"], "failed");
    assert!(jobs[0]["error_message"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_completed_callback_updates_object_media() {
    let server = mock_workflow(200).await;
    let app = app_with_workflow(&server).await;
    let setup = content_setup(&app, &app.token).await;
    let job = start_media_job(&app, setup.object_id).await;

    let body = json!({
        "jobId": job["id"],
        "status": "completed",
        "resultUrl": "https://cdn.example.com/renders/launch.png"
    });
    let response = send_callback(&app, body.clone(), Some(signed(&body))).await;
    response.assert_ok();
    let completed: Value = response.json();
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["result_url"], "https://cdn.example.com/renders/launch.png");

    let object: Value = app
        .get(&format!("/api/v1/campaign-objects/{}", setup.object_id))
        .await
        .json();
    assert_eq!(object["media_url"], "https://cdn.example.com/renders/launch.png");

    // Replaying the same report changes nothing
    send_callback(&app, body.clone(), Some(signed(&body)))
        .await
        .assert_ok();

    // A conflicting report is rejected
    let failed = json!({ "jobId": job["id"], "status": "failed", "error": "render crashed" });
    send_callback(&app, failed.clone(), Some(signed(&failed)))
        .await
        .assert_conflict();

    let fetched: Value = app
        .get(&format!("/api/v1/generation-jobs/{}", job["id"].as_str().unwrap()))
        .await
        .json();
    assert_eq!(fetched["status"], "completed");
}

#[tokio::test]
async fn test_failed_callback_records_error() {
    let server = mock_workflow(200).await;
    let app = app_with_workflow(&server).await;
    let setup = content_setup(&app, &app.token).await;
    let job = start_media_job(&app, setup.object_id).await;

    let body = json!({ "jobId": job["id"], "status": "failed", "error": "render crashed" });
    let failed: Value = send_callback(&app, body.clone(), Some(signed(&body)))
        .await
        .json();
    assert_eq!(failed["status"], "failed");
    assert_eq!(failed["error_message"], "render crashed");
}

#[tokio::test]
async fn test_callback_signature_is_required() {
    let server = mock_workflow(200).await;
    let app = app_with_workflow(&server).await;
    let setup = content_setup(&app, &app.token).await;
    let job = start_media_job(&app, setup.object_id).await;

    let body = json!({
        "jobId": job["id"],
        "status": "completed",
        "resultUrl": "https://cdn.example.com/x.png"
    });

    send_callback(&app, body.clone(), None)
        .await
        .assert_unauthorized();

    let forged = sign("some-other-secret", &serde_json::to_vec(&body).unwrap()).unwrap();
    send_callback(&app, body.clone(), Some(forged))
        .await
        .assert_unauthorized();

    let fetched: Value = app
        .get(&format!("/api/v1/generation-jobs/{}", job["id"].as_str().unwrap()))
        .await
        .json();
    assert_eq!(fetched["status"], "processing");
}

#[rstest]
#[case(json!({ "status": "completed" }))]
#[case(json!({ "status": "completed", "resultUrl": "ftp://files.example.com/a.png" }))]
#[case(json!({ "status": "processing" }))]
#[tokio::test]
async fn test_invalid_callbacks_are_rejected(#[case] mut body: Value) {
    let server = mock_workflow(200).await;
    let app = app_with_workflow(&server).await;
    let setup = content_setup(&app, &app.token).await;
    let job = start_media_job(&app, setup.object_id).await;

    body["jobId"] = job["id"].clone();
    send_callback(&app, body.clone(), Some(signed(&body)))
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_webhook_publisher_delivers_signed_payload() {
    let receiver = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/publish"))
        .and(header_exists(SIGNATURE_HEADER))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "externalPostId": "li-778899" })),
        )
        .expect(1)
        .mount(&receiver)
        .await;

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

    let publisher = WebhookPublisher::new(
        format!("{}/publish", receiver.uri()),
        TEST_WEBHOOK_SECRET,
        StdDuration::from_secs(5),
    )
    .unwrap();
    let result = PublicationDispatcher::new(
        app.state.db.clone(),
        Arc::new(publisher),
        DispatcherConfig::default(),
    )
    .dispatch_due(Utc::now())
    .await
    .unwrap();
    assert_eq!(result.published, 1);

    let published: Value = app
        .get(&format!("/api/v1/publications/{}", id_of(&publication)))
        .await
        .json();
    assert_eq!(published["status"], "published");
    assert_eq!(published["external_post_id"], "li-778899");

    let requests = receiver.received_requests().await.unwrap();
    let signature = requests[0]
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(verify_signature(TEST_WEBHOOK_SECRET, &requests[0].body, signature));

    let payload: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(payload["publicationId"], id_of(&publication).to_string());
    assert_eq!(payload["platform"], "linkedin");
    assert_eq!(payload["accountName"], "Acme Corp");
    assert_eq!(payload["content"], "Something big is coming.");
}

#[tokio::test]
async fn test_webhook_publisher_rejection_fails_publication() {
    let receiver = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/publish"))
        .respond_with(ResponseTemplate::new(422).set_body_string("duplicate post"))
        .mount(&receiver)
        .await;

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

    let publisher = WebhookPublisher::new(
        format!("{}/publish", receiver.uri()),
        TEST_WEBHOOK_SECRET,
        StdDuration::from_secs(5),
    )
    .unwrap();
    let result = PublicationDispatcher::new(
        app.state.db.clone(),
        Arc::new(publisher),
        DispatcherConfig::default(),
    )
    .dispatch_due(Utc::now())
    .await
    .unwrap();
    assert!(result.has_failures());

    let failed: Value = app
        .get(&format!("/api/v1/publications/{}", id_of(&publication)))
        .await
        .json();
    assert_eq!(failed["status"], "failed");
    assert!(failed["error_message"]
        .as_str()
        .unwrap()
        .contains("duplicate post"));
}
