//! Test fixtures for common test data
//!
//! Helpers that create campaigns, content, accounts and publications through
//! the API, so every fixture also leaves the audit trail a real caller would.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use super::test_app::TestApp;

/// Id field of a JSON response body
pub fn id_of(value: &Value) -> Uuid {
    value["id"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .expect("response has no id")
}

pub async fn create_campaign(app: &TestApp, token: &str, name: &str) -> Value {
    let response = app
        .post_json_as(
            token,
            "/api/v1/campaigns",
            json!({ "name": name, "description": "Fixture campaign" }),
        )
        .await;
    response.assert_created();
    response.json()
}

pub async fn create_object(app: &TestApp, token: &str, campaign_id: Uuid) -> Value {
    let response = app
        .post_json_as(
            token,
            "/api/v1/campaign-objects",
            json!({
                "campaign_id": campaign_id,
                "title": "Launch teaser",
                "object_type": "post",
                "content": "Something big is coming."
            }),
        )
        .await;
    response.assert_created();
    response.json()
}

pub async fn create_account(app: &TestApp, token: &str) -> Value {
    let response = app
        .post_json_as(
            token,
            "/api/v1/accounts",
            json!({ "platform": "linkedin", "account_name": "Acme Corp" }),
        )
        .await;
    response.assert_created();
    response.json()
}

pub async fn create_publication(
    app: &TestApp,
    token: &str,
    object_id: Uuid,
    account_id: Uuid,
    scheduled_at: Option<DateTime<Utc>>,
) -> Value {
    let response = app
        .post_json_as(
            token,
            "/api/v1/publications",
            json!({
                "campaign_object_id": object_id,
                "social_account_id": account_id,
                "scheduled_at": scheduled_at,
            }),
        )
        .await;
    response.assert_created();
    response.json()
}

/// Campaign, object and account owned by `token`'s user
pub struct ContentSetup {
    pub campaign_id: Uuid,
    pub object_id: Uuid,
    pub account_id: Uuid,
}

pub async fn content_setup(app: &TestApp, token: &str) -> ContentSetup {
    let campaign = create_campaign(app, token, "Spring launch").await;
    let object = create_object(app, token, id_of(&campaign)).await;
    let account = create_account(app, token).await;
    ContentSetup {
        campaign_id: id_of(&campaign),
        object_id: id_of(&object),
        account_id: id_of(&account),
    }
}
