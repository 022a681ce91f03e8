mod helpers;

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

use relay::adapters::http::{router, AppState};
use relay::adapters::sqlite::SqliteServiceRepository;
use relay::domain::models::{Automation, ExecutionStatus};
use relay::domain::ports::ExecutionRepository;
use relay::services::{Catalog, DispatchQueue, ExecutionAdmitter, WebhookIngest};

use helpers::database::{
    automation_repo, execution_repo, insert_automation, seed_services, setup_test_db,
    subscription_repo,
};

const SECRET: &str = "s3cret";

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

async fn app(pool: &sqlx::SqlitePool) -> axum::Router {
    let (queue, _rx) = DispatchQueue::bounded(64);
    let admitter = Arc::new(ExecutionAdmitter::new(execution_repo(pool), queue));
    let ingest = Arc::new(WebhookIngest::new(
        automation_repo(pool),
        subscription_repo(pool),
        admitter,
    ));
    let mut secrets = HashMap::new();
    secrets.insert("github".to_string(), SECRET.to_string());

    router(AppState {
        services: Arc::new(SqliteServiceRepository::new(pool.clone())),
        ingest,
        webhook_secrets: Arc::new(secrets),
        catalog: Catalog::builtin(),
    })
}

fn github_push_request(body: &str, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks/github")
        .header("content-type", "application/json")
        .header("x-github-event", "push")
        .header("x-hub-signature-256", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_push_webhook_creates_execution_then_deduplicates() {
    let pool = setup_test_db().await;
    seed_services(&pool).await;
    let automation = insert_automation(
        &pool,
        Automation::new("u", "On push", "github_push", "log_message")
            .with_reaction_config(json!({"message": "pushed"})),
    )
    .await;

    let app = app(&pool).await;
    let body = r#"{"delivery":"abc","commits":[{"id":"sha1"}]}"#;
    let signature = sign(SECRET, body.as_bytes());

    let response = app
        .clone()
        .oneshot(github_push_request(body, &signature))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    assert_eq!(first["status"], "success");
    assert_eq!(first["event_id"], "github_delivery_abc");
    assert_eq!(first["matched_automations"], 1);
    assert_eq!(first["executions_created"], 1);
    assert_eq!(first["executions_skipped"], 0);

    // Immediate duplicate delivery.
    let response = app
        .oneshot(github_push_request(body, &signature))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await;
    assert_eq!(second["executions_created"], 0);
    assert_eq!(second["executions_skipped"], 1);

    let executions = execution_repo(&pool)
        .list_by_status(ExecutionStatus::Pending, 100)
        .await
        .unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(
        executions[0].external_event_id,
        format!("github_delivery_abc_automation_{}", automation.id)
    );
    // Trigger data carries the payload but not the signature header.
    assert_eq!(executions[0].trigger_data["event_data"]["delivery"], "abc");
    assert!(executions[0].trigger_data["headers"]
        .get("x-hub-signature-256")
        .is_none());
}

#[tokio::test]
async fn test_invalid_signature_is_rejected_with_no_execution() {
    let pool = setup_test_db().await;
    seed_services(&pool).await;
    insert_automation(
        &pool,
        Automation::new("u", "On push", "github_push", "log_message")
            .with_reaction_config(json!({"message": "pushed"})),
    )
    .await;

    let app = app(&pool).await;
    let body = r#"{"delivery":"abc","commits":[{"id":"sha1"}]}"#;
    let bad_signature = sign("wrong-secret", body.as_bytes());

    let response = app
        .oneshot(github_push_request(body, &bad_signature))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let executions = execution_repo(&pool)
        .list_by_status(ExecutionStatus::Pending, 100)
        .await
        .unwrap();
    assert!(executions.is_empty());
}

#[tokio::test]
async fn test_repository_filter_excludes_other_repos() {
    let pool = setup_test_db().await;
    seed_services(&pool).await;
    insert_automation(
        &pool,
        Automation::new("u", "Site pushes", "github_push", "log_message")
            .with_action_config(json!({"repository": "octo/site"}))
            .with_reaction_config(json!({"message": "pushed"})),
    )
    .await;

    let app = app(&pool).await;
    let other_repo = r#"{"delivery":"d1","repository":{"full_name":"octo/other"}}"#;
    let response = app
        .clone()
        .oneshot(github_push_request(other_repo, &sign(SECRET, other_repo.as_bytes())))
        .await
        .unwrap();
    let outcome = body_json(response).await;
    assert_eq!(outcome["matched_automations"], 0);
    assert_eq!(outcome["executions_created"], 0);

    let matching = r#"{"delivery":"d2","repository":{"full_name":"octo/site"}}"#;
    let response = app
        .oneshot(github_push_request(matching, &sign(SECRET, matching.as_bytes())))
        .await
        .unwrap();
    let outcome = body_json(response).await;
    assert_eq!(outcome["matched_automations"], 1);
    assert_eq!(outcome["executions_created"], 1);
}

#[tokio::test]
async fn test_unknown_service_is_404() {
    let pool = setup_test_db().await;
    seed_services(&pool).await;
    let app = app(&pool).await;

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/jira")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_secret_is_500_fail_closed() {
    let pool = setup_test_db().await;
    seed_services(&pool).await;
    let app = app(&pool).await;

    // Notion is a known service but has no secret configured here.
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/notion")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Webhook secret not configured");
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let pool = setup_test_db().await;
    seed_services(&pool).await;
    let app = app(&pool).await;

    let body = "not json at all";
    let response = app
        .oneshot(github_push_request(body, &sign(SECRET, body.as_bytes())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unmapped_event_type_matches_nothing() {
    let pool = setup_test_db().await;
    seed_services(&pool).await;
    let app = app(&pool).await;

    let body = r#"{"delivery":"d9"}"#;
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/github")
        .header("x-github-event", "deployment_status")
        .header("x-hub-signature-256", sign(SECRET, body.as_bytes()))
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    assert_eq!(outcome["matched_automations"], 0);
}

#[tokio::test]
async fn test_about_json_lists_catalog() {
    let pool = setup_test_db().await;
    seed_services(&pool).await;
    let app = app(&pool).await;

    let request = Request::builder()
        .method("GET")
        .uri("/about.json")
        .header("host", "relay.test")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let about = body_json(response).await;
    assert_eq!(about["client"]["host"], "relay.test");
    assert!(about["server"]["current_time"].is_i64());

    let services = about["server"]["services"].as_array().unwrap();
    let github = services
        .iter()
        .find(|s| s["name"] == "github")
        .expect("github service missing");
    let actions: Vec<&str> = github["actions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert!(actions.contains(&"github_push"));
    assert!(actions.contains(&"github_new_issue"));
}
