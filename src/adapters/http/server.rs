//! Axum HTTP surface: webhook ingestion and service discovery.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::ports::ServiceRepository;
use crate::services::catalog::Catalog;
use crate::services::webhook_ingest::WebhookIngest;

use super::extract::{extract_event_id, extract_event_type};
use super::signature::validate_signature;

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<dyn ServiceRepository>,
    pub ingest: Arc<WebhookIngest>,
    pub webhook_secrets: Arc<HashMap<String, String>>,
    pub catalog: &'static Catalog,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/:service", post(webhook_receiver))
        .route("/about.json", get(about))
        .with_state(state)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "HTTP server listening");
    axum::serve(listener, app).await
}

/// Universal webhook receiver.
///
/// `POST /webhooks/{service}` validates the delivery fail-closed and
/// hands it to the ingest service. `200` on accepted (including "no
/// matching automation"), `400` malformed payload, `401` invalid
/// signature, `404` unknown service, `500` missing secret.
async fn webhook_receiver(
    State(state): State<AppState>,
    Path(service): Path<String>,
    header_map: HeaderMap,
    body: Bytes,
) -> Response {
    tracing::info!(service = %service, "Received webhook");

    match state.services.get(&service).await {
        Ok(Some(row)) if row.is_active() => {}
        Ok(_) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &format!("Service '{service}' not found or inactive"),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Service lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    }

    let Some(secret) = state.webhook_secrets.get(&service) else {
        // Fail closed: accepting unsigned deliveries is worse than
        // rejecting all of them.
        tracing::error!(service = %service, "No webhook secret configured");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook secret not configured",
        );
    };

    let headers = lowercase_headers(&header_map);

    if !validate_signature(&service, &body, &headers, secret) {
        tracing::warn!(service = %service, "Invalid webhook signature");
        return error_response(StatusCode::UNAUTHORIZED, "Invalid webhook signature");
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(service = %service, error = %e, "Invalid JSON payload");
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON payload");
        }
    };

    let event_type = extract_event_type(&service, &headers, &payload);
    let event_id = extract_event_id(&service, &headers, &payload, &body);
    tracing::info!(
        service = %service,
        event_type = %event_type,
        event_id = %event_id,
        "Webhook validated, processing"
    );

    match state
        .ingest
        .process(&service, &event_type, &payload, &headers, event_id)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => {
            tracing::error!(service = %service, error = %e, "Webhook processing failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error processing webhook",
            )
        }
    }
}

/// Service discovery: the catalog as seen by clients.
async fn about(State(state): State<AppState>, header_map: HeaderMap) -> Response {
    let host = header_map
        .get("x-forwarded-for")
        .or_else(|| header_map.get("host"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let services: Vec<Value> = state
        .catalog
        .services()
        .iter()
        .map(|svc| {
            let actions: Vec<Value> = state
                .catalog
                .actions()
                .iter()
                .filter(|a| a.service == svc.name)
                .map(|a| json!({"name": a.name, "description": a.description}))
                .collect();
            let reactions: Vec<Value> = state
                .catalog
                .reactions()
                .iter()
                .filter(|r| r.service == svc.name)
                .map(|r| json!({"name": r.name, "description": r.description}))
                .collect();
            json!({
                "name": svc.name,
                "actions": actions,
                "reactions": reactions,
            })
        })
        .collect();

    let body = json!({
        "client": {"host": host},
        "server": {
            "current_time": Utc::now().timestamp(),
            "services": services,
        },
    });

    (StatusCode::OK, Json(body)).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

fn lowercase_headers(header_map: &HeaderMap) -> HashMap<String, String> {
    header_map
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|value| (k.as_str().to_lowercase(), value.to_string()))
        })
        .collect()
}
