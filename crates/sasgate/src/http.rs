//! Axum HTTP surface for the gateway.
//!
//! `POST {callback_path}/{token}` is guarded by the SAS middleware; only
//! authorized requests reach the handler, which forwards them to a
//! [`NotificationSink`]. `GET /health` is open.

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

use sasgate_access::AuthorizedRequest;
use sasgate_core::RoutingId;

use crate::error::RootResult;
use crate::GatewayState;

// ---------------------------------------------------------------------------
// Notification sink
// ---------------------------------------------------------------------------

/// An authorized callback, as handed to the downstream handler.
#[derive(Debug, Clone)]
pub struct InboundNotification {
    pub routing_id: RoutingId,
    pub params: Vec<(String, String)>,
    pub body: Bytes,
}

/// Receiver for authorized callbacks (e.g. a conversational dialog engine).
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: InboundNotification) -> RootResult<()>;
}

/// Default sink: records the delivery in the log and drops it.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn deliver(&self, notification: InboundNotification) -> RootResult<()> {
        tracing::info!(
            params = notification.params.len(),
            body_bytes = notification.body.len(),
            "callback delivered"
        );
        tracing::debug!(routing_id = %notification.routing_id, "callback routing id");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Shared application state for Axum handlers.
pub struct AppState {
    pub gateway: GatewayState,
    pub sink: Arc<dyn NotificationSink>,
}

/// Build the Axum router with all endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    let callback_route = format!(
        "{}/{{token}}",
        state.gateway.authorizer.endpoint().callback_path()
    );

    let guarded = Router::new()
        .route(&callback_route, post(handle_callback))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_sas));

    Router::new()
        .route("/health", get(handle_health))
        .merge(guarded)
        .with_state(state)
}

/// Reject anything that does not carry a valid SAS for this exact URL.
async fn require_sas(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.gateway.authorizer.authorize(&request) {
        Ok(authorized) => {
            request.extensions_mut().insert(authorized);
            next.run(request).await
        }
        Err(_) => forbidden(),
    }
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "error": "forbidden" })),
    )
        .into_response()
}

/// POST {callback_path}/{token} -- forward an authorized callback
async fn handle_callback(
    State(state): State<Arc<AppState>>,
    Extension(authorized): Extension<AuthorizedRequest>,
    body: Bytes,
) -> Response {
    let notification = InboundNotification {
        routing_id: authorized.routing_id,
        params: authorized.params,
        body,
    };
    match state.sink.deliver(notification) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "accepted" })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "notification sink failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "delivery failed" })),
            )
                .into_response()
        }
    }
}

/// GET /health -- liveness
async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "callback_path": state.gateway.authorizer.endpoint().callback_path(),
    }))
}
