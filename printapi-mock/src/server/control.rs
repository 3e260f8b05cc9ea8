//! Control api used by operators (and the control panel)
//! to steer the chaos behavior and inspect the inbox.

use rama::{
    http::{
        StatusCode,
        service::web::{
            extract::{Json, State},
            response::IntoResponse,
        },
    },
    telemetry::tracing,
};
use serde_json::json;

use super::MockState;
use crate::chaos::BehaviorPatch;

pub(super) async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub(super) async fn ping() -> impl IntoResponse {
    Json(json!({ "status": "ok", "message": "pong" }))
}

pub(super) async fn get_behavior(State(state): State<MockState>) -> impl IntoResponse {
    Json(state.behavior.get())
}

pub(super) async fn set_behavior(
    State(state): State<MockState>,
    Json(patch): Json<BehaviorPatch>,
) -> impl IntoResponse {
    match state.behavior.set(&patch) {
        Ok(behavior) => {
            tracing::info!(
                mode = %behavior.mode,
                error_code = behavior.error_code,
                error_message = ?behavior.error_message,
                delay_ms = behavior.delay_ms,
                "chaos behavior updated"
            );
            Json(behavior).into_response()
        }
        Err(err) => {
            tracing::debug!("reject behavior update {patch:?}: {err}");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

pub(super) async fn reset_behavior(State(state): State<MockState>) -> impl IntoResponse {
    let behavior = state.behavior.reset();
    tracing::info!("chaos behavior reset to defaults");
    Json(behavior)
}

pub(super) async fn list_inbox(State(state): State<MockState>) -> impl IntoResponse {
    Json(state.inbox.list())
}

pub(super) async fn clear_inbox(State(state): State<MockState>) -> impl IntoResponse {
    let cleared = state.inbox.len();
    state.inbox.clear();
    tracing::info!("inbox cleared ({cleared} entries removed)");
    Json(json!({ "ok": true }))
}

pub(super) async fn list_routes(State(state): State<MockState>) -> impl IntoResponse {
    Json(json!({ "upload": &*state.upload_route }))
}
