use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use herald_types::api::{ActionRequest, ContentRequest, InteractionRequest, Reply};

use crate::state::AppState;

/// POST /interactions/start — public; registers the caller.
pub async fn start(
    State(state): State<AppState>,
    Json(req): Json<InteractionRequest>,
) -> impl IntoResponse {
    Json(state.gateway.start(&req.user))
}

/// POST /interactions/admin — control panel, or silence for non-operators.
pub async fn admin(
    State(state): State<AppState>,
    Json(req): Json<InteractionRequest>,
) -> Response {
    respond(state.gateway.admin(&req.user).await)
}

/// POST /interactions/actions — a button press on a panel or prompt.
pub async fn action(
    State(state): State<AppState>,
    Json(req): Json<ActionRequest>,
) -> Response {
    respond(state.gateway.action(&req.user, req.action, req.panel).await)
}

/// POST /interactions/content — a message sent by an operator.
pub async fn content(
    State(state): State<AppState>,
    Json(req): Json<ContentRequest>,
) -> Response {
    respond(state.gateway.content(&req.user, req.content).await)
}

pub async fn health() -> &'static str {
    "ok"
}

/// Silence is a 204 with no body, indistinguishable from an ignored message.
fn respond(reply: Option<Reply>) -> Response {
    match reply {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
