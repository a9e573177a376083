pub mod interactions;
pub mod middleware;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::middleware::require_secret;
use crate::state::AppState;

/// All HTTP routes. `/health` is open, `/interactions/*` need the relay secret.
pub fn router(state: AppState) -> Router {
    let interaction_routes = Router::new()
        .route("/interactions/start", post(interactions::start))
        .route("/interactions/admin", post(interactions::admin))
        .route("/interactions/actions", post(interactions::action))
        .route("/interactions/content", post(interactions::content))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_secret))
        .with_state(state);

    Router::new()
        .route("/health", get(interactions::health))
        .merge(interaction_routes)
}
