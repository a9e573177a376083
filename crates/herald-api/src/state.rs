use std::sync::Arc;

use herald_core::gateway::OperatorGateway;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub gateway: OperatorGateway,
    /// Shared secret the platform relay presents as a bearer token
    pub api_secret: String,
}
