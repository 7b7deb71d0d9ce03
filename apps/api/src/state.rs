use std::sync::Arc;

use crate::simulation::orchestrator::RoundOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Every handler goes through the orchestrator; nothing touches the store directly.
    pub orchestrator: Arc<RoundOrchestrator>,
}
