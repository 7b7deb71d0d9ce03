use thiserror::Error;
use uuid::Uuid;

use crate::models::session::SessionStatus;
use crate::store::StoreError;

/// Errors surfaced by the session manager and round orchestrator.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Simulation {0} not found")]
    SimulationNotFound(Uuid),

    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Invalid round number {index}: simulation has {round_count} rounds")]
    InvalidRoundIndex { index: usize, round_count: usize },

    #[error("Cannot {action} session {session_id}: session is {status}")]
    InvalidTransition {
        session_id: Uuid,
        status: &'static str,
        action: &'static str,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No problems could be generated for round '{round_name}'")]
    NoProblemsGenerated { round_name: String },

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Failed to start round: {0}")]
    StartFailed(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SimulationError {
    pub fn invalid_transition(session_id: Uuid, status: SessionStatus, action: &'static str) -> Self {
        SimulationError::InvalidTransition {
            session_id,
            status: status.as_str(),
            action,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SimulationError::NoProblemsGenerated { .. }
                | SimulationError::PersistenceUnavailable(_)
                | SimulationError::StartFailed(_)
                | SimulationError::Timeout { .. }
                | SimulationError::Store(StoreError::Unavailable(_))
        )
    }
}
