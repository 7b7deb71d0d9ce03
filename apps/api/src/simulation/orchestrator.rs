//! Round orchestration: the use-case layer behind the HTTP handlers.
//!
//! Reads and session updates are bounded by the fetch timeout. `continue_round`
//! never triggers generation: an empty session is only backfilled from
//! persisted problems.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::models::session::{Session, SessionResult};
use crate::models::simulation::{RoundSpec, Simulation, SimulationStatus};
use crate::simulation::error::SimulationError;
use crate::simulation::planner::{plan_rounds, RoundBlueprint};
use crate::simulation::session::SessionManager;
use crate::store::{get_typed, put_typed, DocumentStore, StoreError, SIMULATIONS};

#[derive(Debug, Clone, Deserialize)]
pub struct NewSimulation {
    pub user_id: Uuid,
    pub company_name: String,
    pub role_level: String,
    pub total_minutes: u32,
    pub rounds: Vec<RoundBlueprint>,
}

/// What the client can do next with a round.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundAffordance {
    Start,
    Resume,
    Review,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundView {
    pub simulation_id: Uuid,
    pub round_index: usize,
    pub round: RoundSpec,
    pub session: Option<Session>,
    pub affordance: RoundAffordance,
}

pub struct RoundOrchestrator {
    store: Arc<dyn DocumentStore>,
    sessions: SessionManager,
    fetch_timeout: Duration,
}

impl RoundOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sessions: SessionManager,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            sessions,
            fetch_timeout,
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, SimulationError>
    where
        F: Future<Output = Result<T, SimulationError>>,
    {
        tokio::time::timeout(self.fetch_timeout, fut)
            .await
            .map_err(|_| SimulationError::Timeout {
                operation,
                secs: self.fetch_timeout.as_secs(),
            })?
    }

    pub async fn create_simulation(
        &self,
        request: NewSimulation,
    ) -> Result<Simulation, SimulationError> {
        if request.rounds.is_empty() {
            return Err(SimulationError::InvalidRequest(
                "a simulation needs at least one round".to_string(),
            ));
        }
        if request.company_name.trim().is_empty() {
            return Err(SimulationError::InvalidRequest(
                "company_name cannot be empty".to_string(),
            ));
        }
        // Sessions are keyed by round name, so names must be distinct.
        let mut names = HashSet::new();
        if let Some(dup) = request.rounds.iter().find(|r| !names.insert(r.name.trim())) {
            return Err(SimulationError::InvalidRequest(format!(
                "duplicate round name '{}'",
                dup.name
            )));
        }

        let rounds = plan_rounds(request.total_minutes, &request.rounds);
        if rounds.iter().any(|r| r.duration_minutes == 0) {
            return Err(SimulationError::InvalidRequest(format!(
                "{} minutes cannot be split across {} rounds",
                request.total_minutes,
                rounds.len()
            )));
        }

        let simulation = Simulation {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            company_name: request.company_name.trim().to_string(),
            role_level: request.role_level.trim().to_string(),
            rounds,
            current_round_index: 0,
            completed_rounds: Default::default(),
            status: SimulationStatus::Active,
            created_at: Utc::now(),
        };
        put_typed(
            self.store.as_ref(),
            SIMULATIONS,
            &simulation.id.to_string(),
            &simulation,
        )
        .await
        .map_err(|e| match e {
            StoreError::Unavailable(msg) => SimulationError::PersistenceUnavailable(msg),
            other => SimulationError::Store(other),
        })?;

        info!(
            "Created simulation {} for {} ({} rounds, {} min)",
            simulation.id,
            simulation.company_name,
            simulation.rounds.len(),
            request.total_minutes
        );
        Ok(simulation)
    }

    pub async fn get_simulation(&self, simulation_id: Uuid) -> Result<Simulation, SimulationError> {
        self.bounded("get_simulation", async {
            get_typed(self.store.as_ref(), SIMULATIONS, &simulation_id.to_string())
                .await?
                .ok_or(SimulationError::SimulationNotFound(simulation_id))
        })
        .await
    }

    /// Fetches the simulation and checks that `user_id` owns it.
    async fn owned_simulation(
        &self,
        simulation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Simulation, SimulationError> {
        let simulation = self.get_simulation(simulation_id).await?;
        if simulation.user_id != user_id {
            return Err(SimulationError::SimulationNotFound(simulation_id));
        }
        Ok(simulation)
    }

    pub async fn get_session_for_round(
        &self,
        simulation_id: Uuid,
        user_id: Uuid,
        round_name: &str,
    ) -> Result<Option<Session>, SimulationError> {
        self.bounded(
            "get_session_for_round",
            self.sessions.find_session(simulation_id, user_id, round_name),
        )
        .await
    }

    /// Round definition plus any session, and which action the client should offer.
    pub async fn load_round(
        &self,
        simulation_id: Uuid,
        user_id: Uuid,
        round_index: usize,
    ) -> Result<RoundView, SimulationError> {
        let simulation = self.owned_simulation(simulation_id, user_id).await?;
        let round = simulation
            .round(round_index)
            .cloned()
            .ok_or(SimulationError::InvalidRoundIndex {
                index: round_index,
                round_count: simulation.rounds.len(),
            })?;

        let session = self
            .get_session_for_round(simulation_id, user_id, &round.name)
            .await?;
        let (session, affordance) = match session {
            Some(s) if s.is_active() => {
                let resumed = self.bounded("resume", self.sessions.resume(s)).await?;
                (Some(resumed), RoundAffordance::Resume)
            }
            Some(s) => (Some(s), RoundAffordance::Review),
            None => (None, RoundAffordance::Start),
        };

        Ok(RoundView {
            simulation_id,
            round_index,
            round,
            session,
            affordance,
        })
    }

    pub async fn start_round(
        &self,
        simulation_id: Uuid,
        user_id: Uuid,
        round_index: usize,
    ) -> Result<Session, SimulationError> {
        let simulation = self.owned_simulation(simulation_id, user_id).await?;
        self.sessions.start(&simulation, user_id, round_index).await
    }

    /// Returns the session with its problems, re-reading persisted problems if
    /// the session has none. Completed sessions are returned as they are.
    pub async fn continue_round(&self, session_id: Uuid) -> Result<Session, SimulationError> {
        let session = self
            .bounded("load_session", self.sessions.load_session(session_id))
            .await?;
        if !session.is_active() {
            return Ok(session);
        }
        self.bounded("resume", self.sessions.resume(session)).await
    }

    pub async fn restart_round(
        &self,
        simulation_id: Uuid,
        user_id: Uuid,
        round_index: usize,
    ) -> Result<Session, SimulationError> {
        let simulation = self.owned_simulation(simulation_id, user_id).await?;
        self.sessions.restart(&simulation, user_id, round_index).await
    }

    pub async fn complete_round(
        &self,
        session_id: Uuid,
        result: SessionResult,
    ) -> Result<(), SimulationError> {
        self.bounded("complete_round", self.sessions.complete(session_id, result))
            .await?;
        Ok(())
    }

    pub async fn advance(
        &self,
        session_id: Uuid,
        problem_index: usize,
    ) -> Result<Session, SimulationError> {
        self.bounded("advance", self.sessions.advance(session_id, problem_index))
            .await
    }
}
