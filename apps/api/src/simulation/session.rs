//! Session state machine for one round attempt.
//!
//! ```text
//! no-session --start--> active --complete--> completed
//!              active --resume--> active
//!   {active, completed} --restart--> (deleted) --start--> active
//! ```
//!
//! Starts, restarts and completions for the same (simulation, user, round) key
//! are serialized so two concurrent requests cannot both run the generation
//! pipeline. Every read-modify-write of a simulation record holds that
//! simulation's lock.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::session::{Session, SessionResult, SessionStatus};
use crate::models::simulation::Simulation;
use crate::simulation::error::SimulationError;
use crate::simulation::generator::ProblemGenerator;
use crate::simulation::locks::KeyedLocks;
use crate::simulation::persistence::PersistenceGateway;
use crate::simulation::transformer::RoundMetadata;
use crate::store::{get_typed, put_typed, query_typed, DocumentStore, Filter, SESSIONS, SIMULATIONS};

type SessionKey = (Uuid, Uuid, String);

pub struct SessionManager {
    store: Arc<dyn DocumentStore>,
    generator: ProblemGenerator,
    gateway: PersistenceGateway,
    round_locks: KeyedLocks<SessionKey>,
    simulation_locks: KeyedLocks<Uuid>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        generator: ProblemGenerator,
        gateway: PersistenceGateway,
    ) -> Self {
        Self {
            store,
            generator,
            gateway,
            round_locks: KeyedLocks::new(),
            simulation_locks: KeyedLocks::new(),
        }
    }

    /// Reloads the simulation, applies `update` and writes it back under the
    /// simulation's lock.
    async fn update_simulation<F>(
        &self,
        simulation_id: Uuid,
        update: F,
    ) -> Result<Simulation, SimulationError>
    where
        F: FnOnce(&mut Simulation),
    {
        let _guard = self.simulation_locks.lock(simulation_id).await;
        let mut simulation = self.load_simulation(simulation_id).await?;
        update(&mut simulation);
        put_typed(self.store.as_ref(), SIMULATIONS, &simulation_id.to_string(), &simulation).await?;
        Ok(simulation)
    }

    async fn sessions_for_round(
        &self,
        simulation_id: Uuid,
        user_id: Uuid,
        round_name: &str,
    ) -> Result<Vec<Session>, SimulationError> {
        let filters = [
            Filter::eq("simulation_id", simulation_id.to_string()),
            Filter::eq("user_id", user_id.to_string()),
            Filter::eq("round_name", round_name),
        ];
        Ok(query_typed(self.store.as_ref(), SESSIONS, &filters).await?)
    }

    /// The active session for a round if one exists, otherwise the latest completed one.
    pub async fn find_session(
        &self,
        simulation_id: Uuid,
        user_id: Uuid,
        round_name: &str,
    ) -> Result<Option<Session>, SimulationError> {
        let mut sessions = self
            .sessions_for_round(simulation_id, user_id, round_name)
            .await?;
        sessions.sort_by_key(|s| (s.is_active(), s.started_at));
        Ok(sessions.pop())
    }

    pub async fn load_session(&self, session_id: Uuid) -> Result<Session, SimulationError> {
        get_typed(self.store.as_ref(), SESSIONS, &session_id.to_string())
            .await?
            .ok_or(SimulationError::SessionNotFound(session_id))
    }

    async fn save_session(&self, session: &Session) -> Result<(), SimulationError> {
        put_typed(self.store.as_ref(), SESSIONS, &session.id.to_string(), session).await?;
        Ok(())
    }

    /// Starts a round, or resumes it when an active session already exists.
    pub async fn start(
        &self,
        simulation: &Simulation,
        user_id: Uuid,
        round_index: usize,
    ) -> Result<Session, SimulationError> {
        let round_name = round_name(simulation, round_index)?;
        let _guard = self.round_locks.lock((simulation.id, user_id, round_name)).await;
        self.start_locked(simulation, user_id, round_index).await
    }

    async fn start_locked(
        &self,
        simulation: &Simulation,
        user_id: Uuid,
        round_index: usize,
    ) -> Result<Session, SimulationError> {
        let round = simulation
            .round(round_index)
            .ok_or(SimulationError::InvalidRoundIndex {
                index: round_index,
                round_count: simulation.rounds.len(),
            })?;

        let existing = self
            .find_session(simulation.id, user_id, &round.name)
            .await
            .map_err(|e| SimulationError::StartFailed(e.to_string()))?;
        match existing {
            Some(session) if session.is_active() => {
                info!(
                    "Round '{}' already has active session {}; resuming",
                    round.name, session.id
                );
                return self.resume(session).await;
            }
            Some(session) => {
                return Err(SimulationError::invalid_transition(
                    session.id,
                    session.status,
                    "start",
                ));
            }
            None => {}
        }

        let candidates = self
            .generator
            .generate_round(
                round_index,
                round,
                &simulation.company_name,
                &simulation.role_level,
            )
            .await;
        if candidates.is_empty() {
            return Err(SimulationError::NoProblemsGenerated {
                round_name: round.name.clone(),
            });
        }

        // Leftovers from an attempt that saved problems but no session.
        let stale = self
            .gateway
            .delete_round_problems(simulation.id, user_id, &round.name)
            .await
            .map_err(|e| SimulationError::StartFailed(e.to_string()))?;
        if stale > 0 {
            warn!(
                "Removed {} stale problems for round '{}' before saving",
                stale, round.name
            );
        }

        let metadata = RoundMetadata {
            simulation_id: simulation.id,
            round_name: round.name.clone(),
            round_type: round.category,
            duration_minutes: round.duration_minutes,
        };
        let report = self.gateway.save(user_id, &candidates, &metadata).await?;
        for error in &report.outcome.errors {
            warn!("Round '{}': {}", round.name, error);
        }
        if report.problems.is_empty() {
            return Err(SimulationError::NoProblemsGenerated {
                round_name: round.name.clone(),
            });
        }

        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            simulation_id: simulation.id,
            round_index,
            round_name: round.name.clone(),
            round_type: round.category,
            problems: report.problems,
            current_problem_index: 0,
            status: SessionStatus::Active,
            started_at: Utc::now(),
            completed_at: None,
            result: None,
        };
        self.save_session(&session)
            .await
            .map_err(|e| SimulationError::StartFailed(e.to_string()))?;

        // The session is the source of truth from here on; a stale round status is cosmetic.
        if let Err(e) = self.mark_round_started(simulation.id, round_index).await {
            warn!("Session {} started but round status not updated: {}", session.id, e);
        }

        info!(
            "Started session {} for round '{}' with {} problems",
            session.id,
            session.round_name,
            session.problems.len()
        );
        Ok(session)
    }

    async fn mark_round_started(
        &self,
        simulation_id: Uuid,
        round_index: usize,
    ) -> Result<(), SimulationError> {
        self.update_simulation(simulation_id, |s| s.record_round_started(round_index))
            .await?;
        Ok(())
    }

    async fn load_simulation(&self, simulation_id: Uuid) -> Result<Simulation, SimulationError> {
        get_typed(self.store.as_ref(), SIMULATIONS, &simulation_id.to_string())
            .await?
            .ok_or(SimulationError::SimulationNotFound(simulation_id))
    }

    /// Keeps an active session going. Backfills problems from the store when the
    /// session has none; never regenerates them.
    pub async fn resume(&self, mut session: Session) -> Result<Session, SimulationError> {
        if !session.is_active() {
            return Err(SimulationError::invalid_transition(
                session.id,
                session.status,
                "resume",
            ));
        }
        if !session.problems.is_empty() {
            return Ok(session);
        }

        let problems = self
            .gateway
            .round_problems(session.simulation_id, session.user_id, &session.round_name)
            .await?;
        if problems.is_empty() {
            warn!(
                "Session {} has no problems and none are persisted for round '{}'",
                session.id, session.round_name
            );
            return Ok(session);
        }

        info!(
            "Backfilled {} problems into session {}",
            problems.len(),
            session.id
        );
        session.problems = problems;
        self.save_session(&session).await?;
        Ok(session)
    }

    pub async fn complete(
        &self,
        session_id: Uuid,
        result: SessionResult,
    ) -> Result<Session, SimulationError> {
        let session = self.load_session(session_id).await?;
        let _guard = self
            .round_locks
            .lock((session.simulation_id, session.user_id, session.round_name.clone()))
            .await;

        // Re-read under the lock; a racing complete or restart may have won.
        let mut session = self.load_session(session_id).await?;
        if !session.is_active() {
            return Err(SimulationError::invalid_transition(
                session.id,
                session.status,
                "complete",
            ));
        }

        session.status = SessionStatus::Completed;
        session.completed_at = Some(Utc::now());
        session.result = Some(result);
        self.save_session(&session).await?;

        let round_index = session.round_index;
        let simulation = self
            .update_simulation(session.simulation_id, |s| s.record_round_completed(round_index))
            .await?;

        info!(
            "Completed session {} (round '{}'); simulation {} now at round {}",
            session.id, session.round_name, simulation.id, simulation.current_round_index
        );
        Ok(session)
    }

    /// Discards any session and persisted problems for the round, then starts fresh.
    pub async fn restart(
        &self,
        simulation: &Simulation,
        user_id: Uuid,
        round_index: usize,
    ) -> Result<Session, SimulationError> {
        let round_name = round_name(simulation, round_index)?;
        let _guard = self
            .round_locks
            .lock((simulation.id, user_id, round_name.clone()))
            .await;

        let sessions = self
            .sessions_for_round(simulation.id, user_id, &round_name)
            .await?;
        for session in &sessions {
            self.store.delete(SESSIONS, &session.id.to_string()).await?;
        }
        let removed = self
            .gateway
            .delete_round_problems(simulation.id, user_id, &round_name)
            .await?;
        info!(
            "Restarting round '{}': removed {} sessions and {} problems",
            round_name,
            sessions.len(),
            removed
        );

        self.start_locked(simulation, user_id, round_index).await
    }

    /// Moves the cursor within an active session's problem list.
    pub async fn advance(
        &self,
        session_id: Uuid,
        problem_index: usize,
    ) -> Result<Session, SimulationError> {
        let mut session = self.load_session(session_id).await?;
        if !session.is_active() {
            return Err(SimulationError::invalid_transition(
                session.id,
                session.status,
                "advance",
            ));
        }
        if problem_index >= session.problems.len() {
            return Err(SimulationError::InvalidRequest(format!(
                "problem index {} out of range for {} problems",
                problem_index,
                session.problems.len()
            )));
        }
        session.current_problem_index = problem_index;
        self.save_session(&session).await?;
        Ok(session)
    }
}

fn round_name(simulation: &Simulation, round_index: usize) -> Result<String, SimulationError> {
    simulation
        .round(round_index)
        .map(|r| r.name.clone())
        .ok_or(SimulationError::InvalidRoundIndex {
            index: round_index,
            round_count: simulation.rounds.len(),
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::models::problem::{Difficulty, RoundCategory};
    use crate::models::simulation::{RoundStatus, SimulationStatus};
    use crate::simulation::generator::tests::ScriptedSource;
    use crate::simulation::generator::ProblemSource;
    use crate::simulation::planner::{plan_rounds, RoundBlueprint};
    use crate::simulation::validator::ValidationPolicy;
    use crate::store::{MemoryStore, StoreError, PROBLEMS};

    pub struct Harness {
        pub store: Arc<MemoryStore>,
        pub source: Arc<ScriptedSource>,
        pub manager: SessionManager,
        pub simulation: Simulation,
    }

    pub fn blueprints() -> Vec<RoundBlueprint> {
        vec![
            RoundBlueprint {
                name: "Coding".to_string(),
                category: RoundCategory::Dsa,
                description: String::new(),
                difficulty: Difficulty::Medium,
                focus_areas: vec![],
            },
            RoundBlueprint {
                name: "Design".to_string(),
                category: RoundCategory::SystemDesign,
                description: String::new(),
                difficulty: Difficulty::Hard,
                focus_areas: vec![],
            },
        ]
    }

    fn manager_over(store: Arc<dyn DocumentStore>, source: Arc<dyn ProblemSource>) -> SessionManager {
        SessionManager::new(
            store.clone(),
            ProblemGenerator::new(source, Duration::from_secs(5)),
            PersistenceGateway::new(store, ValidationPolicy::default()),
        )
    }

    fn new_simulation() -> Simulation {
        Simulation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            company_name: "Acme".to_string(),
            role_level: "senior".to_string(),
            rounds: plan_rounds(120, &blueprints()),
            current_round_index: 0,
            completed_rounds: Default::default(),
            status: SimulationStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub async fn harness(source: ScriptedSource) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(source);
        let manager = manager_over(store.clone(), source.clone());
        let simulation = new_simulation();
        put_typed(
            store.as_ref(),
            SIMULATIONS,
            &simulation.id.to_string(),
            &simulation,
        )
        .await
        .unwrap();
        Harness {
            store,
            source,
            manager,
            simulation,
        }
    }

    /// Memory store that can slow simulation reads and refuse session writes.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryStore,
        simulation_read_delay: Option<Duration>,
        failing_session_writes: AtomicU32,
    }

    #[async_trait]
    impl DocumentStore for FaultyStore {
        async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
            let doc = self.inner.get(collection, id).await?;
            if collection == SIMULATIONS {
                if let Some(delay) = self.simulation_read_delay {
                    tokio::time::sleep(delay).await;
                }
            }
            Ok(doc)
        }

        async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Value>, StoreError> {
            self.inner.query(collection, filters).await
        }

        async fn put(&self, collection: &str, id: &str, record: Value) -> Result<(), StoreError> {
            if collection == SESSIONS
                && self
                    .failing_session_writes
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(StoreError::Write {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    message: "rejected".to_string(),
                });
            }
            self.inner.put(collection, id, record).await
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
            self.inner.delete(collection, id).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    async fn seeded(store: &FaultyStore) -> Simulation {
        let simulation = new_simulation();
        put_typed(store, SIMULATIONS, &simulation.id.to_string(), &simulation)
            .await
            .unwrap();
        simulation
    }

    #[tokio::test]
    async fn test_start_creates_active_session_with_saved_problems() {
        let h = harness(ScriptedSource::default()).await;
        let user = h.simulation.user_id;

        let session = h.manager.start(&h.simulation, user, 0).await.unwrap();

        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.current_problem_index, 0);
        assert_eq!(session.round_name, "Coding");
        // 60-minute round → 3 slots, 20 minutes each.
        assert_eq!(session.problems.len(), 3);
        let total: u32 = session.problems.iter().map(|p| p.estimated_time).sum();
        assert_eq!(total, 60);
        assert_eq!(h.store.len(PROBLEMS).await, 3);

        let sim: Simulation = get_typed(h.store.as_ref(), SIMULATIONS, &h.simulation.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sim.rounds[0].status, RoundStatus::Active);
    }

    #[tokio::test]
    async fn test_start_twice_resumes_without_regenerating() {
        let h = harness(ScriptedSource::default()).await;
        let user = h.simulation.user_id;

        let first = h.manager.start(&h.simulation, user, 0).await.unwrap();
        let calls = h.source.call_count();
        let second = h.manager.start(&h.simulation, user, 0).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.problems, second.problems);
        assert_eq!(h.source.call_count(), calls);
    }

    #[tokio::test]
    async fn test_concurrent_starts_share_one_session() {
        let h = harness(ScriptedSource::default()).await;
        let user = h.simulation.user_id;

        let (a, b) = tokio::join!(
            h.manager.start(&h.simulation, user, 0),
            h.manager.start(&h.simulation, user, 0)
        );

        assert_eq!(a.unwrap().id, b.unwrap().id);
        assert_eq!(h.source.call_count(), 3);
    }

    #[tokio::test]
    async fn test_start_fails_retryably_when_every_slot_fails() {
        let h = harness(ScriptedSource::failing(vec![0, 1, 2])).await;
        let user = h.simulation.user_id;

        let err = h.manager.start(&h.simulation, user, 0).await.unwrap_err();

        assert!(matches!(err, SimulationError::NoProblemsGenerated { .. }));
        assert!(err.is_retryable());
        assert!(h.manager.find_session(h.simulation.id, user, "Coding").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_start_rejects_out_of_range_round() {
        let h = harness(ScriptedSource::default()).await;
        let err = h
            .manager
            .start(&h.simulation, h.simulation.user_id, 2)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::InvalidRoundIndex {
                index: 2,
                round_count: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_resume_backfills_from_store_without_generation() {
        let h = harness(ScriptedSource::default()).await;
        let user = h.simulation.user_id;
        let mut session = h.manager.start(&h.simulation, user, 0).await.unwrap();
        let expected = session.problems.clone();
        let calls = h.source.call_count();

        session.problems.clear();
        let resumed = h.manager.resume(session).await.unwrap();

        assert_eq!(resumed.problems, expected);
        assert_eq!(h.source.call_count(), calls);
    }

    #[tokio::test]
    async fn test_complete_advances_simulation() {
        let h = harness(ScriptedSource::default()).await;
        let user = h.simulation.user_id;
        let session = h.manager.start(&h.simulation, user, 0).await.unwrap();

        let result = SessionResult {
            score: Some(0.75),
            feedback: None,
            answers: json!({"round_0_problem_0": "dp"}),
        };
        let done = h.manager.complete(session.id, result.clone()).await.unwrap();

        assert_eq!(done.status, SessionStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.result, Some(result));

        let sim: Simulation = get_typed(h.store.as_ref(), SIMULATIONS, &h.simulation.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sim.current_round_index, 1);
        assert!(sim.completed_rounds.contains("round_0"));
        assert_eq!(sim.rounds[0].status, RoundStatus::Completed);

        let again = h.manager.complete(session.id, SessionResult::default()).await;
        assert!(matches!(again, Err(SimulationError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_start_on_completed_round_requires_restart() {
        let h = harness(ScriptedSource::default()).await;
        let user = h.simulation.user_id;
        let session = h.manager.start(&h.simulation, user, 0).await.unwrap();
        h.manager.complete(session.id, SessionResult::default()).await.unwrap();

        let err = h.manager.start(&h.simulation, user, 0).await.unwrap_err();
        assert!(matches!(err, SimulationError::InvalidTransition { action: "start", .. }));
    }

    #[tokio::test]
    async fn test_restart_replaces_session() {
        let h = harness(ScriptedSource::default()).await;
        let user = h.simulation.user_id;
        let first = h.manager.start(&h.simulation, user, 0).await.unwrap();
        h.manager.advance(first.id, 2).await.unwrap();

        let fresh = h.manager.restart(&h.simulation, user, 0).await.unwrap();

        assert_ne!(fresh.id, first.id);
        assert_eq!(fresh.current_problem_index, 0);
        assert!(matches!(
            h.manager.load_session(first.id).await,
            Err(SimulationError::SessionNotFound(_))
        ));
        assert_eq!(h.store.len(PROBLEMS).await, 3);
        assert_eq!(h.store.len(SESSIONS).await, 1);
    }

    #[tokio::test]
    async fn test_advance_bounds() {
        let h = harness(ScriptedSource::default()).await;
        let session = h
            .manager
            .start(&h.simulation, h.simulation.user_id, 1)
            .await
            .unwrap();
        assert_eq!(session.problems.len(), 3);

        let moved = h.manager.advance(session.id, 1).await.unwrap();
        assert_eq!(moved.current_problem_index, 1);
        assert!(matches!(
            h.manager.advance(session.id, 3).await,
            Err(SimulationError::InvalidRequest(_))
        ));
        assert!(matches!(
            h.manager.advance(Uuid::new_v4(), 0).await,
            Err(SimulationError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_completions_both_recorded() {
        let store = Arc::new(FaultyStore {
            simulation_read_delay: Some(Duration::from_millis(30)),
            ..FaultyStore::default()
        });
        let manager = manager_over(store.clone(), Arc::new(ScriptedSource::default()));
        let simulation = seeded(&store).await;
        let user = simulation.user_id;

        let first = manager.start(&simulation, user, 0).await.unwrap();
        let second = manager.start(&simulation, user, 1).await.unwrap();
        let (a, b) = tokio::join!(
            manager.complete(first.id, SessionResult::default()),
            manager.complete(second.id, SessionResult::default())
        );
        a.unwrap();
        b.unwrap();

        let sim: Simulation = get_typed(store.as_ref(), SIMULATIONS, &simulation.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sim.completed_rounds.len(), 2);
        assert_eq!(sim.current_round_index, 2);
        assert_eq!(sim.status, SimulationStatus::Completed);
    }

    #[tokio::test]
    async fn test_lock_entries_released_after_use() {
        let h = harness(ScriptedSource::default()).await;
        let user = h.simulation.user_id;

        let session = h.manager.start(&h.simulation, user, 0).await.unwrap();
        h.manager.start(&h.simulation, user, 1).await.unwrap();
        h.manager.complete(session.id, SessionResult::default()).await.unwrap();
        h.manager.restart(&h.simulation, user, 0).await.unwrap();

        assert_eq!(h.manager.round_locks.len(), 0);
        assert_eq!(h.manager.simulation_locks.len(), 0);
    }

    #[tokio::test]
    async fn test_retry_after_failed_session_write_drops_stale_problems() {
        let store = Arc::new(FaultyStore {
            failing_session_writes: AtomicU32::new(1),
            ..FaultyStore::default()
        });
        // The first attempt uses calls 0..3; one slot of the retry fails.
        let source = Arc::new(ScriptedSource::failing(vec![3]));
        let manager = manager_over(store.clone(), source);
        let simulation = seeded(&store).await;
        let user = simulation.user_id;

        let err = manager.start(&simulation, user, 0).await.unwrap_err();
        assert!(matches!(err, SimulationError::StartFailed(_)));
        assert!(err.is_retryable());

        let session = manager.start(&simulation, user, 0).await.unwrap();
        assert_eq!(session.problems.len(), 2);

        let persisted = manager
            .gateway
            .round_problems(simulation.id, user, "Coding")
            .await
            .unwrap();
        assert_eq!(persisted, session.problems);
        let total: u32 = persisted.iter().map(|p| p.estimated_time).sum();
        assert_eq!(total, 60);
    }
}
