//! Axum route handlers for the Simulation API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::session::{Session, SessionResult};
use crate::models::simulation::Simulation;
use crate::simulation::orchestrator::{NewSimulation, RoundView};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub user_id: Uuid,
    pub round_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RoundActionRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub current_problem_index: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/simulations
pub async fn handle_create_simulation(
    State(state): State<AppState>,
    Json(request): Json<NewSimulation>,
) -> Result<(StatusCode, Json<Simulation>), AppError> {
    let simulation = state.orchestrator.create_simulation(request).await?;
    Ok((StatusCode::CREATED, Json(simulation)))
}

/// GET /api/v1/simulations/:id
pub async fn handle_get_simulation(
    State(state): State<AppState>,
    Path(simulation_id): Path<Uuid>,
) -> Result<Json<Simulation>, AppError> {
    Ok(Json(state.orchestrator.get_simulation(simulation_id).await?))
}

/// GET /api/v1/simulations/:id/session?user_id=&round_name=
///
/// Returns `null` when the round has not been started.
pub async fn handle_get_session_for_round(
    State(state): State<AppState>,
    Path(simulation_id): Path<Uuid>,
    Query(params): Query<SessionQuery>,
) -> Result<Json<Option<Session>>, AppError> {
    let session = state
        .orchestrator
        .get_session_for_round(simulation_id, params.user_id, &params.round_name)
        .await?;
    Ok(Json(session))
}

/// GET /api/v1/simulations/:id/rounds/:index?user_id=
pub async fn handle_load_round(
    State(state): State<AppState>,
    Path((simulation_id, round_index)): Path<(Uuid, usize)>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<RoundView>, AppError> {
    let view = state
        .orchestrator
        .load_round(simulation_id, params.user_id, round_index)
        .await?;
    Ok(Json(view))
}

/// POST /api/v1/simulations/:id/rounds/:index/start
///
/// Generates the round's problems on first call; later calls resume the
/// existing active session.
pub async fn handle_start_round(
    State(state): State<AppState>,
    Path((simulation_id, round_index)): Path<(Uuid, usize)>,
    Json(request): Json<RoundActionRequest>,
) -> Result<Json<Session>, AppError> {
    let session = state
        .orchestrator
        .start_round(simulation_id, request.user_id, round_index)
        .await?;
    Ok(Json(session))
}

/// POST /api/v1/simulations/:id/rounds/:index/restart
pub async fn handle_restart_round(
    State(state): State<AppState>,
    Path((simulation_id, round_index)): Path<(Uuid, usize)>,
    Json(request): Json<RoundActionRequest>,
) -> Result<Json<Session>, AppError> {
    let session = state
        .orchestrator
        .restart_round(simulation_id, request.user_id, round_index)
        .await?;
    Ok(Json(session))
}

/// POST /api/v1/sessions/:id/continue
pub async fn handle_continue_round(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(state.orchestrator.continue_round(session_id).await?))
}

/// POST /api/v1/sessions/:id/complete
pub async fn handle_complete_round(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(result): Json<SessionResult>,
) -> Result<StatusCode, AppError> {
    state
        .orchestrator
        .complete_round(session_id, result)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/sessions/:id/progress
pub async fn handle_update_progress(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ProgressRequest>,
) -> Result<Json<Session>, AppError> {
    let session = state
        .orchestrator
        .advance(session_id, request.current_problem_index)
        .await?;
    Ok(Json(session))
}
