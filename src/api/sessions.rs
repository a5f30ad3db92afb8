use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::routes::AppState;
use crate::auth::Principal;
use crate::models::{
    AssignmentReport, BulkTransitionReport, SessionWithDetails, TrainingDetail, TrainingSession,
    UpdateSessionDetails,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/preset-groups/:id/assign", post(assign_preset_group))
        .route("/preset-groups/:id/sessions", get(list_group_sessions))
        .route("/preset-groups/:id/sessions/start", post(bulk_start_group_sessions))
        .route("/preset-groups/:id/sessions/complete", post(bulk_complete_group_sessions))
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/start", post(start_session))
        .route("/sessions/:id/details", put(update_session_details))
        .route("/sessions/:id/complete", post(complete_session))
}

/// Fan a preset group out into training sessions
#[tracing::instrument(skip(state))]
pub async fn assign_preset_group(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<AssignmentReport>> {
    let report = state.assignments.assign_preset_group(&principal, id).await?;
    Ok(Json(report))
}

#[tracing::instrument(skip(state))]
pub async fn list_group_sessions(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Vec<TrainingSession>>> {
    let sessions = state.sessions.list_group_sessions(&principal, id).await?;
    Ok(Json(sessions))
}

#[tracing::instrument(skip(state))]
pub async fn bulk_start_group_sessions(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<BulkTransitionReport>> {
    let report = state.sessions.bulk_start_group_sessions(&principal, id).await?;
    Ok(Json(report))
}

#[tracing::instrument(skip(state))]
pub async fn bulk_complete_group_sessions(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<BulkTransitionReport>> {
    let report = state.sessions.bulk_complete_group_sessions(&principal, id).await?;
    Ok(Json(report))
}

/// Sessions of the calling athlete
#[tracing::instrument(skip(state))]
pub async fn list_sessions(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<Json<Vec<TrainingSession>>> {
    let sessions = state.sessions.list_sessions(&principal).await?;
    Ok(Json(sessions))
}

#[tracing::instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<SessionWithDetails>> {
    let session = state.sessions.get_session(&principal, id).await?;
    Ok(Json(session))
}

#[tracing::instrument(skip(state))]
pub async fn start_session(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<SessionWithDetails>> {
    let session = state.sessions.start_session(&principal, id).await?;
    Ok(Json(session))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_session_details(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateSessionDetails>, ApiError>,
) -> ApiResult<Json<Vec<TrainingDetail>>> {
    let details = state.sessions.update_session_details(&principal, id, request).await?;
    Ok(Json(details))
}

#[tracing::instrument(skip(state))]
pub async fn complete_session(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<TrainingSession>> {
    let session = state.sessions.complete_session(&principal, id).await?;
    Ok(Json(session))
}
