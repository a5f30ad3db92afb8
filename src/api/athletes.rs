use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::routes::AppState;
use crate::auth::Principal;
use crate::models::{Athlete, AthleteGroup, AthleteGroupHistory, AthleteProfileInput, CreateAthleteGroup, MoveAthlete};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/athletes/me", post(create_profile).get(get_profile).put(update_profile))
        .route("/athletes/:id/history", get(group_history))
        .route("/athletes/:id/group", put(move_athlete))
        .route("/athlete-groups", post(create_athlete_group).get(list_athlete_groups))
        .route("/athlete-groups/:id/members", get(list_group_members))
}

#[tracing::instrument(skip(state, input))]
pub async fn create_profile(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Json(input), _): WithRejection<Json<AthleteProfileInput>, ApiError>,
) -> ApiResult<(StatusCode, Json<Athlete>)> {
    let athlete = state.athletes.create_profile(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(athlete)))
}

#[tracing::instrument(skip(state))]
pub async fn get_profile(State(state): State<AppState>, principal: Principal) -> ApiResult<Json<Athlete>> {
    let athlete = state.athletes.get_profile(&principal).await?;
    Ok(Json(athlete))
}

#[tracing::instrument(skip(state, input))]
pub async fn update_profile(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Json(input), _): WithRejection<Json<AthleteProfileInput>, ApiError>,
) -> ApiResult<Json<Athlete>> {
    let athlete = state.athletes.update_profile(&principal, input).await?;
    Ok(Json(athlete))
}

/// Append-only membership ledger of one athlete
#[tracing::instrument(skip(state))]
pub async fn group_history(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Vec<AthleteGroupHistory>>> {
    let history = state.athletes.group_history(&principal, id).await?;
    Ok(Json(history))
}

#[tracing::instrument(skip(state, request))]
pub async fn move_athlete(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(request), _): WithRejection<Json<MoveAthlete>, ApiError>,
) -> ApiResult<Json<Athlete>> {
    let athlete = state.athletes.move_athlete(&principal, id, request).await?;
    Ok(Json(athlete))
}

#[tracing::instrument(skip(state, input))]
pub async fn create_athlete_group(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Json(input), _): WithRejection<Json<CreateAthleteGroup>, ApiError>,
) -> ApiResult<(StatusCode, Json<AthleteGroup>)> {
    let group = state.athletes.create_athlete_group(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[tracing::instrument(skip(state))]
pub async fn list_athlete_groups(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<Json<Vec<AthleteGroup>>> {
    let groups = state.athletes.list_athlete_groups(&principal).await?;
    Ok(Json(groups))
}

#[tracing::instrument(skip(state))]
pub async fn list_group_members(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Vec<Athlete>>> {
    let members = state.athletes.list_group_members(&principal, id).await?;
    Ok(Json(members))
}
