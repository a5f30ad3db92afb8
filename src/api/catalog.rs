use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::routes::AppState;
use crate::auth::Principal;
use crate::models::{
    CreateExercise, CreateExerciseType, CreateTag, CreateUnit, ExerciseQuery, ExerciseType, ExerciseView, Tag, Unit,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/catalog/exercise-types", post(create_exercise_type))
        .route("/catalog/units", post(create_unit))
        .route("/catalog/tags", post(create_tag))
        .route("/catalog/exercises", post(create_exercise).get(list_exercises))
        .route("/catalog/exercises/:id", get(get_exercise))
}

#[tracing::instrument(skip(state, input))]
pub async fn create_exercise_type(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Json(input), _): WithRejection<Json<CreateExerciseType>, ApiError>,
) -> ApiResult<(StatusCode, Json<ExerciseType>)> {
    let created = state.catalog.create_exercise_type(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(skip(state, input))]
pub async fn create_unit(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Json(input), _): WithRejection<Json<CreateUnit>, ApiError>,
) -> ApiResult<(StatusCode, Json<Unit>)> {
    let created = state.catalog.create_unit(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(skip(state, input))]
pub async fn create_tag(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Json(input), _): WithRejection<Json<CreateTag>, ApiError>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    let created = state.catalog.create_tag(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(skip(state, input))]
pub async fn create_exercise(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Json(input), _): WithRejection<Json<CreateExercise>, ApiError>,
) -> ApiResult<(StatusCode, Json<ExerciseView>)> {
    let created = state.catalog.create_exercise(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Catalog listing, optionally filtered by type or tag
#[tracing::instrument(skip(state, _principal))]
pub async fn list_exercises(
    State(state): State<AppState>,
    _principal: Principal,
    WithRejection(Query(query), _): WithRejection<Query<ExerciseQuery>, ApiError>,
) -> ApiResult<Json<Vec<ExerciseView>>> {
    let exercises = state.catalog.list_exercises(query).await?;
    Ok(Json(exercises))
}

#[tracing::instrument(skip(state, _principal))]
pub async fn get_exercise(
    State(state): State<AppState>,
    _principal: Principal,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ExerciseView>> {
    let exercise = state.catalog.get_exercise(id).await?;
    Ok(Json(exercise))
}
