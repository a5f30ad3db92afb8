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
use crate::models::{
    CreatePlanNode, PlanGenerationRequest, PlanNode, PlanNodeCreated, PlanNodeKind, PlanTree, PresetGroup,
    PresetGroupNode, UpdatePlanNode,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/plans/nodes", post(create_plan_node))
        .route("/plans/nodes/:kind/:id", put(update_plan_node).delete(delete_plan_node))
        .route("/plans/tree/:kind/:id", get(get_plan_tree))
        .route("/plans/preset-groups", get(list_preset_groups))
        .route("/plans/generate", post(generate_preset_group))
}

/// Create one node of the plan hierarchy
#[tracing::instrument(skip(state, node))]
pub async fn create_plan_node(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Json(node), _): WithRejection<Json<CreatePlanNode>, ApiError>,
) -> ApiResult<(StatusCode, Json<PlanNodeCreated>)> {
    let created = state.plans.create_plan_node(&principal, node).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(skip(state, update))]
pub async fn update_plan_node(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path((kind, id)), _): WithRejection<Path<(PlanNodeKind, Uuid)>, ApiError>,
    WithRejection(Json(update), _): WithRejection<Json<UpdatePlanNode>, ApiError>,
) -> ApiResult<Json<PlanNode>> {
    if update.kind() != kind {
        return Err(ApiError::bad_request(format!(
            "body describes a {} but the path names a {}",
            update.kind(),
            kind
        )));
    }
    let node = state.plans.update_plan_node(&principal, id, update).await?;
    Ok(Json(node))
}

#[tracing::instrument(skip(state))]
pub async fn delete_plan_node(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path((kind, id)), _): WithRejection<Path<(PlanNodeKind, Uuid)>, ApiError>,
) -> ApiResult<StatusCode> {
    state.plans.delete_plan_node(&principal, kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Nested tree below a macrocycle, mesocycle, microcycle or preset group
#[tracing::instrument(skip(state))]
pub async fn get_plan_tree(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path((kind, id)), _): WithRejection<Path<(PlanNodeKind, Uuid)>, ApiError>,
) -> ApiResult<Json<PlanTree>> {
    let tree = state.plans.get_plan_tree(&principal, kind, id).await?;
    Ok(Json(tree))
}

#[tracing::instrument(skip(state))]
pub async fn list_preset_groups(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<Json<Vec<PresetGroup>>> {
    let groups = state.plans.list_preset_groups(&principal).await?;
    Ok(Json(groups))
}

/// Ask the external generator for a preset group and store it
#[tracing::instrument(skip(state, request))]
pub async fn generate_preset_group(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Json(request), _): WithRejection<Json<PlanGenerationRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<PresetGroupNode>)> {
    let group = state.generation.generate_preset_group(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(group)))
}
