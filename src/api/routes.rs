use std::sync::Arc;

use axum::{extract::FromRef, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::health::health_check;
use super::{athletes, catalog, dashboard, plans, sessions};
use crate::auth::JwtService;
use crate::models::Timezone;
use crate::repository::Store;
use crate::services::{
    AssignmentService, AthleteService, CatalogService, DashboardService, PlanGenerationService, PlanGenerator,
    PlanService, SessionService,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub jwt: JwtService,
    pub plans: PlanService,
    pub catalog: CatalogService,
    pub athletes: AthleteService,
    pub assignments: AssignmentService,
    pub sessions: SessionService,
    pub dashboard: DashboardService,
    pub generation: PlanGenerationService,
    /// Used when a dashboard request carries no `tz`
    pub default_timezone: Timezone,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        jwt: JwtService,
        generator: Option<Arc<dyn PlanGenerator>>,
        default_timezone: Timezone,
        recent_completed_days: i64,
    ) -> Self {
        Self {
            jwt,
            plans: PlanService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            athletes: AthleteService::new(store.clone()),
            assignments: AssignmentService::new(store.clone(), default_timezone),
            sessions: SessionService::new(store.clone()),
            dashboard: DashboardService::new(store.clone(), recent_completed_days),
            generation: PlanGenerationService::new(store, generator),
            default_timezone,
        }
    }
}

impl FromRef<AppState> for JwtService {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

pub fn create_routes(state: AppState) -> Router {
    let api = Router::new()
        .merge(plans::routes())
        .merge(sessions::routes())
        .merge(dashboard::routes())
        .merge(catalog::routes())
        .merge(athletes::routes());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
