use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use super::error::{ApiError, ApiResult};
use super::routes::AppState;
use crate::auth::Principal;
use crate::models::{DashboardSession, Timezone};

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// UTC offset of the caller, e.g. `+02:00` (default: server timezone)
    pub tz: Option<String>,
}

impl DashboardQuery {
    pub fn timezone(&self, fallback: Timezone) -> Result<Timezone, ApiError> {
        let Some(raw) = self.tz.as_deref() else {
            return Ok(fallback);
        };
        // an unencoded `+` arrives as a space
        let normalized = match raw.strip_prefix(' ') {
            Some(rest) => format!("+{}", rest),
            None => raw.to_string(),
        };
        normalized
            .parse()
            .map_err(|e: crate::models::TimezoneParseError| ApiError::bad_request(e.to_string()))
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(get_dashboard_session))
}

/// The one session the calling athlete should see right now
#[tracing::instrument(skip(state))]
pub async fn get_dashboard_session(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Query(query), _): WithRejection<Query<DashboardQuery>, ApiError>,
) -> ApiResult<Json<DashboardSession>> {
    let tz = query.timezone(state.default_timezone)?;
    let selected = state.dashboard.resolve_dashboard_session(&principal, tz).await?;
    Ok(Json(selected))
}
