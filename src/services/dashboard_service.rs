use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::caller_athlete;
use crate::auth::Principal;
use crate::errors::{ServiceError, ServiceResult};
use crate::models::{DashboardSession, DashboardSessionType, SessionStatus, Timezone, TrainingSession};
use crate::repository::Store;

/// Picks the single session an athlete should see right now.
#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn Store>,
    recent_completed_window: Duration,
}

/// First match wins: ongoing, today's assigned/pending, next pending,
/// recently completed, none.
pub fn select_dashboard_session(
    sessions: &[TrainingSession],
    now: DateTime<Utc>,
    tz: Timezone,
    recent_completed_window: Duration,
) -> DashboardSession {
    if let Some(ongoing) = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Ongoing)
        .max_by_key(|s| s.scheduled_at)
    {
        return DashboardSession::of(DashboardSessionType::Ongoing, ongoing.clone());
    }

    let today = tz.local_date(now);
    if let Some(due_today) = sessions
        .iter()
        .filter(|s| SessionStatus::NOT_STARTED.contains(&s.status))
        .filter(|s| tz.local_date(s.scheduled_at) == today)
        .min_by_key(|s| s.scheduled_at)
    {
        return DashboardSession::of(DashboardSessionType::Today, due_today.clone());
    }

    if let Some(upcoming) = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Pending && s.scheduled_at > now)
        .min_by_key(|s| s.scheduled_at)
    {
        return DashboardSession::of(DashboardSessionType::Upcoming, upcoming.clone());
    }

    let window_start = now - recent_completed_window;
    if let Some(recent) = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .filter(|s| s.scheduled_at >= window_start && s.scheduled_at <= now)
        .max_by_key(|s| s.scheduled_at)
    {
        return DashboardSession::of(DashboardSessionType::RecentCompleted, recent.clone());
    }

    DashboardSession::none()
}

impl DashboardService {
    pub fn new(store: Arc<dyn Store>, recent_completed_days: i64) -> Self {
        Self {
            store,
            recent_completed_window: Duration::days(recent_completed_days),
        }
    }

    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn resolve_dashboard_session(&self, principal: &Principal, tz: Timezone) -> ServiceResult<DashboardSession> {
        let athlete = caller_athlete(self.store.as_ref(), principal)
            .await?
            .ok_or_else(|| ServiceError::not_found("athlete", principal.user_id))?;
        self.resolve_for_athlete(athlete.id, tz, Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn resolve_for_athlete(
        &self,
        athlete_id: Uuid,
        tz: Timezone,
        now: DateTime<Utc>,
    ) -> ServiceResult<DashboardSession> {
        if self.store.get_athlete(athlete_id).await?.is_none() {
            return Err(ServiceError::not_found("athlete", athlete_id));
        }

        let sessions = self.store.list_sessions_for_athlete(athlete_id).await?;
        let selected = select_dashboard_session(&sessions, now, tz, self.recent_completed_window);
        debug!(%athlete_id, kind = ?selected.session_type, "dashboard session resolved");
        Ok(selected)
    }
}
