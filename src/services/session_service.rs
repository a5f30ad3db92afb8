use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::caller_athlete;
use crate::auth::{policy, Principal};
use crate::errors::{ServiceError, ServiceResult};
use crate::models::{
    BulkTransitionFailure, BulkTransitionReport, PresetDetail, PresetGroup, SessionStatus,
    SessionWithDetails, Timezone, TrainingDetail, TrainingSession, UpdateSessionDetails,
};
use crate::repository::{BeginOutcome, Store};

/// Drives training sessions through pending -> assigned -> ongoing -> completed.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn Store>,
}

/// One training detail per planned set, seeded with the planned values.
pub fn materialize_details(
    session_id: Uuid,
    planned: &[PresetDetail],
    now: DateTime<Utc>,
) -> Vec<TrainingDetail> {
    planned
        .iter()
        .map(|detail| TrainingDetail {
            id: Uuid::new_v4(),
            training_session_id: session_id,
            preset_id: detail.preset_id,
            set_index: detail.set_index,
            actual: detail.planned.clone(),
            completed: false,
            updated_at: now,
        })
        .collect()
}

impl SessionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn load_session(&self, id: Uuid) -> ServiceResult<TrainingSession> {
        self.store
            .get_session(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("training_session", id))
    }

    async fn load_group(&self, session: &TrainingSession) -> ServiceResult<PresetGroup> {
        self.store
            .get_preset_group(session.preset_group_id)
            .await?
            .ok_or_else(|| {
                ServiceError::DataIntegrity(format!(
                    "training session {} references missing preset group {}",
                    session.id, session.preset_group_id
                ))
            })
    }

    /// Every planned set under the preset group, fetched in two batch reads.
    async fn planned_sets(&self, preset_group_id: Uuid) -> ServiceResult<Vec<PresetDetail>> {
        let presets = self.store.list_presets_by_groups(&[preset_group_id]).await?;
        if presets.is_empty() {
            return Ok(Vec::new());
        }
        let preset_ids: Vec<Uuid> = presets.iter().map(|p| p.id).collect();
        Ok(self.store.list_preset_details_by_presets(&preset_ids).await?)
    }

    /// `pending|assigned -> ongoing`, materializing one training detail per
    /// planned set in the same store transaction.
    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn start_session(&self, principal: &Principal, session_id: Uuid) -> ServiceResult<SessionWithDetails> {
        let session = self.load_session(session_id).await?;
        let caller = caller_athlete(self.store.as_ref(), principal).await?;
        if !policy::can_operate_session(&session, caller.as_ref()) {
            return Err(ServiceError::forbidden("training_session", session_id));
        }
        if !session.status.can_start() {
            return Err(ServiceError::invalid_state(
                "training_session",
                session_id,
                session.status,
                "start",
            ));
        }

        let now = Utc::now();
        let planned = self.planned_sets(session.preset_group_id).await?;
        let details = materialize_details(session_id, &planned, now);

        let session = match self.store.begin_session(session_id, &details, now).await? {
            BeginOutcome::Started {
                session,
                details_created,
            } => {
                if details_created {
                    info!(%session_id, details = details.len(), "session started");
                } else {
                    info!(%session_id, "session started on retry, reusing existing details");
                }
                session
            }
            BeginOutcome::NotStartable(current) => {
                return Err(ServiceError::invalid_state(
                    "training_session",
                    session_id,
                    current.status,
                    "start",
                ))
            }
            BeginOutcome::Missing => return Err(ServiceError::not_found("training_session", session_id)),
        };

        let details = self.store.list_details(session_id).await?;
        Ok(SessionWithDetails { session, details })
    }

    /// Applies athlete-entered values. All-or-nothing: one unknown id rejects the call.
    #[instrument(skip(self, request), fields(user_id = %principal.user_id, updates = request.details.len()))]
    pub async fn update_session_details(
        &self,
        principal: &Principal,
        session_id: Uuid,
        request: UpdateSessionDetails,
    ) -> ServiceResult<Vec<TrainingDetail>> {
        let session = self.load_session(session_id).await?;
        let caller = caller_athlete(self.store.as_ref(), principal).await?;
        if !policy::can_operate_session(&session, caller.as_ref()) {
            return Err(ServiceError::forbidden("training_session", session_id));
        }
        if session.status != SessionStatus::Ongoing {
            return Err(ServiceError::invalid_state(
                "training_session",
                session_id,
                session.status,
                "record sets for",
            ));
        }

        let mut seen = HashSet::new();
        for update in &request.details {
            update.validate()?;
            if !seen.insert(update.id) {
                return Err(ServiceError::validation(format!(
                    "training detail {} submitted twice",
                    update.id
                )));
            }
        }
        if request.details.is_empty() {
            return Ok(Vec::new());
        }

        let known: HashSet<Uuid> = self
            .store
            .list_details(session_id)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        let unknown: Vec<String> = request
            .details
            .iter()
            .filter(|u| !known.contains(&u.id))
            .map(|u| u.id.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(ServiceError::validation(format!(
                "unknown training detail ids for session {}: {}",
                session_id,
                unknown.join(", ")
            )));
        }

        let updated = self
            .store
            .apply_detail_updates(session_id, &request.details, Utc::now())
            .await?
            .ok_or_else(|| {
                ServiceError::validation(format!(
                    "training details changed underneath session {}",
                    session_id
                ))
            })?;

        info!(%session_id, updated = updated.len(), "training details recorded");
        Ok(updated)
    }

    /// `ongoing -> completed`. Completing an already completed session succeeds
    /// unchanged; unfinished sets are allowed.
    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn complete_session(&self, principal: &Principal, session_id: Uuid) -> ServiceResult<TrainingSession> {
        let session = self.load_session(session_id).await?;
        let group = self.load_group(&session).await?;
        let caller = caller_athlete(self.store.as_ref(), principal).await?;
        if !policy::can_complete_session(principal, &session, caller.as_ref(), &group) {
            return Err(ServiceError::forbidden("training_session", session_id));
        }

        match session.status {
            SessionStatus::Completed => Ok(session),
            SessionStatus::Ongoing => {
                let transitioned = self
                    .store
                    .transition_session(session_id, &[SessionStatus::Ongoing], SessionStatus::Completed, Utc::now())
                    .await?;
                match transitioned {
                    Some(session) => {
                        info!(%session_id, "session completed");
                        Ok(session)
                    }
                    None => {
                        // lost a race; a concurrent complete converges to the same state
                        let current = self.load_session(session_id).await?;
                        if current.status == SessionStatus::Completed {
                            Ok(current)
                        } else {
                            Err(ServiceError::invalid_state(
                                "training_session",
                                session_id,
                                current.status,
                                "complete",
                            ))
                        }
                    }
                }
            }
            status => Err(ServiceError::invalid_state(
                "training_session",
                session_id,
                status,
                "complete",
            )),
        }
    }

    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn get_session(&self, principal: &Principal, session_id: Uuid) -> ServiceResult<SessionWithDetails> {
        let session = self.load_session(session_id).await?;
        let group = self.load_group(&session).await?;
        let caller = caller_athlete(self.store.as_ref(), principal).await?;
        if !policy::can_view_session(principal, &session, caller.as_ref(), group.owner_id) {
            return Err(ServiceError::forbidden("training_session", session_id));
        }

        let details = self.store.list_details(session_id).await?;
        Ok(SessionWithDetails { session, details })
    }

    /// The calling athlete's sessions, earliest first.
    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn list_sessions(&self, principal: &Principal) -> ServiceResult<Vec<TrainingSession>> {
        let athlete = caller_athlete(self.store.as_ref(), principal)
            .await?
            .ok_or_else(|| ServiceError::not_found("athlete", principal.user_id))?;
        Ok(self.store.list_sessions_for_athlete(athlete.id).await?)
    }

    async fn coach_run_group(&self, principal: &Principal, preset_group_id: Uuid) -> ServiceResult<PresetGroup> {
        let group = self
            .store
            .get_preset_group(preset_group_id)
            .await?
            .filter(|g| !g.is_deleted)
            .ok_or_else(|| ServiceError::not_found("preset_group", preset_group_id))?;
        if !policy::can_run_group_sessions(principal, &group) {
            return Err(ServiceError::forbidden("preset_group", preset_group_id));
        }
        Ok(group)
    }

    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn list_group_sessions(
        &self,
        principal: &Principal,
        preset_group_id: Uuid,
    ) -> ServiceResult<Vec<TrainingSession>> {
        self.coach_run_group(principal, preset_group_id).await?;
        Ok(self.store.list_sessions_for_preset_group(preset_group_id).await?)
    }

    /// Coach-led start of every not-yet-started session under the group.
    /// Sessions already ongoing or completed are skipped.
    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn bulk_start_group_sessions(
        &self,
        principal: &Principal,
        preset_group_id: Uuid,
    ) -> ServiceResult<BulkTransitionReport> {
        self.coach_run_group(principal, preset_group_id).await?;
        let sessions = self.store.list_sessions_for_preset_group(preset_group_id).await?;
        let planned = self.planned_sets(preset_group_id).await?;

        let mut report = BulkTransitionReport {
            preset_group_id,
            ..Default::default()
        };

        for session in sessions {
            if !session.status.can_start() {
                report.skipped.push(session.id);
                continue;
            }

            let now = Utc::now();
            let details = materialize_details(session.id, &planned, now);
            match self.store.begin_session(session.id, &details, now).await {
                Ok(BeginOutcome::Started { .. }) => report.succeeded.push(session.id),
                Ok(BeginOutcome::NotStartable(_)) => report.skipped.push(session.id),
                Ok(BeginOutcome::Missing) => {
                    warn!(session_id = %session.id, "session disappeared during bulk start");
                    report.failed.push(BulkTransitionFailure {
                        session_id: session.id,
                        reason: "session no longer exists".to_string(),
                    });
                }
                Err(err) => {
                    warn!(session_id = %session.id, error = %err, "bulk start failed for session");
                    report.failed.push(BulkTransitionFailure {
                        session_id: session.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            %preset_group_id,
            succeeded = report.succeeded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "bulk start finished"
        );
        Ok(report)
    }

    /// Coach-led completion of every ongoing session under the group.
    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn bulk_complete_group_sessions(
        &self,
        principal: &Principal,
        preset_group_id: Uuid,
    ) -> ServiceResult<BulkTransitionReport> {
        self.coach_run_group(principal, preset_group_id).await?;
        let sessions = self.store.list_sessions_for_preset_group(preset_group_id).await?;

        let mut report = BulkTransitionReport {
            preset_group_id,
            ..Default::default()
        };

        for session in sessions {
            match session.status {
                SessionStatus::Completed => {
                    report.skipped.push(session.id);
                    continue;
                }
                SessionStatus::Pending | SessionStatus::Assigned => {
                    report.failed.push(BulkTransitionFailure {
                        session_id: session.id,
                        reason: format!("cannot complete a {} session", session.status),
                    });
                    continue;
                }
                SessionStatus::Ongoing => {}
            }

            match self
                .store
                .transition_session(session.id, &[SessionStatus::Ongoing], SessionStatus::Completed, Utc::now())
                .await
            {
                Ok(Some(_)) => report.succeeded.push(session.id),
                Ok(None) => report.skipped.push(session.id),
                Err(err) => {
                    warn!(session_id = %session.id, error = %err, "bulk complete failed for session");
                    report.failed.push(BulkTransitionFailure {
                        session_id: session.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            %preset_group_id,
            succeeded = report.succeeded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "bulk complete finished"
        );
        Ok(report)
    }

    /// `pending -> assigned` for every session scheduled on or before today in `tz`.
    #[instrument(skip(self))]
    pub async fn promote_due_sessions(&self, now: DateTime<Utc>, tz: Timezone) -> ServiceResult<u64> {
        let today = tz.local_date(now);
        let cutoff = tz
            .end_of_day(today)
            .ok_or_else(|| ServiceError::validation(format!("no end of day for {} in {}", today, tz)))?;

        let promoted = self.store.promote_due_sessions(cutoff, now).await?;
        if promoted > 0 {
            info!(promoted, %today, "promoted due sessions");
        }
        Ok(promoted)
    }
}
