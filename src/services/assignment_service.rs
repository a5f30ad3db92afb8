use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::caller_athlete;
use crate::auth::{policy, Principal};
use crate::errors::{ServiceError, ServiceResult};
use crate::models::{
    Athlete, AssignmentFailure, AssignmentReport, PresetGroup, SessionMode, SessionStatus, Timezone,
    TrainingSession, UpsertOutcome,
};
use crate::repository::Store;

/// Fans a preset group out into one training session per target athlete.
#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn Store>,
    /// Zone in which a preset group's bare `target_date` is interpreted
    timezone: Timezone,
}

impl AssignmentService {
    pub fn new(store: Arc<dyn Store>, timezone: Timezone) -> Self {
        Self { store, timezone }
    }

    /// Idempotent: sessions are upserted on (athlete, preset group), so
    /// repeating the call never duplicates rows or regresses a started session.
    #[instrument(skip(self), fields(user_id = %principal.user_id, role = %principal.role))]
    pub async fn assign_preset_group(
        &self,
        principal: &Principal,
        preset_group_id: Uuid,
    ) -> ServiceResult<AssignmentReport> {
        let group = self
            .store
            .get_preset_group(preset_group_id)
            .await?
            .filter(|g| !g.is_deleted)
            .ok_or_else(|| ServiceError::not_found("preset_group", preset_group_id))?;

        if !policy::can_assign_preset_group(principal, &group) {
            return Err(ServiceError::forbidden("preset_group", preset_group_id));
        }

        let audience = self.resolve_audience(principal, &group).await?;
        let mut report = AssignmentReport {
            preset_group_id,
            ..Default::default()
        };

        // Members can leave between the audience read and the write; those rows
        // are reported instead of failing the whole batch.
        let audience_ids: Vec<Uuid> = audience.iter().map(|a| a.id).collect();
        let still_present: HashSet<Uuid> = self
            .store
            .list_athletes_by_ids(&audience_ids)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();

        let now = Utc::now();
        let scheduled_at = group
            .target_date
            .and_then(|date| self.timezone.start_of_day(date))
            .unwrap_or(now);

        let mut rows = Vec::with_capacity(audience.len());
        for athlete in &audience {
            if !still_present.contains(&athlete.id) {
                warn!(athlete_id = %athlete.id, "athlete vanished before assignment");
                report.failures.push(AssignmentFailure {
                    athlete_id: athlete.id,
                    reason: "athlete no longer exists".to_string(),
                });
                continue;
            }
            rows.push(TrainingSession {
                id: Uuid::new_v4(),
                athlete_id: athlete.id,
                athlete_group_id: group.athlete_group_id,
                preset_group_id: group.id,
                scheduled_at,
                status: SessionStatus::Pending,
                notes: None,
                created_at: now,
                updated_at: now,
            });
        }

        let upserted = self.store.upsert_sessions(&rows).await?;

        for row in &upserted {
            match row.outcome {
                UpsertOutcome::Inserted => report.created += 1,
                UpsertOutcome::Updated => report.updated += 1,
                UpsertOutcome::Preserved => report.preserved += 1,
            }
            report.sessions.push(row.session.id);
        }
        report.sessions_touched = upserted.len();

        info!(
            %preset_group_id,
            touched = report.sessions_touched,
            created = report.created,
            updated = report.updated,
            preserved = report.preserved,
            failed = report.failures.len(),
            "preset group assigned"
        );
        Ok(report)
    }

    /// Group mode run by a coach targets the group's current members; every
    /// other combination targets the caller's own athlete profile.
    async fn resolve_audience(&self, principal: &Principal, group: &PresetGroup) -> ServiceResult<Vec<Athlete>> {
        if group.session_mode == SessionMode::Group && principal.is_coach() {
            let athlete_group_id = group.athlete_group_id.ok_or_else(|| {
                ServiceError::validation(format!(
                    "preset group {} is in group mode without an athlete group",
                    group.id
                ))
            })?;

            let mut members = self.store.list_athletes_in_group(athlete_group_id).await?;
            let mut seen = HashSet::new();
            members.retain(|a| seen.insert(a.id));
            return Ok(members);
        }

        let athlete = caller_athlete(self.store.as_ref(), principal)
            .await?
            .ok_or_else(|| ServiceError::not_found("athlete", principal.user_id))?;
        Ok(vec![athlete])
    }
}
