use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::caller_athlete;
use super::plan_service::conflict_as_validation;
use crate::auth::{policy, Principal};
use crate::errors::{ServiceError, ServiceResult};
use crate::models::{
    Athlete, AthleteGroup, AthleteGroupHistory, AthleteProfileInput, CreateAthleteGroup, MoveAthlete,
};
use crate::repository::Store;

/// Athlete profiles, coach-owned groups and the membership ledger.
#[derive(Clone)]
pub struct AthleteService {
    store: Arc<dyn Store>,
}

impl AthleteService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn create_profile(&self, principal: &Principal, input: AthleteProfileInput) -> ServiceResult<Athlete> {
        if !principal.is_athlete() {
            return Err(ServiceError::forbidden("athlete", principal.user_id));
        }
        input.validate()?;
        if self.store.get_athlete_by_user(principal.user_id).await?.is_some() {
            return Err(ServiceError::validation("athlete profile already exists"));
        }

        let now = Utc::now();
        let athlete = Athlete {
            id: Uuid::new_v4(),
            user_id: principal.user_id,
            height_cm: input.height_cm,
            weight_kg: input.weight_kg,
            goals: input.goals,
            experience: input.experience,
            events: input.events.unwrap_or_default(),
            current_group_id: None,
            created_at: now,
            updated_at: now,
        };
        self.store
            .insert_athlete(&athlete)
            .await
            .map_err(conflict_as_validation)?;

        info!(athlete_id = %athlete.id, "athlete profile created");
        Ok(athlete)
    }

    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn get_profile(&self, principal: &Principal) -> ServiceResult<Athlete> {
        caller_athlete(self.store.as_ref(), principal)
            .await?
            .ok_or_else(|| ServiceError::not_found("athlete", principal.user_id))
    }

    #[instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn update_profile(&self, principal: &Principal, input: AthleteProfileInput) -> ServiceResult<Athlete> {
        input.validate()?;
        let mut athlete = self.get_profile(principal).await?;

        if input.height_cm.is_some() {
            athlete.height_cm = input.height_cm;
        }
        if input.weight_kg.is_some() {
            athlete.weight_kg = input.weight_kg;
        }
        if input.goals.is_some() {
            athlete.goals = input.goals;
        }
        if input.experience.is_some() {
            athlete.experience = input.experience;
        }
        if let Some(events) = input.events {
            athlete.events = events;
        }
        athlete.updated_at = Utc::now();

        self.store.update_athlete_profile(&athlete).await?;
        Ok(athlete)
    }

    #[instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn create_athlete_group(
        &self,
        principal: &Principal,
        input: CreateAthleteGroup,
    ) -> ServiceResult<AthleteGroup> {
        if !principal.is_coach() {
            return Err(ServiceError::forbidden("athlete_group", principal.user_id));
        }
        input.validate()?;

        let group = AthleteGroup {
            id: Uuid::new_v4(),
            owner_id: principal.user_id,
            name: input.name,
            created_at: Utc::now(),
        };
        self.store
            .insert_athlete_group(&group)
            .await
            .map_err(conflict_as_validation)?;

        info!(group_id = %group.id, "athlete group created");
        Ok(group)
    }

    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn list_athlete_groups(&self, principal: &Principal) -> ServiceResult<Vec<AthleteGroup>> {
        if !principal.is_coach() {
            return Err(ServiceError::forbidden("athlete_group", principal.user_id));
        }
        Ok(self.store.list_athlete_groups(principal.user_id).await?)
    }

    async fn owned_group(&self, principal: &Principal, group_id: Uuid) -> ServiceResult<AthleteGroup> {
        let group = self
            .store
            .get_athlete_group(group_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("athlete_group", group_id))?;
        if !policy::can_manage_athlete_group(principal, &group) {
            return Err(ServiceError::forbidden("athlete_group", group_id));
        }
        Ok(group)
    }

    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn list_group_members(&self, principal: &Principal, group_id: Uuid) -> ServiceResult<Vec<Athlete>> {
        self.owned_group(principal, group_id).await?;
        Ok(self.store.list_athletes_in_group(group_id).await?)
    }

    /// Moves the athlete into `request.group_id` (or out of their group when
    /// `None`) and appends exactly one history row.
    #[instrument(skip(self, request), fields(user_id = %principal.user_id))]
    pub async fn move_athlete(
        &self,
        principal: &Principal,
        athlete_id: Uuid,
        request: MoveAthlete,
    ) -> ServiceResult<Athlete> {
        if !principal.is_coach() {
            return Err(ServiceError::forbidden("athlete", athlete_id));
        }
        request.validate()?;

        let athlete = self
            .store
            .get_athlete(athlete_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("athlete", athlete_id))?;

        match request.group_id {
            Some(target) => {
                if athlete.current_group_id == Some(target) {
                    return Err(ServiceError::validation(format!(
                        "athlete {} is already in group {}",
                        athlete_id, target
                    )));
                }
                self.owned_group(principal, target).await?;
            }
            None => {
                let current = athlete.current_group_id.ok_or_else(|| {
                    ServiceError::validation(format!("athlete {} is not in a group", athlete_id))
                })?;
                self.owned_group(principal, current).await?;
            }
        }

        let entry = AthleteGroupHistory {
            id: Uuid::new_v4(),
            athlete_id,
            group_id: request.group_id,
            changed_at: Utc::now(),
            author_id: principal.user_id,
            notes: request.notes,
        };
        let moved = self
            .store
            .move_athlete(&entry)
            .await?
            .ok_or_else(|| ServiceError::not_found("athlete", athlete_id))?;

        info!(
            %athlete_id,
            from = ?athlete.current_group_id,
            to = ?entry.group_id,
            "athlete moved"
        );
        Ok(moved)
    }

    /// Oldest first. The athlete sees their own ledger; a coach sees it when
    /// they own any group the athlete is or was in.
    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn group_history(&self, principal: &Principal, athlete_id: Uuid) -> ServiceResult<Vec<AthleteGroupHistory>> {
        let athlete = self
            .store
            .get_athlete(athlete_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("athlete", athlete_id))?;
        let history = self.store.list_group_history(athlete_id).await?;

        let allowed = if principal.is_athlete() {
            athlete.user_id == principal.user_id
        } else {
            let mut group_ids: HashSet<Uuid> = history.iter().filter_map(|h| h.group_id).collect();
            group_ids.extend(athlete.current_group_id);
            let owned: HashSet<Uuid> = self
                .store
                .list_athlete_groups(principal.user_id)
                .await?
                .into_iter()
                .map(|g| g.id)
                .collect();
            group_ids.iter().any(|id| owned.contains(id))
        };

        if !allowed {
            return Err(ServiceError::forbidden("athlete", athlete_id));
        }
        Ok(history)
    }
}
