use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::plan_tree::{PlanRows, TreeBuilder};
use super::caller_athlete;
use crate::auth::{policy, Principal};
use crate::errors::{ServiceError, ServiceResult, StoreError};
use crate::models::{
    CreatePlanNode, Macrocycle, Mesocycle, Microcycle, PlanNode, PlanNodeCreated, PlanNodeKind,
    PlanTree, Preset, PresetDetail, PresetGroup, SessionMode, UpdatePlanNode,
};
use crate::repository::Store;

/// Plan hierarchy authoring and tree reads.
#[derive(Clone)]
pub struct PlanService {
    store: Arc<dyn Store>,
}

/// Unique and foreign-key violations on authoring writes are caller mistakes.
pub(crate) fn conflict_as_validation(err: StoreError) -> ServiceError {
    match err {
        StoreError::Conflict(message) => ServiceError::Validation(message),
        other => ServiceError::Persistence(other),
    }
}

pub(crate) fn check_date_range(start: NaiveDate, end: NaiveDate) -> ServiceResult<()> {
    if start > end {
        return Err(ServiceError::validation(format!(
            "start_date {} is after end_date {}",
            start, end
        )));
    }
    Ok(())
}

fn missing_parent(entity: &str, id: Uuid) -> ServiceError {
    ServiceError::validation(format!("{} {} does not exist", entity, id))
}

/// `group` mode needs a target athlete group, and any target must belong to the coach.
pub(crate) async fn check_session_target(
    store: &dyn Store,
    principal: &Principal,
    mode: SessionMode,
    athlete_group_id: Option<Uuid>,
) -> ServiceResult<()> {
    match (mode, athlete_group_id) {
        (SessionMode::Group, None) => Err(ServiceError::validation(
            "session_mode 'group' requires athlete_group_id",
        )),
        (_, Some(group_id)) => {
            let group = store
                .get_athlete_group(group_id)
                .await?
                .ok_or_else(|| missing_parent("athlete group", group_id))?;
            if !policy::can_manage_athlete_group(principal, &group) {
                return Err(ServiceError::validation(format!(
                    "athlete group {} is not owned by the caller",
                    group_id
                )));
            }
            Ok(())
        }
        (SessionMode::Individual, None) => Ok(()),
    }
}

impl PlanService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn authorize(principal: &Principal, entity: &'static str, id: Uuid, owner_id: Uuid) -> ServiceResult<()> {
        if policy::can_manage_plan(principal, owner_id) {
            Ok(())
        } else {
            Err(ServiceError::forbidden(entity, id))
        }
    }

    /// Live (non-deleted) preset group or `NotFound`.
    async fn live_preset_group(&self, id: Uuid) -> ServiceResult<PresetGroup> {
        self.store
            .get_preset_group(id)
            .await?
            .filter(|g| !g.is_deleted)
            .ok_or_else(|| ServiceError::not_found("preset_group", id))
    }

    async fn preset_with_group(&self, id: Uuid) -> ServiceResult<(Preset, PresetGroup)> {
        let preset = self
            .store
            .get_preset(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("preset", id))?;
        let group = self
            .store
            .get_preset_group(preset.preset_group_id)
            .await?
            .filter(|g| !g.is_deleted)
            .ok_or_else(|| ServiceError::not_found("preset", id))?;
        Ok((preset, group))
    }

    #[instrument(skip(self, node), fields(user_id = %principal.user_id, kind = %node.kind()))]
    pub async fn create_plan_node(
        &self,
        principal: &Principal,
        node: CreatePlanNode,
    ) -> ServiceResult<PlanNodeCreated> {
        let kind = node.kind();
        if !principal.is_coach() {
            return Err(ServiceError::forbidden("plan_node", principal.user_id));
        }
        let now = Utc::now();

        let id = match node {
            CreatePlanNode::Macrocycle(input) => {
                input.validate()?;
                check_date_range(input.start_date, input.end_date)?;
                let macrocycle = Macrocycle {
                    id: Uuid::new_v4(),
                    owner_id: principal.user_id,
                    name: input.name,
                    start_date: input.start_date,
                    end_date: input.end_date,
                    created_at: now,
                    updated_at: now,
                };
                self.store
                    .insert_macrocycle(&macrocycle)
                    .await
                    .map_err(conflict_as_validation)?;
                macrocycle.id
            }
            CreatePlanNode::Mesocycle(input) => {
                input.validate()?;
                check_date_range(input.start_date, input.end_date)?;
                let parent = self
                    .store
                    .get_macrocycle(input.macrocycle_id)
                    .await?
                    .ok_or_else(|| missing_parent("macrocycle", input.macrocycle_id))?;
                Self::authorize(principal, "macrocycle", parent.id, parent.owner_id)?;

                let mesocycle = Mesocycle {
                    id: Uuid::new_v4(),
                    macrocycle_id: parent.id,
                    owner_id: principal.user_id,
                    name: input.name,
                    start_date: input.start_date,
                    end_date: input.end_date,
                    ordinal: input.ordinal,
                    created_at: now,
                    updated_at: now,
                };
                self.store
                    .insert_mesocycle(&mesocycle)
                    .await
                    .map_err(conflict_as_validation)?;
                mesocycle.id
            }
            CreatePlanNode::Microcycle(input) => {
                input.validate()?;
                check_date_range(input.start_date, input.end_date)?;
                if let Some(mesocycle_id) = input.mesocycle_id {
                    let parent = self
                        .store
                        .get_mesocycle(mesocycle_id)
                        .await?
                        .ok_or_else(|| missing_parent("mesocycle", mesocycle_id))?;
                    Self::authorize(principal, "mesocycle", parent.id, parent.owner_id)?;
                }

                let microcycle = Microcycle {
                    id: Uuid::new_v4(),
                    mesocycle_id: input.mesocycle_id,
                    owner_id: principal.user_id,
                    name: input.name,
                    start_date: input.start_date,
                    end_date: input.end_date,
                    week_index: input.week_index,
                    created_at: now,
                    updated_at: now,
                };
                self.store
                    .insert_microcycle(&microcycle)
                    .await
                    .map_err(conflict_as_validation)?;
                microcycle.id
            }
            CreatePlanNode::PresetGroup(input) => {
                input.validate()?;
                if let Some(microcycle_id) = input.microcycle_id {
                    let parent = self
                        .store
                        .get_microcycle(microcycle_id)
                        .await?
                        .ok_or_else(|| missing_parent("microcycle", microcycle_id))?;
                    Self::authorize(principal, "microcycle", parent.id, parent.owner_id)?;
                }
                check_session_target(
                    self.store.as_ref(),
                    principal,
                    input.session_mode,
                    input.athlete_group_id,
                )
                .await?;

                let group = PresetGroup {
                    id: Uuid::new_v4(),
                    owner_id: principal.user_id,
                    microcycle_id: input.microcycle_id,
                    name: input.name,
                    description: input.description,
                    target_date: input.target_date,
                    week: input.week,
                    day: input.day,
                    session_mode: input.session_mode,
                    athlete_group_id: input.athlete_group_id,
                    is_deleted: false,
                    created_at: now,
                    updated_at: now,
                };
                self.store
                    .insert_preset_group(&group)
                    .await
                    .map_err(conflict_as_validation)?;
                group.id
            }
            CreatePlanNode::Preset(input) => {
                input.validate()?;
                let parent = self
                    .store
                    .get_preset_group(input.preset_group_id)
                    .await?
                    .filter(|g| !g.is_deleted)
                    .ok_or_else(|| missing_parent("preset group", input.preset_group_id))?;
                Self::authorize(principal, "preset_group", parent.id, parent.owner_id)?;
                if self.store.get_exercise(input.exercise_id).await?.is_none() {
                    return Err(missing_parent("exercise", input.exercise_id));
                }

                let preset = Preset {
                    id: Uuid::new_v4(),
                    preset_group_id: parent.id,
                    exercise_id: input.exercise_id,
                    preset_order: input.preset_order,
                    superset_id: input.superset_id,
                    notes: input.notes,
                };
                self.store
                    .insert_preset(&preset)
                    .await
                    .map_err(conflict_as_validation)?;
                preset.id
            }
            CreatePlanNode::PresetDetail(input) => {
                input.validate()?;
                let preset = self
                    .store
                    .get_preset(input.preset_id)
                    .await?
                    .ok_or_else(|| missing_parent("preset", input.preset_id))?;
                let group = self
                    .store
                    .get_preset_group(preset.preset_group_id)
                    .await?
                    .filter(|g| !g.is_deleted)
                    .ok_or_else(|| missing_parent("preset", input.preset_id))?;
                Self::authorize(principal, "preset", preset.id, group.owner_id)?;

                let detail = PresetDetail {
                    id: Uuid::new_v4(),
                    preset_id: preset.id,
                    set_index: input.set_index,
                    planned: input.planned,
                };
                self.store
                    .insert_preset_detail(&detail)
                    .await
                    .map_err(conflict_as_validation)?;
                detail.id
            }
        };

        info!(%id, "plan node created");
        Ok(PlanNodeCreated { id, kind })
    }

    #[instrument(skip(self, update), fields(user_id = %principal.user_id, kind = %update.kind()))]
    pub async fn update_plan_node(
        &self,
        principal: &Principal,
        id: Uuid,
        update: UpdatePlanNode,
    ) -> ServiceResult<PlanNode> {
        let now = Utc::now();

        let node = match update {
            UpdatePlanNode::Macrocycle(changes) => {
                changes.validate()?;
                let mut macrocycle = self
                    .store
                    .get_macrocycle(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("macrocycle", id))?;
                Self::authorize(principal, "macrocycle", id, macrocycle.owner_id)?;

                if let Some(name) = changes.name {
                    macrocycle.name = name;
                }
                macrocycle.start_date = changes.start_date.unwrap_or(macrocycle.start_date);
                macrocycle.end_date = changes.end_date.unwrap_or(macrocycle.end_date);
                check_date_range(macrocycle.start_date, macrocycle.end_date)?;
                macrocycle.updated_at = now;

                self.store.update_macrocycle(&macrocycle).await?;
                PlanNode::Macrocycle(macrocycle)
            }
            UpdatePlanNode::Mesocycle(changes) => {
                changes.validate()?;
                let mut mesocycle = self
                    .store
                    .get_mesocycle(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("mesocycle", id))?;
                Self::authorize(principal, "mesocycle", id, mesocycle.owner_id)?;

                if let Some(name) = changes.name {
                    mesocycle.name = name;
                }
                mesocycle.start_date = changes.start_date.unwrap_or(mesocycle.start_date);
                mesocycle.end_date = changes.end_date.unwrap_or(mesocycle.end_date);
                check_date_range(mesocycle.start_date, mesocycle.end_date)?;
                mesocycle.updated_at = now;

                self.store.update_mesocycle(&mesocycle).await?;
                PlanNode::Mesocycle(mesocycle)
            }
            UpdatePlanNode::Microcycle(changes) => {
                changes.validate()?;
                let mut microcycle = self
                    .store
                    .get_microcycle(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("microcycle", id))?;
                Self::authorize(principal, "microcycle", id, microcycle.owner_id)?;

                if changes.name.is_some() {
                    microcycle.name = changes.name;
                }
                microcycle.start_date = changes.start_date.unwrap_or(microcycle.start_date);
                microcycle.end_date = changes.end_date.unwrap_or(microcycle.end_date);
                check_date_range(microcycle.start_date, microcycle.end_date)?;
                microcycle.updated_at = now;

                self.store.update_microcycle(&microcycle).await?;
                PlanNode::Microcycle(microcycle)
            }
            UpdatePlanNode::PresetGroup(changes) => {
                changes.validate()?;
                let mut group = self.live_preset_group(id).await?;
                Self::authorize(principal, "preset_group", id, group.owner_id)?;

                if let Some(name) = changes.name {
                    group.name = name;
                }
                if changes.description.is_some() {
                    group.description = changes.description;
                }
                if changes.target_date.is_some() {
                    group.target_date = changes.target_date;
                }
                if changes.week.is_some() {
                    group.week = changes.week;
                }
                if changes.day.is_some() {
                    group.day = changes.day;
                }
                if let Some(mode) = changes.session_mode {
                    group.session_mode = mode;
                }
                if changes.athlete_group_id.is_some() {
                    group.athlete_group_id = changes.athlete_group_id;
                }
                check_session_target(
                    self.store.as_ref(),
                    principal,
                    group.session_mode,
                    group.athlete_group_id,
                )
                .await?;
                group.updated_at = now;

                self.store.update_preset_group(&group).await?;
                PlanNode::PresetGroup(group)
            }
            UpdatePlanNode::Preset(changes) => {
                changes.validate()?;
                let (mut preset, group) = self.preset_with_group(id).await?;
                Self::authorize(principal, "preset", id, group.owner_id)?;

                preset.preset_order = changes.preset_order.unwrap_or(preset.preset_order);
                if changes.superset_id.is_some() {
                    preset.superset_id = changes.superset_id;
                }
                if changes.notes.is_some() {
                    preset.notes = changes.notes;
                }

                self.store.update_preset(&preset).await?;
                PlanNode::Preset(preset)
            }
            UpdatePlanNode::PresetDetail(planned) => {
                planned.validate()?;
                let mut detail = self
                    .store
                    .get_preset_detail(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("preset_detail", id))?;
                let (_, group) = self
                    .preset_with_group(detail.preset_id)
                    .await
                    .map_err(|_| ServiceError::not_found("preset_detail", id))?;
                Self::authorize(principal, "preset_detail", id, group.owner_id)?;

                detail.planned = planned;
                self.store.update_preset_detail(&detail).await?;
                PlanNode::PresetDetail(detail)
            }
        };

        info!(%id, "plan node updated");
        Ok(node)
    }

    /// Cycles are removed with everything below them; preset groups under a
    /// removed cycle are soft-deleted and detached so their sessions keep a target.
    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn delete_plan_node(
        &self,
        principal: &Principal,
        kind: PlanNodeKind,
        id: Uuid,
    ) -> ServiceResult<()> {
        match kind {
            PlanNodeKind::Macrocycle => {
                let macrocycle = self
                    .store
                    .get_macrocycle(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("macrocycle", id))?;
                Self::authorize(principal, "macrocycle", id, macrocycle.owner_id)?;
                self.store.delete_macrocycle(id).await?;
            }
            PlanNodeKind::Mesocycle => {
                let mesocycle = self
                    .store
                    .get_mesocycle(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("mesocycle", id))?;
                Self::authorize(principal, "mesocycle", id, mesocycle.owner_id)?;
                self.store.delete_mesocycle(id).await?;
            }
            PlanNodeKind::Microcycle => {
                let microcycle = self
                    .store
                    .get_microcycle(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("microcycle", id))?;
                Self::authorize(principal, "microcycle", id, microcycle.owner_id)?;
                self.store.delete_microcycle(id).await?;
            }
            PlanNodeKind::PresetGroup => {
                let group = self.live_preset_group(id).await?;
                Self::authorize(principal, "preset_group", id, group.owner_id)?;
                self.store.soft_delete_preset_group(id).await?;
            }
            PlanNodeKind::Preset => {
                let (_, group) = self.preset_with_group(id).await?;
                Self::authorize(principal, "preset", id, group.owner_id)?;
                self.store.delete_preset(id).await.map_err(|err| match err {
                    StoreError::Conflict(_) => ServiceError::validation(format!(
                        "preset {} has recorded training details",
                        id
                    )),
                    other => ServiceError::Persistence(other),
                })?;
            }
            PlanNodeKind::PresetDetail => {
                let detail = self
                    .store
                    .get_preset_detail(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("preset_detail", id))?;
                let (_, group) = self
                    .preset_with_group(detail.preset_id)
                    .await
                    .map_err(|_| ServiceError::not_found("preset_detail", id))?;
                Self::authorize(principal, "preset_detail", id, group.owner_id)?;
                self.store.delete_preset_detail(id).await?;
            }
        }

        info!(%id, %kind, "plan node deleted");
        Ok(())
    }

    /// Nested tree under `id`, assembled from one batch read per level.
    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn get_plan_tree(
        &self,
        principal: &Principal,
        kind: PlanNodeKind,
        id: Uuid,
    ) -> ServiceResult<PlanTree> {
        match kind {
            PlanNodeKind::Macrocycle => {
                let macrocycle = self
                    .store
                    .get_macrocycle(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("macrocycle", id))?;
                Self::authorize(principal, "macrocycle", id, macrocycle.owner_id)?;

                let mesocycles = self.store.list_mesocycles_by_macrocycles(&[id]).await?;
                let mesocycle_ids: Vec<Uuid> = mesocycles.iter().map(|m| m.id).collect();
                let rows = PlanRows {
                    mesocycles,
                    ..Default::default()
                };
                let rows = self.rows_below_mesocycles(rows, &mesocycle_ids).await?;
                Ok(PlanTree::Macrocycle(TreeBuilder::new(rows).macrocycle(macrocycle)))
            }
            PlanNodeKind::Mesocycle => {
                let mesocycle = self
                    .store
                    .get_mesocycle(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("mesocycle", id))?;
                Self::authorize(principal, "mesocycle", id, mesocycle.owner_id)?;

                let rows = self.rows_below_mesocycles(PlanRows::default(), &[id]).await?;
                Ok(PlanTree::Mesocycle(TreeBuilder::new(rows).mesocycle(mesocycle)))
            }
            PlanNodeKind::Microcycle => {
                let microcycle = self
                    .store
                    .get_microcycle(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("microcycle", id))?;
                Self::authorize(principal, "microcycle", id, microcycle.owner_id)?;

                let rows = self.rows_below_microcycles(PlanRows::default(), &[id]).await?;
                Ok(PlanTree::Microcycle(TreeBuilder::new(rows).microcycle(microcycle)))
            }
            PlanNodeKind::PresetGroup => {
                let group = self.live_preset_group(id).await?;
                self.ensure_can_view_group(principal, &group).await?;

                let rows = self.rows_below_groups(PlanRows::default(), &[id]).await?;
                Ok(PlanTree::PresetGroup(TreeBuilder::new(rows).preset_group(group)))
            }
            PlanNodeKind::Preset | PlanNodeKind::PresetDetail => Err(ServiceError::validation(
                format!("plan trees cannot be rooted at a {}", kind),
            )),
        }
    }

    /// Owning coach, or an athlete holding a session for the group.
    async fn ensure_can_view_group(&self, principal: &Principal, group: &PresetGroup) -> ServiceResult<()> {
        if policy::can_manage_plan(principal, group.owner_id) {
            return Ok(());
        }
        if let Some(athlete) = caller_athlete(self.store.as_ref(), principal).await? {
            if self.store.get_session_for(athlete.id, group.id).await?.is_some() {
                return Ok(());
            }
        }
        Err(ServiceError::forbidden("preset_group", group.id))
    }

    async fn rows_below_mesocycles(&self, mut rows: PlanRows, mesocycle_ids: &[Uuid]) -> ServiceResult<PlanRows> {
        if mesocycle_ids.is_empty() {
            return Ok(rows);
        }
        rows.microcycles = self.store.list_microcycles_by_mesocycles(mesocycle_ids).await?;
        let microcycle_ids: Vec<Uuid> = rows.microcycles.iter().map(|m| m.id).collect();
        self.rows_below_microcycles(rows, &microcycle_ids).await
    }

    async fn rows_below_microcycles(&self, mut rows: PlanRows, microcycle_ids: &[Uuid]) -> ServiceResult<PlanRows> {
        if microcycle_ids.is_empty() {
            return Ok(rows);
        }
        rows.preset_groups = self.store.list_preset_groups_by_microcycles(microcycle_ids).await?;
        let group_ids: Vec<Uuid> = rows.preset_groups.iter().map(|g| g.id).collect();
        self.rows_below_groups(rows, &group_ids).await
    }

    async fn rows_below_groups(&self, mut rows: PlanRows, group_ids: &[Uuid]) -> ServiceResult<PlanRows> {
        if group_ids.is_empty() {
            return Ok(rows);
        }
        rows.presets = self.store.list_presets_by_groups(group_ids).await?;
        if rows.presets.is_empty() {
            return Ok(rows);
        }

        let preset_ids: Vec<Uuid> = rows.presets.iter().map(|p| p.id).collect();
        rows.details = self.store.list_preset_details_by_presets(&preset_ids).await?;

        let exercise_ids: Vec<Uuid> = rows
            .presets
            .iter()
            .map(|p| p.exercise_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        rows.exercises = self.store.list_exercises_by_ids(&exercise_ids).await?;

        debug!(
            groups = group_ids.len(),
            presets = rows.presets.len(),
            details = rows.details.len(),
            "loaded plan rows"
        );
        Ok(rows)
    }

    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn list_preset_groups(&self, principal: &Principal) -> ServiceResult<Vec<PresetGroup>> {
        if !principal.is_coach() {
            return Err(ServiceError::forbidden("preset_group", principal.user_id));
        }
        Ok(self.store.list_preset_groups_by_owner(principal.user_id).await?)
    }
}
