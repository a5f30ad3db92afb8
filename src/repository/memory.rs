use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AthleteRepository, BeginOutcome, CatalogRepository, PlanRepository, SessionRepository,
    StoreResult,
};
use crate::errors::StoreError;
use crate::models::{
    Athlete, AthleteGroup, AthleteGroupHistory, Exercise, ExerciseTag, ExerciseType, Macrocycle,
    Mesocycle, Microcycle, Preset, PresetDetail, PresetGroup, SessionStatus, Tag, TrainingDetail,
    TrainingDetailUpdate, TrainingSession, Unit, UpsertOutcome, UpsertedSession,
};

#[derive(Default)]
struct MemoryState {
    macrocycles: HashMap<Uuid, Macrocycle>,
    mesocycles: HashMap<Uuid, Mesocycle>,
    microcycles: HashMap<Uuid, Microcycle>,
    preset_groups: HashMap<Uuid, PresetGroup>,
    presets: HashMap<Uuid, Preset>,
    preset_details: HashMap<Uuid, PresetDetail>,
    exercise_types: HashMap<Uuid, ExerciseType>,
    units: HashMap<Uuid, Unit>,
    tags: HashMap<Uuid, Tag>,
    exercises: HashMap<Uuid, Exercise>,
    exercise_tags: Vec<ExerciseTag>,
    athletes: HashMap<Uuid, Athlete>,
    athlete_groups: HashMap<Uuid, AthleteGroup>,
    group_history: Vec<AthleteGroupHistory>,
    sessions: HashMap<Uuid, TrainingSession>,
    details: HashMap<Uuid, TrainingDetail>,
}

impl MemoryState {
    /// Soft-deletes and detaches the preset groups of the given microcycles.
    fn orphan_preset_groups(&mut self, microcycle_ids: &HashSet<Uuid>, now: DateTime<Utc>) {
        for group in self.preset_groups.values_mut() {
            if group.microcycle_id.is_some_and(|id| microcycle_ids.contains(&id)) {
                group.is_deleted = true;
                group.microcycle_id = None;
                group.updated_at = now;
            }
        }
    }

    fn remove_microcycles(&mut self, microcycle_ids: &HashSet<Uuid>) {
        self.orphan_preset_groups(microcycle_ids, Utc::now());
        self.microcycles.retain(|id, _| !microcycle_ids.contains(id));
    }

    fn remove_mesocycles(&mut self, mesocycle_ids: &HashSet<Uuid>) {
        let microcycle_ids: HashSet<Uuid> = self
            .microcycles
            .values()
            .filter(|m| m.mesocycle_id.is_some_and(|id| mesocycle_ids.contains(&id)))
            .map(|m| m.id)
            .collect();
        self.remove_microcycles(&microcycle_ids);
        self.mesocycles.retain(|id, _| !mesocycle_ids.contains(id));
    }

    fn preset_order(&self, preset_id: Uuid) -> i32 {
        self.presets.get(&preset_id).map(|p| p.preset_order).unwrap_or(i32::MAX)
    }

    fn sorted_details(&self, session_id: Uuid) -> Vec<TrainingDetail> {
        let mut details: Vec<TrainingDetail> = self
            .details
            .values()
            .filter(|d| d.training_session_id == session_id)
            .cloned()
            .collect();
        details.sort_by_key(|d| (self.preset_order(d.preset_id), d.preset_id, d.set_index));
        details
    }
}

/// In-process store with the same transactional behaviour as `PgStore`:
/// every call runs under a single lock and validates before it writes.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with `StoreError::Unavailable`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

fn by_ids<T: Clone>(map: &HashMap<Uuid, T>, ids: &[Uuid]) -> Vec<T> {
    let wanted: HashSet<&Uuid> = ids.iter().collect();
    map.iter()
        .filter(|(id, _)| wanted.contains(id))
        .map(|(_, value)| value.clone())
        .collect()
}

fn replace<T: Clone>(map: &mut HashMap<Uuid, T>, id: Uuid, value: &T) {
    if let Some(slot) = map.get_mut(&id) {
        *slot = value.clone();
    }
}

#[async_trait]
impl PlanRepository for MemoryStore {
    async fn insert_macrocycle(&self, macrocycle: &Macrocycle) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        state.macrocycles.insert(macrocycle.id, macrocycle.clone());
        Ok(())
    }

    async fn get_macrocycle(&self, id: Uuid) -> StoreResult<Option<Macrocycle>> {
        Ok(self.state.read().await.macrocycles.get(&id).cloned())
    }

    async fn update_macrocycle(&self, macrocycle: &Macrocycle) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        replace(&mut state.macrocycles, macrocycle.id, macrocycle);
        Ok(())
    }

    async fn delete_macrocycle(&self, id: Uuid) -> StoreResult<bool> {
        self.writable()?;
        let mut state = self.state.write().await;
        if state.macrocycles.remove(&id).is_none() {
            return Ok(false);
        }
        let mesocycle_ids: HashSet<Uuid> = state
            .mesocycles
            .values()
            .filter(|m| m.macrocycle_id == id)
            .map(|m| m.id)
            .collect();
        state.remove_mesocycles(&mesocycle_ids);
        Ok(true)
    }

    async fn insert_mesocycle(&self, mesocycle: &Mesocycle) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        if !state.macrocycles.contains_key(&mesocycle.macrocycle_id) {
            return Err(StoreError::Conflict(format!(
                "macrocycle {} does not exist",
                mesocycle.macrocycle_id
            )));
        }
        state.mesocycles.insert(mesocycle.id, mesocycle.clone());
        Ok(())
    }

    async fn get_mesocycle(&self, id: Uuid) -> StoreResult<Option<Mesocycle>> {
        Ok(self.state.read().await.mesocycles.get(&id).cloned())
    }

    async fn update_mesocycle(&self, mesocycle: &Mesocycle) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        replace(&mut state.mesocycles, mesocycle.id, mesocycle);
        Ok(())
    }

    async fn delete_mesocycle(&self, id: Uuid) -> StoreResult<bool> {
        self.writable()?;
        let mut state = self.state.write().await;
        if !state.mesocycles.contains_key(&id) {
            return Ok(false);
        }
        state.remove_mesocycles(&HashSet::from([id]));
        Ok(true)
    }

    async fn list_mesocycles_by_macrocycles(&self, macrocycle_ids: &[Uuid]) -> StoreResult<Vec<Mesocycle>> {
        let state = self.state.read().await;
        Ok(state
            .mesocycles
            .values()
            .filter(|m| macrocycle_ids.contains(&m.macrocycle_id))
            .cloned()
            .collect())
    }

    async fn insert_microcycle(&self, microcycle: &Microcycle) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        if let Some(parent) = microcycle.mesocycle_id {
            if !state.mesocycles.contains_key(&parent) {
                return Err(StoreError::Conflict(format!("mesocycle {} does not exist", parent)));
            }
        }
        state.microcycles.insert(microcycle.id, microcycle.clone());
        Ok(())
    }

    async fn get_microcycle(&self, id: Uuid) -> StoreResult<Option<Microcycle>> {
        Ok(self.state.read().await.microcycles.get(&id).cloned())
    }

    async fn update_microcycle(&self, microcycle: &Microcycle) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        replace(&mut state.microcycles, microcycle.id, microcycle);
        Ok(())
    }

    async fn delete_microcycle(&self, id: Uuid) -> StoreResult<bool> {
        self.writable()?;
        let mut state = self.state.write().await;
        if !state.microcycles.contains_key(&id) {
            return Ok(false);
        }
        state.remove_microcycles(&HashSet::from([id]));
        Ok(true)
    }

    async fn list_microcycles_by_mesocycles(&self, mesocycle_ids: &[Uuid]) -> StoreResult<Vec<Microcycle>> {
        let state = self.state.read().await;
        Ok(state
            .microcycles
            .values()
            .filter(|m| m.mesocycle_id.is_some_and(|id| mesocycle_ids.contains(&id)))
            .cloned()
            .collect())
    }

    async fn insert_preset_group(&self, group: &PresetGroup) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        state.preset_groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn get_preset_group(&self, id: Uuid) -> StoreResult<Option<PresetGroup>> {
        Ok(self.state.read().await.preset_groups.get(&id).cloned())
    }

    async fn update_preset_group(&self, group: &PresetGroup) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        replace(&mut state.preset_groups, group.id, group);
        Ok(())
    }

    async fn soft_delete_preset_group(&self, id: Uuid) -> StoreResult<bool> {
        self.writable()?;
        let mut state = self.state.write().await;
        match state.preset_groups.get_mut(&id) {
            Some(group) if !group.is_deleted => {
                group.is_deleted = true;
                group.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_preset_groups_by_microcycles(&self, microcycle_ids: &[Uuid]) -> StoreResult<Vec<PresetGroup>> {
        let state = self.state.read().await;
        Ok(state
            .preset_groups
            .values()
            .filter(|g| !g.is_deleted)
            .filter(|g| g.microcycle_id.is_some_and(|id| microcycle_ids.contains(&id)))
            .cloned()
            .collect())
    }

    async fn list_preset_groups_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<PresetGroup>> {
        let state = self.state.read().await;
        let mut groups: Vec<PresetGroup> = state
            .preset_groups
            .values()
            .filter(|g| g.owner_id == owner_id && !g.is_deleted)
            .cloned()
            .collect();
        groups.sort_by_key(|g| (g.target_date, g.week, g.day, g.created_at));
        Ok(groups)
    }

    async fn insert_preset_group_tree(
        &self,
        group: &PresetGroup,
        presets: &[Preset],
        details: &[PresetDetail],
    ) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;

        let mut seen = HashSet::new();
        for detail in details {
            if !seen.insert((detail.preset_id, detail.set_index)) {
                return Err(StoreError::Conflict(format!(
                    "duplicate set index {} for preset {}",
                    detail.set_index, detail.preset_id
                )));
            }
        }
        if let Some(missing) = presets.iter().find(|p| !state.exercises.contains_key(&p.exercise_id)) {
            return Err(StoreError::Conflict(format!(
                "exercise {} does not exist",
                missing.exercise_id
            )));
        }

        state.preset_groups.insert(group.id, group.clone());
        for preset in presets {
            state.presets.insert(preset.id, preset.clone());
        }
        for detail in details {
            state.preset_details.insert(detail.id, detail.clone());
        }
        Ok(())
    }

    async fn insert_preset(&self, preset: &Preset) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        if !state.exercises.contains_key(&preset.exercise_id) {
            return Err(StoreError::Conflict(format!(
                "exercise {} does not exist",
                preset.exercise_id
            )));
        }
        state.presets.insert(preset.id, preset.clone());
        Ok(())
    }

    async fn get_preset(&self, id: Uuid) -> StoreResult<Option<Preset>> {
        Ok(self.state.read().await.presets.get(&id).cloned())
    }

    async fn update_preset(&self, preset: &Preset) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        replace(&mut state.presets, preset.id, preset);
        Ok(())
    }

    async fn delete_preset(&self, id: Uuid) -> StoreResult<bool> {
        self.writable()?;
        let mut state = self.state.write().await;
        if !state.presets.contains_key(&id) {
            return Ok(false);
        }
        if state.details.values().any(|d| d.preset_id == id) {
            return Err(StoreError::Conflict(format!(
                "preset {} is referenced by recorded training details",
                id
            )));
        }
        state.presets.remove(&id);
        state.preset_details.retain(|_, d| d.preset_id != id);
        Ok(true)
    }

    async fn list_presets_by_groups(&self, group_ids: &[Uuid]) -> StoreResult<Vec<Preset>> {
        let state = self.state.read().await;
        Ok(state
            .presets
            .values()
            .filter(|p| group_ids.contains(&p.preset_group_id))
            .cloned()
            .collect())
    }

    async fn insert_preset_detail(&self, detail: &PresetDetail) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        let taken = state
            .preset_details
            .values()
            .any(|d| d.preset_id == detail.preset_id && d.set_index == detail.set_index);
        if taken {
            return Err(StoreError::Conflict(format!(
                "set index {} already exists for preset {}",
                detail.set_index, detail.preset_id
            )));
        }
        state.preset_details.insert(detail.id, detail.clone());
        Ok(())
    }

    async fn get_preset_detail(&self, id: Uuid) -> StoreResult<Option<PresetDetail>> {
        Ok(self.state.read().await.preset_details.get(&id).cloned())
    }

    async fn update_preset_detail(&self, detail: &PresetDetail) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        replace(&mut state.preset_details, detail.id, detail);
        Ok(())
    }

    async fn delete_preset_detail(&self, id: Uuid) -> StoreResult<bool> {
        self.writable()?;
        let mut state = self.state.write().await;
        Ok(state.preset_details.remove(&id).is_some())
    }

    async fn list_preset_details_by_presets(&self, preset_ids: &[Uuid]) -> StoreResult<Vec<PresetDetail>> {
        let state = self.state.read().await;
        Ok(state
            .preset_details
            .values()
            .filter(|d| preset_ids.contains(&d.preset_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn insert_exercise_type(&self, exercise_type: &ExerciseType) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        if state.exercise_types.values().any(|t| t.name == exercise_type.name) {
            return Err(StoreError::Conflict(format!(
                "exercise type '{}' already exists",
                exercise_type.name
            )));
        }
        state.exercise_types.insert(exercise_type.id, exercise_type.clone());
        Ok(())
    }

    async fn list_exercise_types_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<ExerciseType>> {
        Ok(by_ids(&self.state.read().await.exercise_types, ids))
    }

    async fn insert_unit(&self, unit: &Unit) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        if state.units.values().any(|u| u.name == unit.name) {
            return Err(StoreError::Conflict(format!("unit '{}' already exists", unit.name)));
        }
        state.units.insert(unit.id, unit.clone());
        Ok(())
    }

    async fn list_units_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Unit>> {
        Ok(by_ids(&self.state.read().await.units, ids))
    }

    async fn insert_tag(&self, tag: &Tag) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        if state.tags.values().any(|t| t.name == tag.name) {
            return Err(StoreError::Conflict(format!("tag '{}' already exists", tag.name)));
        }
        state.tags.insert(tag.id, tag.clone());
        Ok(())
    }

    async fn list_tags_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Tag>> {
        Ok(by_ids(&self.state.read().await.tags, ids))
    }

    async fn insert_exercise(&self, exercise: &Exercise, tag_ids: &[Uuid]) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        if let Some(missing) = tag_ids.iter().find(|id| !state.tags.contains_key(id)) {
            return Err(StoreError::Conflict(format!("tag {} does not exist", missing)));
        }
        state.exercises.insert(exercise.id, exercise.clone());
        for tag_id in tag_ids {
            state.exercise_tags.push(ExerciseTag {
                exercise_id: exercise.id,
                tag_id: *tag_id,
            });
        }
        Ok(())
    }

    async fn get_exercise(&self, id: Uuid) -> StoreResult<Option<Exercise>> {
        Ok(self.state.read().await.exercises.get(&id).cloned())
    }

    async fn list_exercises(&self) -> StoreResult<Vec<Exercise>> {
        let state = self.state.read().await;
        let mut exercises: Vec<Exercise> = state.exercises.values().cloned().collect();
        exercises.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(exercises)
    }

    async fn list_exercises_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Exercise>> {
        Ok(by_ids(&self.state.read().await.exercises, ids))
    }

    async fn list_exercise_tags(&self, exercise_ids: &[Uuid]) -> StoreResult<Vec<ExerciseTag>> {
        let state = self.state.read().await;
        Ok(state
            .exercise_tags
            .iter()
            .filter(|link| exercise_ids.contains(&link.exercise_id))
            .copied()
            .collect())
    }
}

#[async_trait]
impl AthleteRepository for MemoryStore {
    async fn insert_athlete(&self, athlete: &Athlete) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        if state.athletes.values().any(|a| a.user_id == athlete.user_id) {
            return Err(StoreError::Conflict(format!(
                "user {} already has an athlete profile",
                athlete.user_id
            )));
        }
        state.athletes.insert(athlete.id, athlete.clone());
        Ok(())
    }

    async fn get_athlete(&self, id: Uuid) -> StoreResult<Option<Athlete>> {
        Ok(self.state.read().await.athletes.get(&id).cloned())
    }

    async fn get_athlete_by_user(&self, user_id: Uuid) -> StoreResult<Option<Athlete>> {
        let state = self.state.read().await;
        Ok(state.athletes.values().find(|a| a.user_id == user_id).cloned())
    }

    async fn update_athlete_profile(&self, athlete: &Athlete) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        if let Some(existing) = state.athletes.get_mut(&athlete.id) {
            let current_group_id = existing.current_group_id;
            *existing = Athlete {
                current_group_id,
                ..athlete.clone()
            };
        }
        Ok(())
    }

    async fn list_athletes_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Athlete>> {
        Ok(by_ids(&self.state.read().await.athletes, ids))
    }

    async fn list_athletes_in_group(&self, group_id: Uuid) -> StoreResult<Vec<Athlete>> {
        let state = self.state.read().await;
        let mut athletes: Vec<Athlete> = state
            .athletes
            .values()
            .filter(|a| a.current_group_id == Some(group_id))
            .cloned()
            .collect();
        athletes.sort_by_key(|a| a.created_at);
        Ok(athletes)
    }

    async fn insert_athlete_group(&self, group: &AthleteGroup) -> StoreResult<()> {
        self.writable()?;
        let mut state = self.state.write().await;
        state.athlete_groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn get_athlete_group(&self, id: Uuid) -> StoreResult<Option<AthleteGroup>> {
        Ok(self.state.read().await.athlete_groups.get(&id).cloned())
    }

    async fn list_athlete_groups(&self, owner_id: Uuid) -> StoreResult<Vec<AthleteGroup>> {
        let state = self.state.read().await;
        let mut groups: Vec<AthleteGroup> = state
            .athlete_groups
            .values()
            .filter(|g| g.owner_id == owner_id)
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn move_athlete(&self, entry: &AthleteGroupHistory) -> StoreResult<Option<Athlete>> {
        self.writable()?;
        let mut state = self.state.write().await;
        if let Some(group_id) = entry.group_id {
            if !state.athlete_groups.contains_key(&group_id) {
                return Err(StoreError::Conflict(format!("athlete group {} does not exist", group_id)));
            }
        }
        let Some(athlete) = state.athletes.get_mut(&entry.athlete_id) else {
            return Ok(None);
        };
        athlete.current_group_id = entry.group_id;
        athlete.updated_at = entry.changed_at;
        let updated = athlete.clone();
        state.group_history.push(entry.clone());
        Ok(Some(updated))
    }

    async fn list_group_history(&self, athlete_id: Uuid) -> StoreResult<Vec<AthleteGroupHistory>> {
        let state = self.state.read().await;
        Ok(state
            .group_history
            .iter()
            .filter(|h| h.athlete_id == athlete_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn upsert_sessions(&self, sessions: &[TrainingSession]) -> StoreResult<Vec<UpsertedSession>> {
        self.writable()?;
        let mut state = self.state.write().await;

        for row in sessions {
            if !state.athletes.contains_key(&row.athlete_id) {
                return Err(StoreError::Conflict(format!("athlete {} does not exist", row.athlete_id)));
            }
            if !state.preset_groups.contains_key(&row.preset_group_id) {
                return Err(StoreError::Conflict(format!(
                    "preset group {} does not exist",
                    row.preset_group_id
                )));
            }
        }

        let mut results = Vec::with_capacity(sessions.len());
        for row in sessions {
            let existing = state
                .sessions
                .values_mut()
                .find(|s| s.athlete_id == row.athlete_id && s.preset_group_id == row.preset_group_id);

            let upserted = match existing {
                Some(current) if SessionStatus::NOT_STARTED.contains(&current.status) => {
                    current.scheduled_at = row.scheduled_at;
                    current.athlete_group_id = row.athlete_group_id;
                    current.updated_at = row.updated_at;
                    UpsertedSession {
                        session: current.clone(),
                        outcome: UpsertOutcome::Updated,
                    }
                }
                Some(current) => UpsertedSession {
                    session: current.clone(),
                    outcome: UpsertOutcome::Preserved,
                },
                None => {
                    state.sessions.insert(row.id, row.clone());
                    UpsertedSession {
                        session: row.clone(),
                        outcome: UpsertOutcome::Inserted,
                    }
                }
            };
            results.push(upserted);
        }
        Ok(results)
    }

    async fn get_session(&self, id: Uuid) -> StoreResult<Option<TrainingSession>> {
        Ok(self.state.read().await.sessions.get(&id).cloned())
    }

    async fn get_session_for(&self, athlete_id: Uuid, preset_group_id: Uuid) -> StoreResult<Option<TrainingSession>> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .values()
            .find(|s| s.athlete_id == athlete_id && s.preset_group_id == preset_group_id)
            .cloned())
    }

    async fn list_sessions_for_athlete(&self, athlete_id: Uuid) -> StoreResult<Vec<TrainingSession>> {
        let state = self.state.read().await;
        let mut sessions: Vec<TrainingSession> = state
            .sessions
            .values()
            .filter(|s| s.athlete_id == athlete_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.scheduled_at);
        Ok(sessions)
    }

    async fn list_sessions_for_preset_group(&self, preset_group_id: Uuid) -> StoreResult<Vec<TrainingSession>> {
        let state = self.state.read().await;
        let mut sessions: Vec<TrainingSession> = state
            .sessions
            .values()
            .filter(|s| s.preset_group_id == preset_group_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| (s.scheduled_at, s.athlete_id));
        Ok(sessions)
    }

    async fn begin_session(
        &self,
        session_id: Uuid,
        details: &[TrainingDetail],
        now: DateTime<Utc>,
    ) -> StoreResult<BeginOutcome> {
        self.writable()?;
        let mut state = self.state.write().await;

        let Some(current) = state.sessions.get(&session_id).cloned() else {
            return Ok(BeginOutcome::Missing);
        };
        if !current.status.can_start() {
            return Ok(BeginOutcome::NotStartable(current));
        }

        let already_materialized = state.details.values().any(|d| d.training_session_id == session_id);
        if !already_materialized {
            for detail in details {
                state.details.insert(detail.id, detail.clone());
            }
        }

        let session = state
            .sessions
            .get_mut(&session_id)
            .map(|s| {
                s.status = SessionStatus::Ongoing;
                s.updated_at = now;
                s.clone()
            })
            .unwrap_or(current);

        Ok(BeginOutcome::Started {
            session,
            details_created: !already_materialized,
        })
    }

    async fn list_details(&self, session_id: Uuid) -> StoreResult<Vec<TrainingDetail>> {
        Ok(self.state.read().await.sorted_details(session_id))
    }

    async fn apply_detail_updates(
        &self,
        session_id: Uuid,
        updates: &[TrainingDetailUpdate],
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Vec<TrainingDetail>>> {
        self.writable()?;
        let mut state = self.state.write().await;

        let all_known = updates.iter().all(|u| {
            state
                .details
                .get(&u.id)
                .is_some_and(|d| d.training_session_id == session_id)
        });
        if !all_known {
            return Ok(None);
        }

        let mut updated = Vec::with_capacity(updates.len());
        for update in updates {
            if let Some(detail) = state.details.get_mut(&update.id) {
                detail.actual = update.actual.clone();
                detail.completed = update.completed;
                detail.updated_at = now;
                updated.push(detail.clone());
            }
        }
        Ok(Some(updated))
    }

    async fn transition_session(
        &self,
        id: Uuid,
        from: &[SessionStatus],
        to: SessionStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<TrainingSession>> {
        self.writable()?;
        let mut state = self.state.write().await;
        Ok(state.sessions.get_mut(&id).and_then(|session| {
            if !from.contains(&session.status) {
                return None;
            }
            session.status = to;
            session.updated_at = now;
            Some(session.clone())
        }))
    }

    async fn promote_due_sessions(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<u64> {
        self.writable()?;
        let mut state = self.state.write().await;
        let mut promoted = 0;
        for session in state.sessions.values_mut() {
            if session.status == SessionStatus::Pending && session.scheduled_at < cutoff {
                session.status = SessionStatus::Assigned;
                session.updated_at = now;
                promoted += 1;
            }
        }
        Ok(promoted)
    }
}
