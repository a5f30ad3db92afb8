// Persistence seams. Services only see these traits; `PgStore` backs production
// and `MemoryStore` backs tests and local runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::{
    Athlete, AthleteGroup, AthleteGroupHistory, Exercise, ExerciseTag, ExerciseType, Macrocycle,
    Mesocycle, Microcycle, Preset, PresetDetail, PresetGroup, SessionStatus, Tag, TrainingDetail,
    TrainingDetailUpdate, TrainingSession, Unit, UpsertedSession,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn insert_macrocycle(&self, macrocycle: &Macrocycle) -> StoreResult<()>;
    async fn get_macrocycle(&self, id: Uuid) -> StoreResult<Option<Macrocycle>>;
    async fn update_macrocycle(&self, macrocycle: &Macrocycle) -> StoreResult<()>;
    /// Deletes the macrocycle with its meso- and microcycles and soft-deletes
    /// the preset groups that hung below them.
    async fn delete_macrocycle(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_mesocycle(&self, mesocycle: &Mesocycle) -> StoreResult<()>;
    async fn get_mesocycle(&self, id: Uuid) -> StoreResult<Option<Mesocycle>>;
    async fn update_mesocycle(&self, mesocycle: &Mesocycle) -> StoreResult<()>;
    async fn delete_mesocycle(&self, id: Uuid) -> StoreResult<bool>;
    async fn list_mesocycles_by_macrocycles(&self, macrocycle_ids: &[Uuid]) -> StoreResult<Vec<Mesocycle>>;

    async fn insert_microcycle(&self, microcycle: &Microcycle) -> StoreResult<()>;
    async fn get_microcycle(&self, id: Uuid) -> StoreResult<Option<Microcycle>>;
    async fn update_microcycle(&self, microcycle: &Microcycle) -> StoreResult<()>;
    async fn delete_microcycle(&self, id: Uuid) -> StoreResult<bool>;
    async fn list_microcycles_by_mesocycles(&self, mesocycle_ids: &[Uuid]) -> StoreResult<Vec<Microcycle>>;

    async fn insert_preset_group(&self, group: &PresetGroup) -> StoreResult<()>;
    /// Returns soft-deleted rows too; callers decide visibility.
    async fn get_preset_group(&self, id: Uuid) -> StoreResult<Option<PresetGroup>>;
    async fn update_preset_group(&self, group: &PresetGroup) -> StoreResult<()>;
    async fn soft_delete_preset_group(&self, id: Uuid) -> StoreResult<bool>;
    /// Non-deleted groups only.
    async fn list_preset_groups_by_microcycles(&self, microcycle_ids: &[Uuid]) -> StoreResult<Vec<PresetGroup>>;
    /// Non-deleted groups only.
    async fn list_preset_groups_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<PresetGroup>>;
    /// Inserts a group with all its presets and details, all or nothing.
    async fn insert_preset_group_tree(
        &self,
        group: &PresetGroup,
        presets: &[Preset],
        details: &[PresetDetail],
    ) -> StoreResult<()>;

    async fn insert_preset(&self, preset: &Preset) -> StoreResult<()>;
    async fn get_preset(&self, id: Uuid) -> StoreResult<Option<Preset>>;
    async fn update_preset(&self, preset: &Preset) -> StoreResult<()>;
    /// Deletes the preset and its details. `Conflict` when training details reference it.
    async fn delete_preset(&self, id: Uuid) -> StoreResult<bool>;
    async fn list_presets_by_groups(&self, group_ids: &[Uuid]) -> StoreResult<Vec<Preset>>;

    /// `Conflict` when the set index is already taken within the preset.
    async fn insert_preset_detail(&self, detail: &PresetDetail) -> StoreResult<()>;
    async fn get_preset_detail(&self, id: Uuid) -> StoreResult<Option<PresetDetail>>;
    async fn update_preset_detail(&self, detail: &PresetDetail) -> StoreResult<()>;
    async fn delete_preset_detail(&self, id: Uuid) -> StoreResult<bool>;
    async fn list_preset_details_by_presets(&self, preset_ids: &[Uuid]) -> StoreResult<Vec<PresetDetail>>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn insert_exercise_type(&self, exercise_type: &ExerciseType) -> StoreResult<()>;
    async fn list_exercise_types_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<ExerciseType>>;

    async fn insert_unit(&self, unit: &Unit) -> StoreResult<()>;
    async fn list_units_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Unit>>;

    async fn insert_tag(&self, tag: &Tag) -> StoreResult<()>;
    async fn list_tags_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Tag>>;

    /// Inserts the exercise and its tag links together.
    async fn insert_exercise(&self, exercise: &Exercise, tag_ids: &[Uuid]) -> StoreResult<()>;
    async fn get_exercise(&self, id: Uuid) -> StoreResult<Option<Exercise>>;
    async fn list_exercises(&self) -> StoreResult<Vec<Exercise>>;
    async fn list_exercises_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Exercise>>;
    async fn list_exercise_tags(&self, exercise_ids: &[Uuid]) -> StoreResult<Vec<ExerciseTag>>;
}

#[async_trait]
pub trait AthleteRepository: Send + Sync {
    async fn insert_athlete(&self, athlete: &Athlete) -> StoreResult<()>;
    async fn get_athlete(&self, id: Uuid) -> StoreResult<Option<Athlete>>;
    async fn get_athlete_by_user(&self, user_id: Uuid) -> StoreResult<Option<Athlete>>;
    /// Updates profile attributes; group membership only changes through `move_athlete`.
    async fn update_athlete_profile(&self, athlete: &Athlete) -> StoreResult<()>;
    async fn list_athletes_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Athlete>>;
    async fn list_athletes_in_group(&self, group_id: Uuid) -> StoreResult<Vec<Athlete>>;

    async fn insert_athlete_group(&self, group: &AthleteGroup) -> StoreResult<()>;
    async fn get_athlete_group(&self, id: Uuid) -> StoreResult<Option<AthleteGroup>>;
    async fn list_athlete_groups(&self, owner_id: Uuid) -> StoreResult<Vec<AthleteGroup>>;

    /// Sets the athlete's current group and appends `entry`, in one transaction.
    async fn move_athlete(&self, entry: &AthleteGroupHistory) -> StoreResult<Option<Athlete>>;
    /// Oldest first.
    async fn list_group_history(&self, athlete_id: Uuid) -> StoreResult<Vec<AthleteGroupHistory>>;
}

/// Result of the all-or-nothing start of a session.
#[derive(Debug, Clone, PartialEq)]
pub enum BeginOutcome {
    /// Status is now `ongoing`. `details_created` is false on a retry that
    /// found details already materialized.
    Started {
        session: TrainingSession,
        details_created: bool,
    },
    /// Current status does not allow starting; nothing was written.
    NotStartable(TrainingSession),
    Missing,
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Batch upsert keyed on (athlete_id, preset_group_id). Existing rows keep
    /// their status; schedule and group are refreshed only while not started.
    async fn upsert_sessions(&self, sessions: &[TrainingSession]) -> StoreResult<Vec<UpsertedSession>>;
    async fn get_session(&self, id: Uuid) -> StoreResult<Option<TrainingSession>>;
    async fn get_session_for(&self, athlete_id: Uuid, preset_group_id: Uuid) -> StoreResult<Option<TrainingSession>>;
    async fn list_sessions_for_athlete(&self, athlete_id: Uuid) -> StoreResult<Vec<TrainingSession>>;
    async fn list_sessions_for_preset_group(&self, preset_group_id: Uuid) -> StoreResult<Vec<TrainingSession>>;

    /// Flips `pending|assigned -> ongoing` and materializes `details` unless the
    /// session already has details. One transaction.
    async fn begin_session(
        &self,
        session_id: Uuid,
        details: &[TrainingDetail],
        now: DateTime<Utc>,
    ) -> StoreResult<BeginOutcome>;
    async fn list_details(&self, session_id: Uuid) -> StoreResult<Vec<TrainingDetail>>;
    /// Applies every update or none. `None` when an id does not belong to the session.
    async fn apply_detail_updates(
        &self,
        session_id: Uuid,
        updates: &[TrainingDetailUpdate],
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Vec<TrainingDetail>>>;
    /// Conditional status write. `None` when the current status is not in `from`.
    async fn transition_session(
        &self,
        id: Uuid,
        from: &[SessionStatus],
        to: SessionStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<TrainingSession>>;
    /// `pending -> assigned` for every session scheduled before `cutoff`.
    async fn promote_due_sessions(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<u64>;
}

pub trait Store: PlanRepository + CatalogRepository + AthleteRepository + SessionRepository {}

impl<T> Store for T where T: PlanRepository + CatalogRepository + AthleteRepository + SessionRepository {}
