use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::exercise::Exercise;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Macrocycle {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Mesocycle {
    pub id: Uuid,
    pub macrocycle_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// 1-based position inside the macrocycle
    pub ordinal: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Microcycle {
    pub id: Uuid,
    /// `None` for a standalone week that is not part of a mesocycle
    pub mesocycle_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub week_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "session_mode", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Individual,
    Group,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Individual => "individual",
            SessionMode::Group => "group",
        }
    }
}

/// A coach-authored session template.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PresetGroup {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub microcycle_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub week: Option<i32>,
    pub day: Option<i32>,
    pub session_mode: SessionMode,
    /// Required when `session_mode` is `Group`
    pub athlete_group_id: Option<Uuid>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Preset {
    pub id: Uuid,
    pub preset_group_id: Uuid,
    pub exercise_id: Uuid,
    pub preset_order: i32,
    /// Presets sharing a superset id are performed back-to-back
    pub superset_id: Option<String>,
    pub notes: Option<String>,
}

/// Metrics of one set. Planned on a `PresetDetail`, actual on a `TrainingDetail`.
/// Every field is optional; an exercise only reports what its type measures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, PartialEq, Validate)]
pub struct SetMetrics {
    #[validate(range(min = 0))]
    pub reps: Option<i32>,
    #[validate(range(min = 0.0))]
    pub resistance: Option<f64>,
    #[validate(range(min = 0.0))]
    pub distance: Option<f64>,
    #[validate(range(min = 0))]
    pub duration_seconds: Option<i32>,
    #[validate(length(max = 20))]
    pub tempo: Option<String>,
    #[validate(range(min = 0.0))]
    pub power: Option<f64>,
    #[validate(range(min = 0.0))]
    pub velocity: Option<f64>,
}

/// One planned set.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PresetDetail {
    pub id: Uuid,
    pub preset_id: Uuid,
    /// 1-based, unique within the preset
    pub set_index: i32,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub planned: SetMetrics,
}

/// Discriminates the six node types of the plan hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlanNodeKind {
    Macrocycle,
    Mesocycle,
    Microcycle,
    PresetGroup,
    Preset,
    PresetDetail,
}

impl PlanNodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanNodeKind::Macrocycle => "macrocycle",
            PlanNodeKind::Mesocycle => "mesocycle",
            PlanNodeKind::Microcycle => "microcycle",
            PlanNodeKind::PresetGroup => "preset_group",
            PlanNodeKind::Preset => "preset",
            PlanNodeKind::PresetDetail => "preset_detail",
        }
    }
}

impl std::fmt::Display for PlanNodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanNodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "macrocycle" => Ok(PlanNodeKind::Macrocycle),
            "mesocycle" => Ok(PlanNodeKind::Mesocycle),
            "microcycle" => Ok(PlanNodeKind::Microcycle),
            "preset_group" => Ok(PlanNodeKind::PresetGroup),
            "preset" => Ok(PlanNodeKind::Preset),
            "preset_detail" => Ok(PlanNodeKind::PresetDetail),
            other => Err(format!("unknown plan node kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMacrocycle {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMesocycle {
    pub macrocycle_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 1))]
    pub ordinal: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMicrocycle {
    pub mesocycle_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 1))]
    pub week_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePresetGroup {
    pub microcycle_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    #[validate(range(min = 1))]
    pub week: Option<i32>,
    #[validate(range(min = 1, max = 7))]
    pub day: Option<i32>,
    pub session_mode: SessionMode,
    pub athlete_group_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePreset {
    pub preset_group_id: Uuid,
    pub exercise_id: Uuid,
    #[validate(range(min = 0))]
    pub preset_order: i32,
    #[validate(length(min = 1, max = 50))]
    pub superset_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePresetDetail {
    pub preset_id: Uuid,
    #[validate(range(min = 1))]
    pub set_index: i32,
    #[serde(flatten)]
    #[validate(nested)]
    pub planned: SetMetrics,
}

/// Input of `createPlanNode`: the node kind plus its fields, parent id included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreatePlanNode {
    Macrocycle(CreateMacrocycle),
    Mesocycle(CreateMesocycle),
    Microcycle(CreateMicrocycle),
    PresetGroup(CreatePresetGroup),
    Preset(CreatePreset),
    PresetDetail(CreatePresetDetail),
}

impl CreatePlanNode {
    pub fn kind(&self) -> PlanNodeKind {
        match self {
            CreatePlanNode::Macrocycle(_) => PlanNodeKind::Macrocycle,
            CreatePlanNode::Mesocycle(_) => PlanNodeKind::Mesocycle,
            CreatePlanNode::Microcycle(_) => PlanNodeKind::Microcycle,
            CreatePlanNode::PresetGroup(_) => PlanNodeKind::PresetGroup,
            CreatePlanNode::Preset(_) => PlanNodeKind::Preset,
            CreatePlanNode::PresetDetail(_) => PlanNodeKind::PresetDetail,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanNodeCreated {
    pub id: Uuid,
    pub kind: PlanNodeKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCycle {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePresetGroup {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    #[validate(range(min = 1))]
    pub week: Option<i32>,
    #[validate(range(min = 1, max = 7))]
    pub day: Option<i32>,
    pub session_mode: Option<SessionMode>,
    pub athlete_group_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePreset {
    #[validate(range(min = 0))]
    pub preset_order: Option<i32>,
    #[validate(length(min = 1, max = 50))]
    pub superset_id: Option<String>,
    pub notes: Option<String>,
}

/// Input of `updatePlanNode`. PresetDetails are replaced by deleting and re-creating them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdatePlanNode {
    Macrocycle(UpdateCycle),
    Mesocycle(UpdateCycle),
    Microcycle(UpdateCycle),
    PresetGroup(UpdatePresetGroup),
    Preset(UpdatePreset),
    PresetDetail(SetMetrics),
}

impl UpdatePlanNode {
    pub fn kind(&self) -> PlanNodeKind {
        match self {
            UpdatePlanNode::Macrocycle(_) => PlanNodeKind::Macrocycle,
            UpdatePlanNode::Mesocycle(_) => PlanNodeKind::Mesocycle,
            UpdatePlanNode::Microcycle(_) => PlanNodeKind::Microcycle,
            UpdatePlanNode::PresetGroup(_) => PlanNodeKind::PresetGroup,
            UpdatePlanNode::Preset(_) => PlanNodeKind::Preset,
            UpdatePlanNode::PresetDetail(_) => PlanNodeKind::PresetDetail,
        }
    }
}

/// A single plan node as stored, returned by `updatePlanNode`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", content = "node", rename_all = "snake_case")]
pub enum PlanNode {
    Macrocycle(Macrocycle),
    Mesocycle(Mesocycle),
    Microcycle(Microcycle),
    PresetGroup(PresetGroup),
    Preset(Preset),
    PresetDetail(PresetDetail),
}

// Assembled plan trees. Children are always sorted by their ordering field.

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PresetNode {
    #[serde(flatten)]
    pub preset: Preset,
    pub exercise: Option<Exercise>,
    pub details: Vec<PresetDetail>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PresetGroupNode {
    #[serde(flatten)]
    pub group: PresetGroup,
    pub presets: Vec<PresetNode>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MicrocycleNode {
    #[serde(flatten)]
    pub microcycle: Microcycle,
    pub preset_groups: Vec<PresetGroupNode>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MesocycleNode {
    #[serde(flatten)]
    pub mesocycle: Mesocycle,
    pub microcycles: Vec<MicrocycleNode>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MacrocycleNode {
    #[serde(flatten)]
    pub macrocycle: Macrocycle,
    pub mesocycles: Vec<MesocycleNode>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", content = "tree", rename_all = "snake_case")]
pub enum PlanTree {
    Macrocycle(MacrocycleNode),
    Mesocycle(MesocycleNode),
    Microcycle(MicrocycleNode),
    PresetGroup(PresetGroupNode),
}
