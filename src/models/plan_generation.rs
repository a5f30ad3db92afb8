use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::periodization::{SessionMode, SetMetrics};

/// What the coach asks the external generator for.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlanGenerationRequest {
    #[validate(length(min = 1, max = 2000))]
    pub prompt: String,
    pub microcycle_id: Option<Uuid>,
    pub target_date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 7))]
    pub day: Option<i32>,
    #[serde(default = "default_mode")]
    pub session_mode: SessionMode,
    pub athlete_group_id: Option<Uuid>,
    /// Exercises the generator may pick from; empty means the whole catalog
    #[serde(default)]
    pub exercise_ids: Vec<Uuid>,
}

fn default_mode() -> SessionMode {
    SessionMode::Individual
}

/// Payload sent to the generator: the request plus the catalog it may draw from.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratorPrompt {
    pub prompt: String,
    pub target_date: Option<NaiveDate>,
    pub exercises: Vec<GeneratorExercise>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorExercise {
    pub id: Uuid,
    pub name: String,
    pub exercise_type: String,
}

/// Preset group skeleton returned by the generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedPresetGroup {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub presets: Vec<GeneratedPreset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedPreset {
    pub exercise_id: Uuid,
    pub superset_id: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub sets: Vec<SetMetrics>,
}
