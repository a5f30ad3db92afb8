use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ExerciseType {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    pub abbreviation: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Catalog row as stored. `exercise_type_id` can only be `None` when the
/// referenced type was removed underneath it, which reads treat as an error.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Exercise {
    pub id: Uuid,
    pub name: String,
    pub exercise_type_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct ExerciseTag {
    pub exercise_id: Uuid,
    pub tag_id: Uuid,
}

/// Exercise resolved against its type, unit and tags.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExerciseView {
    #[serde(flatten)]
    pub exercise: Exercise,
    pub exercise_type: ExerciseType,
    pub unit: Option<Unit>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateExerciseType {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUnit {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTag {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateExercise {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub exercise_type_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub description: Option<String>,
    #[validate(url)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExerciseQuery {
    pub exercise_type_id: Option<Uuid>,
    pub tag_id: Option<Uuid>,
}
