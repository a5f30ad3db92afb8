use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Athlete {
    pub id: Uuid,
    pub user_id: Uuid,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub goals: Option<String>,
    pub experience: Option<String>,
    pub events: Vec<String>,
    pub current_group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct AthleteGroup {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only membership ledger entry. `group_id = None` records a removal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct AthleteGroupHistory {
    pub id: Uuid,
    pub athlete_id: Uuid,
    pub group_id: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
    pub author_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AthleteProfileInput {
    #[validate(range(min = 50.0, max = 260.0))]
    pub height_cm: Option<f64>,
    #[validate(range(min = 20.0, max = 300.0))]
    pub weight_kg: Option<f64>,
    #[validate(length(max = 2000))]
    pub goals: Option<String>,
    #[validate(length(max = 2000))]
    pub experience: Option<String>,
    pub events: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAthleteGroup {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// Move an athlete into `group_id`, or out of their current group when `None`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MoveAthlete {
    pub group_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}
