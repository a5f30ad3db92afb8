use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::periodization::SetMetrics;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Assigned,
    Ongoing,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Assigned => "assigned",
            SessionStatus::Ongoing => "ongoing",
            SessionStatus::Completed => "completed",
        }
    }

    /// States from which the athlete may start the session.
    pub const STARTABLE: &'static [SessionStatus] = &[SessionStatus::Pending, SessionStatus::Assigned];

    /// States whose plan content (schedule, group) may still follow the template.
    pub const NOT_STARTED: &'static [SessionStatus] = &[SessionStatus::Pending, SessionStatus::Assigned];

    pub fn can_start(&self) -> bool {
        Self::STARTABLE.contains(self)
    }

    pub fn can_complete(&self) -> bool {
        matches!(self, SessionStatus::Ongoing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TrainingSession {
    pub id: Uuid,
    pub athlete_id: Uuid,
    /// Copied from the preset group at assignment time
    pub athlete_group_id: Option<Uuid>,
    pub preset_group_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One recorded set, seeded from a `PresetDetail` when the session starts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TrainingDetail {
    pub id: Uuid,
    pub training_session_id: Uuid,
    pub preset_id: Uuid,
    pub set_index: i32,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub actual: SetMetrics,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

/// Athlete-submitted values for one existing training detail.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrainingDetailUpdate {
    pub id: Uuid,
    #[serde(flatten)]
    #[validate(nested)]
    pub actual: SetMetrics,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSessionDetails {
    pub details: Vec<TrainingDetailUpdate>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionWithDetails {
    #[serde(flatten)]
    pub session: TrainingSession,
    pub details: Vec<TrainingDetail>,
}

/// How a single row fared in a batch upsert.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Row existed in a started state; plan content was left untouched
    Preserved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertedSession {
    pub session: TrainingSession,
    pub outcome: UpsertOutcome,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AssignmentFailure {
    pub athlete_id: Uuid,
    pub reason: String,
}

/// Aggregate result of fanning out one preset group.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AssignmentReport {
    pub preset_group_id: Uuid,
    /// Rows inserted or updated or preserved
    pub sessions_touched: usize,
    pub created: usize,
    pub updated: usize,
    pub preserved: usize,
    pub sessions: Vec<Uuid>,
    pub failures: Vec<AssignmentFailure>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkTransitionFailure {
    pub session_id: Uuid,
    pub reason: String,
}

/// Aggregate result of a coach-driven start/complete over one preset group.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BulkTransitionReport {
    pub preset_group_id: Uuid,
    pub succeeded: Vec<Uuid>,
    /// Sessions already past the requested transition
    pub skipped: Vec<Uuid>,
    pub failed: Vec<BulkTransitionFailure>,
}
