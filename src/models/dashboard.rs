use serde::Serialize;

use super::session::TrainingSession;

/// Which precedence rule selected the dashboard session.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DashboardSessionType {
    Ongoing,
    Today,
    Upcoming,
    RecentCompleted,
    None,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardSession {
    #[serde(rename = "type")]
    pub session_type: DashboardSessionType,
    pub session: Option<TrainingSession>,
}

impl DashboardSession {
    pub fn none() -> Self {
        Self {
            session_type: DashboardSessionType::None,
            session: None,
        }
    }

    pub fn of(session_type: DashboardSessionType, session: TrainingSession) -> Self {
        Self {
            session_type,
            session: Some(session),
        }
    }
}
