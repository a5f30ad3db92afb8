// One authorization predicate per operation. Services call these and turn a
// `false` into `ServiceError::Forbidden`; handlers never check roles themselves.

use crate::auth::Principal;
use crate::models::{Athlete, AthleteGroup, PresetGroup, SessionMode, TrainingSession};
use uuid::Uuid;

/// Coaches author plan nodes they own.
pub fn can_manage_plan(principal: &Principal, owner_id: Uuid) -> bool {
    principal.is_coach() && principal.user_id == owner_id
}

/// Owning coach fans out to the audience; any athlete may self-assign.
pub fn can_assign_preset_group(principal: &Principal, group: &PresetGroup) -> bool {
    if principal.is_coach() {
        group.owner_id == principal.user_id
    } else {
        principal.is_athlete()
    }
}

pub fn can_manage_athlete_group(principal: &Principal, group: &AthleteGroup) -> bool {
    principal.is_coach() && group.owner_id == principal.user_id
}

/// Start and detail updates: the session's athlete only.
pub fn can_operate_session(session: &TrainingSession, caller: Option<&Athlete>) -> bool {
    caller.is_some_and(|athlete| athlete.id == session.athlete_id)
}

/// The athlete, or the owning coach when the template is run as a group session.
pub fn can_complete_session(
    principal: &Principal,
    session: &TrainingSession,
    caller: Option<&Athlete>,
    group: &PresetGroup,
) -> bool {
    if can_operate_session(session, caller) {
        return true;
    }
    principal.is_coach()
        && group.owner_id == principal.user_id
        && group.session_mode == SessionMode::Group
}

/// Athletes read their own sessions; coaches read sessions of templates they own.
pub fn can_view_session(
    principal: &Principal,
    session: &TrainingSession,
    caller: Option<&Athlete>,
    group_owner_id: Uuid,
) -> bool {
    if principal.is_coach() {
        return principal.user_id == group_owner_id;
    }
    can_operate_session(session, caller)
}

/// Bulk transitions are coach-led and scoped to templates the coach owns.
pub fn can_run_group_sessions(principal: &Principal, group: &PresetGroup) -> bool {
    principal.is_coach() && group.owner_id == principal.user_id
}
