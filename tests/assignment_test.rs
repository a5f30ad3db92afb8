mod common;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use coach_planner::errors::ServiceError;
use coach_planner::models::{SessionMode, SessionStatus};
use coach_planner::repository::{PlanRepository, SessionRepository};
use common::{coach, date, TestApp};

#[tokio::test]
async fn test_group_fan_out_creates_one_pending_session_per_member() {
    let app = TestApp::new();
    let coach = coach();
    let (_, a1) = app.athlete().await;
    let (_, a2) = app.athlete().await;
    let (_, a3) = app.athlete().await;
    let squad = app.athlete_group(&coach, &[&a1, &a2, &a3]).await;
    let group_id = app
        .preset_group(&coach, SessionMode::Group, Some(squad.id), None, &[3])
        .await;

    let report = app.assignments.assign_preset_group(&coach, group_id).await.unwrap();

    assert_eq!(report.sessions_touched, 3);
    assert_eq!(report.created, 3);
    assert!(report.failures.is_empty());

    let sessions = app.store.list_sessions_for_preset_group(group_id).await.unwrap();
    assert_eq!(sessions.len(), 3);
    for session in &sessions {
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.preset_group_id, group_id);
        assert_eq!(session.athlete_group_id, Some(squad.id));
    }
    let mut athletes: Vec<_> = sessions.iter().map(|s| s.athlete_id).collect();
    athletes.sort();
    let mut expected = vec![a1.id, a2.id, a3.id];
    expected.sort();
    assert_eq!(athletes, expected);
}

#[tokio::test]
async fn test_repeated_assignment_is_idempotent() {
    let app = TestApp::new();
    let coach = coach();
    let (_, a1) = app.athlete().await;
    let (_, a2) = app.athlete().await;
    let squad = app.athlete_group(&coach, &[&a1, &a2]).await;
    let group_id = app
        .preset_group(&coach, SessionMode::Group, Some(squad.id), None, &[2])
        .await;

    let first = app.assignments.assign_preset_group(&coach, group_id).await.unwrap();
    let second = app.assignments.assign_preset_group(&coach, group_id).await.unwrap();

    assert_eq!(first.created, 2);
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 2);

    let mut first_ids = first.sessions.clone();
    let mut second_ids = second.sessions.clone();
    first_ids.sort();
    second_ids.sort();
    assert_eq!(first_ids, second_ids);
    assert_eq!(app.store.list_sessions_for_preset_group(group_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_reassignment_never_regresses_started_sessions() {
    let app = TestApp::new();
    let coach = coach();
    let (p1, a1) = app.athlete().await;
    let (p2, a2) = app.athlete().await;
    let (_, a3) = app.athlete().await;
    let squad = app.athlete_group(&coach, &[&a1, &a2, &a3]).await;
    let group_id = app
        .preset_group(&coach, SessionMode::Group, Some(squad.id), None, &[1])
        .await;
    app.assignments.assign_preset_group(&coach, group_id).await.unwrap();

    let s1 = app.store.get_session_for(a1.id, group_id).await.unwrap().unwrap();
    let s2 = app.store.get_session_for(a2.id, group_id).await.unwrap().unwrap();
    app.sessions.start_session(&p1, s1.id).await.unwrap();
    app.sessions.start_session(&p2, s2.id).await.unwrap();
    app.sessions.complete_session(&p2, s2.id).await.unwrap();

    let report = app.assignments.assign_preset_group(&coach, group_id).await.unwrap();
    assert_eq!(report.preserved, 2);
    assert_eq!(report.updated, 1);

    let s1 = app.store.get_session(s1.id).await.unwrap().unwrap();
    let s2 = app.store.get_session(s2.id).await.unwrap().unwrap();
    let s3 = app.store.get_session_for(a3.id, group_id).await.unwrap().unwrap();
    assert_eq!(s1.status, SessionStatus::Ongoing);
    assert_eq!(s2.status, SessionStatus::Completed);
    assert_eq!(s3.status, SessionStatus::Pending);
    assert_eq!(app.sessions.get_session(&p1, s1.id).await.unwrap().details.len(), 1);
}

#[tokio::test]
async fn test_athlete_outside_target_group_can_self_assign() {
    let app = TestApp::new();
    let coach = coach();
    let (_, a1) = app.athlete().await;
    let (p4, a4) = app.athlete().await;
    let squad = app.athlete_group(&coach, &[&a1]).await;
    let group_id = app
        .preset_group(&coach, SessionMode::Group, Some(squad.id), None, &[2])
        .await;

    let report = app.assignments.assign_preset_group(&p4, group_id).await.unwrap();

    assert_eq!(report.sessions_touched, 1);
    let sessions = app.store.list_sessions_for_preset_group(group_id).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].athlete_id, a4.id);
    assert_eq!(sessions[0].status, SessionStatus::Pending);
}

#[tokio::test]
async fn test_other_coach_cannot_assign() {
    let app = TestApp::new();
    let owner = coach();
    let group_id = app
        .preset_group(&owner, SessionMode::Individual, None, None, &[1])
        .await;

    let result = app.assignments.assign_preset_group(&coach(), group_id).await;
    assert_matches!(result, Err(ServiceError::Forbidden { .. }));
}

#[tokio::test]
async fn test_deleted_preset_group_is_not_found() {
    let app = TestApp::new();
    let coach = coach();
    let (athlete, _) = app.athlete().await;
    let group_id = app
        .preset_group(&coach, SessionMode::Individual, None, None, &[1])
        .await;
    app.plans
        .delete_plan_node(&coach, coach_planner::models::PlanNodeKind::PresetGroup, group_id)
        .await
        .unwrap();

    let result = app.assignments.assign_preset_group(&athlete, group_id).await;
    assert_matches!(result, Err(ServiceError::NotFound { .. }));
}

#[tokio::test]
async fn test_athlete_without_profile_cannot_self_assign() {
    let app = TestApp::new();
    let coach = coach();
    let group_id = app
        .preset_group(&coach, SessionMode::Individual, None, None, &[1])
        .await;
    let stranger = coach_planner::auth::Principal::athlete(uuid::Uuid::new_v4());

    let result = app.assignments.assign_preset_group(&stranger, group_id).await;
    assert_matches!(result, Err(ServiceError::NotFound { entity: "athlete", .. }));
}

#[tokio::test]
async fn test_target_date_sets_schedule_to_local_midnight() {
    let app = TestApp::new();
    let coach = coach();
    let (athlete, _) = app.athlete().await;
    let group_id = app
        .preset_group(&coach, SessionMode::Individual, None, Some(date(2024, 6, 3)), &[1])
        .await;

    let report = app.assignments.assign_preset_group(&athlete, group_id).await.unwrap();
    let session = app.store.get_session(report.sessions[0]).await.unwrap().unwrap();

    assert_eq!(session.scheduled_at, Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap());
}

#[tokio::test]
async fn test_store_failure_surfaces_as_persistence_error() {
    let app = TestApp::new();
    let coach = coach();
    let (athlete, _) = app.athlete().await;
    let group_id = app
        .preset_group(&coach, SessionMode::Individual, None, None, &[1])
        .await;

    app.store.fail_writes(true);
    let result = app.assignments.assign_preset_group(&athlete, group_id).await;
    app.store.fail_writes(false);

    assert_matches!(result, Err(ServiceError::Persistence(_)));
    assert!(app.store.list_sessions_for_preset_group(group_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_group_mode_without_target_group_is_rejected() {
    let app = TestApp::new();
    let coach = coach();
    let (_, a1) = app.athlete().await;
    let squad = app.athlete_group(&coach, &[&a1]).await;
    let group_id = app
        .preset_group(&coach, SessionMode::Group, Some(squad.id), None, &[1])
        .await;

    let mut stored = app.store.get_preset_group(group_id).await.unwrap().unwrap();
    stored.athlete_group_id = None;
    app.store.update_preset_group(&stored).await.unwrap();

    let result = app.assignments.assign_preset_group(&coach, group_id).await;
    assert_matches!(result, Err(ServiceError::Validation(msg)) if msg.contains("without an athlete group"));
    assert!(app.store.list_sessions_for_preset_group(group_id).await.unwrap().is_empty());
}
