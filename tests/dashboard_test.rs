mod common;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use coach_planner::auth::Principal;
use coach_planner::errors::ServiceError;
use coach_planner::models::{DashboardSessionType, SessionMode, SessionStatus, Timezone, TrainingSession};
use coach_planner::repository::SessionRepository;
use common::{coach, TestApp};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 18, 10, 0, 0).unwrap()
}

/// Stores a session with the given status and schedule for `athlete_id`.
async fn seed(
    app: &TestApp,
    coach: &Principal,
    athlete_id: Uuid,
    status: SessionStatus,
    scheduled_at: DateTime<Utc>,
) -> TrainingSession {
    let preset_group_id = app
        .preset_group(coach, SessionMode::Individual, None, None, &[1])
        .await;
    let session = TrainingSession {
        id: Uuid::new_v4(),
        athlete_id,
        athlete_group_id: None,
        preset_group_id,
        scheduled_at,
        status,
        notes: None,
        created_at: scheduled_at,
        updated_at: scheduled_at,
    };
    app.store.upsert_sessions(&[session.clone()]).await.unwrap();
    session
}

#[tokio::test]
async fn test_dashboard_precedence() {
    let app = TestApp::new();
    let coach = coach();

    // each athlete holds the previous athlete's sessions minus the winning one
    let (_, full) = app.athlete().await;
    let ongoing = seed(&app, &coach, full.id, SessionStatus::Ongoing, now() - Duration::days(1)).await;
    seed(&app, &coach, full.id, SessionStatus::Assigned, now() + Duration::hours(2)).await;
    seed(&app, &coach, full.id, SessionStatus::Completed, now() - Duration::days(5)).await;

    let (_, no_ongoing) = app.athlete().await;
    let today = seed(&app, &coach, no_ongoing.id, SessionStatus::Assigned, now() + Duration::hours(2)).await;
    seed(&app, &coach, no_ongoing.id, SessionStatus::Completed, now() - Duration::days(5)).await;

    let (_, only_completed) = app.athlete().await;
    let completed = seed(&app, &coach, only_completed.id, SessionStatus::Completed, now() - Duration::days(5)).await;

    let selected = app.dashboard.resolve_for_athlete(full.id, Timezone::utc(), now()).await.unwrap();
    assert_eq!(selected.session_type, DashboardSessionType::Ongoing);
    assert_eq!(selected.session.map(|s| s.id), Some(ongoing.id));

    let selected = app.dashboard.resolve_for_athlete(no_ongoing.id, Timezone::utc(), now()).await.unwrap();
    assert_eq!(selected.session_type, DashboardSessionType::Today);
    assert_eq!(selected.session.map(|s| s.id), Some(today.id));

    let selected = app
        .dashboard
        .resolve_for_athlete(only_completed.id, Timezone::utc(), now())
        .await
        .unwrap();
    assert_eq!(selected.session_type, DashboardSessionType::RecentCompleted);
    assert_eq!(selected.session.map(|s| s.id), Some(completed.id));
}

#[tokio::test]
async fn test_completed_last_week_shows_only_within_window() {
    let app = TestApp::new();
    let coach = coach();
    let (_, recent_athlete) = app.athlete().await;
    let (_, stale_athlete) = app.athlete().await;

    let recent = seed(&app, &coach, recent_athlete.id, SessionStatus::Completed, now() - Duration::days(6)).await;
    seed(&app, &coach, stale_athlete.id, SessionStatus::Completed, now() - Duration::days(8)).await;

    let selected = app
        .dashboard
        .resolve_for_athlete(recent_athlete.id, Timezone::utc(), now())
        .await
        .unwrap();
    assert_eq!(selected.session_type, DashboardSessionType::RecentCompleted);
    assert_eq!(selected.session.map(|s| s.id), Some(recent.id));

    let selected = app
        .dashboard
        .resolve_for_athlete(stale_athlete.id, Timezone::utc(), now())
        .await
        .unwrap();
    assert_eq!(selected.session_type, DashboardSessionType::None);
    assert_eq!(selected.session, None);
}

#[tokio::test]
async fn test_upcoming_pending_session_is_shown() {
    let app = TestApp::new();
    let coach = coach();
    let (_, athlete) = app.athlete().await;
    let upcoming = seed(&app, &coach, athlete.id, SessionStatus::Pending, now() + Duration::days(3)).await;
    seed(&app, &coach, athlete.id, SessionStatus::Pending, now() + Duration::days(9)).await;

    let selected = app.dashboard.resolve_for_athlete(athlete.id, Timezone::utc(), now()).await.unwrap();
    assert_eq!(selected.session_type, DashboardSessionType::Upcoming);
    assert_eq!(selected.session.map(|s| s.id), Some(upcoming.id));
}

#[tokio::test]
async fn test_caller_timezone_decides_what_today_is() {
    let app = TestApp::new();
    let coach = coach();
    let (_, athlete) = app.athlete().await;
    // 22:30 UTC on the 18th is the 19th in UTC+05:00
    let evening = Utc.with_ymd_and_hms(2024, 9, 18, 22, 30, 0).unwrap();
    seed(&app, &coach, athlete.id, SessionStatus::Assigned, evening).await;

    let utc_view = app.dashboard.resolve_for_athlete(athlete.id, Timezone::utc(), now()).await.unwrap();
    assert_eq!(utc_view.session_type, DashboardSessionType::Today);

    let east: Timezone = "+05:00".parse().unwrap();
    let east_view = app.dashboard.resolve_for_athlete(athlete.id, east, now()).await.unwrap();
    assert_eq!(east_view.session_type, DashboardSessionType::None);
}

#[tokio::test]
async fn test_dashboard_requires_an_athlete_profile() {
    let app = TestApp::new();
    let result = app
        .dashboard
        .resolve_dashboard_session(&Principal::athlete(Uuid::new_v4()), Timezone::utc())
        .await;
    assert_matches!(result, Err(ServiceError::NotFound { .. }));

    let result = app.dashboard.resolve_dashboard_session(&coach(), Timezone::utc()).await;
    assert_matches!(result, Err(ServiceError::NotFound { .. }));
}
