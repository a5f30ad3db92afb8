mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use coach_planner::errors::ServiceError;
use coach_planner::models::{AthleteProfileInput, MoveAthlete};
use coach_planner::repository::AthleteRepository;
use common::{coach, TestApp};

fn move_to(group_id: Option<uuid::Uuid>) -> MoveAthlete {
    MoveAthlete {
        group_id,
        notes: Some("roster change".into()),
    }
}

#[tokio::test]
async fn test_moves_append_history_and_never_rewrite_it() {
    let app = TestApp::new();
    let coach = coach();
    let (athlete, a1) = app.athlete().await;
    let x = app.athlete_group(&coach, &[&a1]).await;
    let y = app.athlete_group(&coach, &[]).await;

    let before = app.store.list_group_history(a1.id).await.unwrap();
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].group_id, Some(x.id));

    let moved = app.athletes.move_athlete(&coach, a1.id, move_to(Some(y.id))).await.unwrap();
    assert_eq!(moved.current_group_id, Some(y.id));

    let after_move = app.store.list_group_history(a1.id).await.unwrap();
    assert_eq!(after_move.len(), 2);
    assert_eq!(after_move[0], before[0]);
    assert_eq!(after_move[1].group_id, Some(y.id));
    assert_eq!(after_move[1].author_id, coach.user_id);

    let removed = app.athletes.move_athlete(&coach, a1.id, move_to(None)).await.unwrap();
    assert_eq!(removed.current_group_id, None);

    let after_removal = app.athletes.group_history(&athlete, a1.id).await.unwrap();
    assert_eq!(after_removal.len(), 3);
    assert_eq!(&after_removal[..2], &after_move[..]);
    assert_eq!(after_removal[2].group_id, None);
}

#[tokio::test]
async fn test_moving_into_current_group_is_rejected() {
    let app = TestApp::new();
    let coach = coach();
    let (_, a1) = app.athlete().await;
    let x = app.athlete_group(&coach, &[&a1]).await;

    let result = app.athletes.move_athlete(&coach, a1.id, move_to(Some(x.id))).await;
    assert_matches!(result, Err(ServiceError::Validation(_)));
    assert_eq!(app.store.list_group_history(a1.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_removing_athlete_without_group_is_rejected() {
    let app = TestApp::new();
    let (_, a1) = app.athlete().await;

    let result = app.athletes.move_athlete(&coach(), a1.id, move_to(None)).await;
    assert_matches!(result, Err(ServiceError::Validation(_)));
}

#[tokio::test]
async fn test_coach_cannot_use_another_coachs_group() {
    let app = TestApp::new();
    let owner = coach();
    let (_, a1) = app.athlete().await;
    let foreign = app.athlete_group(&owner, &[]).await;

    let result = app.athletes.move_athlete(&coach(), a1.id, move_to(Some(foreign.id))).await;
    assert!(result.is_err());
    assert!(app.store.list_group_history(a1.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_history_visibility() {
    let app = TestApp::new();
    let coach_x = coach();
    let (athlete, a1) = app.athlete().await;
    let (other_athlete, _) = app.athlete().await;
    app.athlete_group(&coach_x, &[&a1]).await;

    assert_eq!(app.athletes.group_history(&athlete, a1.id).await.unwrap().len(), 1);
    assert_eq!(app.athletes.group_history(&coach_x, a1.id).await.unwrap().len(), 1);
    assert_matches!(
        app.athletes.group_history(&other_athlete, a1.id).await,
        Err(ServiceError::Forbidden { .. })
    );
    assert_matches!(
        app.athletes.group_history(&coach(), a1.id).await,
        Err(ServiceError::Forbidden { .. })
    );
}

#[tokio::test]
async fn test_group_members_are_listed_for_the_owner_only() {
    let app = TestApp::new();
    let owner = coach();
    let (_, a1) = app.athlete().await;
    let (_, a2) = app.athlete().await;
    let squad = app.athlete_group(&owner, &[&a1, &a2]).await;

    let mut members: Vec<_> = app
        .athletes
        .list_group_members(&owner, squad.id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    members.sort();
    let mut expected = vec![a1.id, a2.id];
    expected.sort();
    assert_eq!(members, expected);

    assert!(app.athletes.list_group_members(&coach(), squad.id).await.is_err());
    assert_eq!(app.athletes.list_athlete_groups(&owner).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_profile_lifecycle() {
    let app = TestApp::new();
    let (athlete, profile) = app.athlete().await;

    let duplicate = app.athletes.create_profile(&athlete, AthleteProfileInput::default()).await;
    assert_matches!(duplicate, Err(ServiceError::Validation(_)));

    let updated = app
        .athletes
        .update_profile(
            &athlete,
            AthleteProfileInput {
                weight_kg: Some(72.5),
                events: Some(vec!["100m".into(), "200m".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.id, profile.id);
    assert_eq!(updated.weight_kg, Some(72.5));
    assert_eq!(updated.events, vec!["100m".to_string(), "200m".to_string()]);

    let fetched = app.athletes.get_profile(&athlete).await.unwrap();
    assert_eq!(fetched, updated);

    let coach_profile = app.athletes.create_profile(&coach(), AthleteProfileInput::default()).await;
    assert_matches!(coach_profile, Err(ServiceError::Forbidden { .. }));
}
