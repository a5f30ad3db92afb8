mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use coach_planner::auth::Principal;
use coach_planner::errors::ServiceError;
use coach_planner::models::*;
use coach_planner::repository::PlanRepository;
use common::{coach, date, unique_name, TestApp};

async fn create(app: &TestApp, coach: &Principal, node: CreatePlanNode) -> Uuid {
    app.plans.create_plan_node(coach, node).await.unwrap().id
}

/// Macrocycle -> two mesocycles -> one microcycle -> one preset group with one preset.
async fn season(app: &TestApp, coach: &Principal) -> (Uuid, Uuid, Uuid) {
    let macro_id = create(
        app,
        coach,
        CreatePlanNode::Macrocycle(CreateMacrocycle {
            name: "2024 season".into(),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
        }),
    )
    .await;

    // inserted out of order on purpose
    let later_meso = create(
        app,
        coach,
        CreatePlanNode::Mesocycle(CreateMesocycle {
            macrocycle_id: macro_id,
            name: "Build".into(),
            start_date: date(2024, 4, 1),
            end_date: date(2024, 6, 30),
            ordinal: 2,
        }),
    )
    .await;
    let first_meso = create(
        app,
        coach,
        CreatePlanNode::Mesocycle(CreateMesocycle {
            macrocycle_id: macro_id,
            name: "Base".into(),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 3, 31),
            ordinal: 1,
        }),
    )
    .await;

    let micro_id = create(
        app,
        coach,
        CreatePlanNode::Microcycle(CreateMicrocycle {
            mesocycle_id: Some(first_meso),
            name: Some("Week 1".into()),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 1, 7),
            week_index: 1,
        }),
    )
    .await;

    let group_id = create(
        app,
        coach,
        CreatePlanNode::PresetGroup(CreatePresetGroup {
            microcycle_id: Some(micro_id),
            name: "Monday strength".into(),
            description: None,
            target_date: Some(date(2024, 1, 1)),
            week: Some(1),
            day: Some(1),
            session_mode: SessionMode::Individual,
            athlete_group_id: None,
        }),
    )
    .await;

    let exercise = app.exercise(coach).await;
    for (order, sets) in [(1, vec![3, 1, 2]), (0, vec![1])] {
        let preset_id = create(
            app,
            coach,
            CreatePlanNode::Preset(CreatePreset {
                preset_group_id: group_id,
                exercise_id: exercise.exercise.id,
                preset_order: order,
                superset_id: None,
                notes: None,
            }),
        )
        .await;
        for set_index in sets {
            create(
                app,
                coach,
                CreatePlanNode::PresetDetail(CreatePresetDetail {
                    preset_id,
                    set_index,
                    planned: SetMetrics {
                        reps: Some(5),
                        ..Default::default()
                    },
                }),
            )
            .await;
        }
    }

    assert_ne!(later_meso, first_meso);
    (macro_id, micro_id, group_id)
}

#[tokio::test]
async fn test_tree_is_nested_and_sorted() {
    let app = TestApp::new();
    let coach = coach();
    let (macro_id, _, group_id) = season(&app, &coach).await;

    let tree = app.plans.get_plan_tree(&coach, PlanNodeKind::Macrocycle, macro_id).await.unwrap();
    let PlanTree::Macrocycle(root) = tree else {
        panic!("expected a macrocycle tree");
    };

    let ordinals: Vec<i32> = root.mesocycles.iter().map(|m| m.mesocycle.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2]);
    assert_eq!(root.mesocycles[0].microcycles.len(), 1);
    assert!(root.mesocycles[1].microcycles.is_empty());

    let group = &root.mesocycles[0].microcycles[0].preset_groups[0];
    assert_eq!(group.group.id, group_id);
    let orders: Vec<i32> = group.presets.iter().map(|p| p.preset.preset_order).collect();
    assert_eq!(orders, vec![0, 1]);
    let set_indexes: Vec<i32> = group.presets[1].details.iter().map(|d| d.set_index).collect();
    assert_eq!(set_indexes, vec![1, 2, 3]);
    assert!(group.presets.iter().all(|p| p.exercise.is_some()));
}

#[tokio::test]
async fn test_deleting_a_cycle_soft_deletes_preset_groups_below() {
    let app = TestApp::new();
    let coach = coach();
    let (macro_id, micro_id, group_id) = season(&app, &coach).await;

    app.plans.delete_plan_node(&coach, PlanNodeKind::Macrocycle, macro_id).await.unwrap();

    assert_eq!(app.store.get_macrocycle(macro_id).await.unwrap(), None);
    assert_eq!(app.store.get_microcycle(micro_id).await.unwrap(), None);
    let group = app.store.get_preset_group(group_id).await.unwrap().unwrap();
    assert!(group.is_deleted);
    assert_eq!(group.microcycle_id, None);

    assert_matches!(
        app.plans.get_plan_tree(&coach, PlanNodeKind::PresetGroup, group_id).await,
        Err(ServiceError::NotFound { .. })
    );
    assert!(app.plans.list_preset_groups(&coach).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_other_coach_is_forbidden() {
    let app = TestApp::new();
    let owner = coach();
    let (macro_id, _, group_id) = season(&app, &owner).await;
    let other = coach();

    assert_matches!(
        app.plans.get_plan_tree(&other, PlanNodeKind::Macrocycle, macro_id).await,
        Err(ServiceError::Forbidden { .. })
    );
    assert_matches!(
        app.plans.delete_plan_node(&other, PlanNodeKind::PresetGroup, group_id).await,
        Err(ServiceError::Forbidden { .. })
    );
    let result = app
        .plans
        .create_plan_node(
            &other,
            CreatePlanNode::Mesocycle(CreateMesocycle {
                macrocycle_id: macro_id,
                name: unique_name(),
                start_date: date(2024, 7, 1),
                end_date: date(2024, 8, 1),
                ordinal: 3,
            }),
        )
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden { .. }));
}

#[tokio::test]
async fn test_athletes_cannot_author_plans() {
    let app = TestApp::new();
    let (athlete, _) = app.athlete().await;
    let result = app
        .plans
        .create_plan_node(
            &athlete,
            CreatePlanNode::Macrocycle(CreateMacrocycle {
                name: unique_name(),
                start_date: date(2024, 1, 1),
                end_date: date(2024, 2, 1),
            }),
        )
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden { .. }));
}

#[tokio::test]
async fn test_authoring_rules_are_enforced() {
    let app = TestApp::new();
    let coach = coach();

    let inverted = app
        .plans
        .create_plan_node(
            &coach,
            CreatePlanNode::Macrocycle(CreateMacrocycle {
                name: unique_name(),
                start_date: date(2024, 5, 1),
                end_date: date(2024, 4, 1),
            }),
        )
        .await;
    assert_matches!(inverted, Err(ServiceError::Validation(_)));

    let group_without_target = app
        .plans
        .create_plan_node(
            &coach,
            CreatePlanNode::PresetGroup(CreatePresetGroup {
                microcycle_id: None,
                name: unique_name(),
                description: None,
                target_date: None,
                week: None,
                day: None,
                session_mode: SessionMode::Group,
                athlete_group_id: None,
            }),
        )
        .await;
    assert_matches!(group_without_target, Err(ServiceError::Validation(_)));

    let bad_day = app
        .plans
        .create_plan_node(
            &coach,
            CreatePlanNode::PresetGroup(CreatePresetGroup {
                microcycle_id: None,
                name: unique_name(),
                description: None,
                target_date: None,
                week: None,
                day: Some(8),
                session_mode: SessionMode::Individual,
                athlete_group_id: None,
            }),
        )
        .await;
    assert_matches!(bad_day, Err(ServiceError::Validation(_)));

    let group_id = app
        .preset_group(&coach, SessionMode::Individual, None, None, &[])
        .await;
    let unknown_exercise = app
        .plans
        .create_plan_node(
            &coach,
            CreatePlanNode::Preset(CreatePreset {
                preset_group_id: group_id,
                exercise_id: Uuid::new_v4(),
                preset_order: 0,
                superset_id: None,
                notes: None,
            }),
        )
        .await;
    assert_matches!(unknown_exercise, Err(ServiceError::Validation(_)));
}

#[tokio::test]
async fn test_duplicate_set_index_is_rejected() {
    let app = TestApp::new();
    let coach = coach();
    let group_id = app
        .preset_group(&coach, SessionMode::Individual, None, None, &[2])
        .await;
    let PlanTree::PresetGroup(tree) = app.plans.get_plan_tree(&coach, PlanNodeKind::PresetGroup, group_id).await.unwrap() else {
        panic!("expected a preset group tree");
    };

    let result = app
        .plans
        .create_plan_node(
            &coach,
            CreatePlanNode::PresetDetail(CreatePresetDetail {
                preset_id: tree.presets[0].preset.id,
                set_index: 2,
                planned: SetMetrics::default(),
            }),
        )
        .await;
    assert_matches!(result, Err(ServiceError::Validation(_)));
}

#[tokio::test]
async fn test_preset_with_recorded_sets_cannot_be_deleted() {
    let app = TestApp::new();
    let coach = coach();
    let (athlete, _) = app.athlete().await;
    let session = app.assigned_session(&coach, &athlete, &[2]).await;
    app.sessions.start_session(&athlete, session.id).await.unwrap();

    let PlanTree::PresetGroup(tree) = app
        .plans
        .get_plan_tree(&coach, PlanNodeKind::PresetGroup, session.preset_group_id)
        .await
        .unwrap()
    else {
        panic!("expected a preset group tree");
    };
    let preset_id = tree.presets[0].preset.id;

    let result = app.plans.delete_plan_node(&coach, PlanNodeKind::Preset, preset_id).await;
    assert_matches!(result, Err(ServiceError::Validation(_)));
    assert!(app.store.get_preset(preset_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_athlete_sees_only_groups_they_hold_sessions_for() {
    let app = TestApp::new();
    let coach = coach();
    let (holder, _) = app.athlete().await;
    let (outsider, _) = app.athlete().await;
    let session = app.assigned_session(&coach, &holder, &[1]).await;

    let tree = app
        .plans
        .get_plan_tree(&holder, PlanNodeKind::PresetGroup, session.preset_group_id)
        .await;
    assert_matches!(tree, Ok(PlanTree::PresetGroup(_)));

    let hidden = app
        .plans
        .get_plan_tree(&outsider, PlanNodeKind::PresetGroup, session.preset_group_id)
        .await;
    assert_matches!(hidden, Err(ServiceError::Forbidden { .. }));
}

#[tokio::test]
async fn test_update_renames_and_revalidates() {
    let app = TestApp::new();
    let coach = coach();
    let (macro_id, _, _) = season(&app, &coach).await;

    let updated = app
        .plans
        .update_plan_node(
            &coach,
            macro_id,
            UpdatePlanNode::Macrocycle(UpdateCycle {
                name: Some("Olympic year".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
    assert_matches!(updated, PlanNode::Macrocycle(ref m) if m.name == "Olympic year");

    let inverted = app
        .plans
        .update_plan_node(
            &coach,
            macro_id,
            UpdatePlanNode::Macrocycle(UpdateCycle {
                end_date: Some(date(2023, 12, 1)),
                ..Default::default()
            }),
        )
        .await;
    assert_matches!(inverted, Err(ServiceError::Validation(_)));
}
