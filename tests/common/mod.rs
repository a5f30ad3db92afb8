// Shared fixtures for the integration tests. Everything runs against MemoryStore.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use fake::faker::lorem::en::Word;
use fake::faker::name::en::Name;
use fake::Fake;
use uuid::Uuid;

use coach_planner::auth::Principal;
use coach_planner::models::*;
use coach_planner::repository::{MemoryStore, Store};
use coach_planner::services::{
    AssignmentService, AthleteService, CatalogService, DashboardService, PlanService, SessionService,
};

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub plans: PlanService,
    pub catalog: CatalogService,
    pub athletes: AthleteService,
    pub assignments: AssignmentService,
    pub sessions: SessionService,
    pub dashboard: DashboardService,
}

/// Unique fixture name; catalog names must not collide.
pub fn unique_name() -> String {
    let word: String = Word().fake();
    format!("{} {}", word, &Uuid::new_v4().simple().to_string()[..8])
}

pub fn coach() -> Principal {
    Principal::coach(Uuid::new_v4())
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn Store> = store.clone();
        Self {
            plans: PlanService::new(shared.clone()),
            catalog: CatalogService::new(shared.clone()),
            athletes: AthleteService::new(shared.clone()),
            assignments: AssignmentService::new(shared.clone(), Timezone::utc()),
            sessions: SessionService::new(shared.clone()),
            dashboard: DashboardService::new(shared, 7),
            store,
        }
    }

    pub fn shared_store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    /// A fresh athlete principal with a profile.
    pub async fn athlete(&self) -> (Principal, Athlete) {
        let principal = Principal::athlete(Uuid::new_v4());
        let goals: String = Name().fake();
        let athlete = self
            .athletes
            .create_profile(
                &principal,
                AthleteProfileInput {
                    goals: Some(format!("train with {}", goals)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        (principal, athlete)
    }

    /// A coach-owned athlete group with `members` moved into it.
    pub async fn athlete_group(&self, coach: &Principal, members: &[&Athlete]) -> AthleteGroup {
        let group = self
            .athletes
            .create_athlete_group(coach, CreateAthleteGroup { name: unique_name() })
            .await
            .unwrap();
        for member in members {
            self.athletes
                .move_athlete(
                    coach,
                    member.id,
                    MoveAthlete {
                        group_id: Some(group.id),
                        notes: None,
                    },
                )
                .await
                .unwrap();
        }
        group
    }

    pub async fn exercise(&self, coach: &Principal) -> ExerciseView {
        let exercise_type = self
            .catalog
            .create_exercise_type(coach, CreateExerciseType { name: unique_name() })
            .await
            .unwrap();
        self.catalog
            .create_exercise(
                coach,
                CreateExercise {
                    name: unique_name(),
                    exercise_type_id: exercise_type.id,
                    unit_id: None,
                    description: None,
                    media_url: None,
                    tag_ids: vec![],
                },
            )
            .await
            .unwrap()
    }

    /// Preset group with one preset per entry of `sets`, each with that many planned sets.
    pub async fn preset_group(
        &self,
        coach: &Principal,
        mode: SessionMode,
        athlete_group_id: Option<Uuid>,
        target_date: Option<NaiveDate>,
        sets: &[i32],
    ) -> Uuid {
        let group = self
            .plans
            .create_plan_node(
                coach,
                CreatePlanNode::PresetGroup(CreatePresetGroup {
                    microcycle_id: None,
                    name: unique_name(),
                    description: None,
                    target_date,
                    week: None,
                    day: None,
                    session_mode: mode,
                    athlete_group_id,
                }),
            )
            .await
            .unwrap();

        let exercise = self.exercise(coach).await;
        for (order, count) in sets.iter().enumerate() {
            let preset = self
                .plans
                .create_plan_node(
                    coach,
                    CreatePlanNode::Preset(CreatePreset {
                        preset_group_id: group.id,
                        exercise_id: exercise.exercise.id,
                        preset_order: order as i32,
                        superset_id: None,
                        notes: None,
                    }),
                )
                .await
                .unwrap();
            for set_index in 1..=*count {
                self.plans
                    .create_plan_node(
                        coach,
                        CreatePlanNode::PresetDetail(CreatePresetDetail {
                            preset_id: preset.id,
                            set_index,
                            planned: SetMetrics {
                                reps: Some(8),
                                resistance: Some(60.0),
                                ..Default::default()
                            },
                        }),
                    )
                    .await
                    .unwrap();
            }
        }
        group.id
    }

    /// Assigns an individual-mode group to `athlete` and returns the session.
    pub async fn assigned_session(&self, coach: &Principal, athlete: &Principal, sets: &[i32]) -> TrainingSession {
        let group_id = self
            .preset_group(coach, SessionMode::Individual, None, None, sets)
            .await;
        let report = self.assignments.assign_preset_group(athlete, group_id).await.unwrap();
        self.sessions
            .get_session(athlete, report.sessions[0])
            .await
            .unwrap()
            .session
    }
}
