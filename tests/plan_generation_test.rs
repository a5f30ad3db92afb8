mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use mockall::mock;
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coach_planner::errors::ServiceError;
use coach_planner::models::*;
use coach_planner::repository::PlanRepository;
use coach_planner::services::{GeneratorError, HttpPlanGenerator, PlanGenerationService, PlanGenerator};
use common::{coach, date, TestApp};

mock! {
    pub Generator {}

    #[async_trait]
    impl PlanGenerator for Generator {
        async fn generate(&self, prompt: &GeneratorPrompt) -> Result<GeneratedPresetGroup, GeneratorError>;
    }
}

fn request(exercise_ids: Vec<Uuid>) -> PlanGenerationRequest {
    PlanGenerationRequest {
        prompt: "Lower body strength, 45 minutes".into(),
        microcycle_id: None,
        target_date: Some(date(2024, 10, 7)),
        day: Some(1),
        session_mode: SessionMode::Individual,
        athlete_group_id: None,
        exercise_ids,
    }
}

fn skeleton(exercise_id: Uuid, sets: usize) -> GeneratedPresetGroup {
    GeneratedPresetGroup {
        name: "Generated lower body".into(),
        description: Some("Squat focus".into()),
        presets: vec![GeneratedPreset {
            exercise_id,
            superset_id: None,
            notes: None,
            sets: vec![
                SetMetrics {
                    reps: Some(5),
                    resistance: Some(100.0),
                    ..Default::default()
                };
                sets
            ],
        }],
    }
}

fn service(app: &TestApp, generator: Option<Arc<dyn PlanGenerator>>) -> PlanGenerationService {
    PlanGenerationService::new(app.shared_store(), generator)
}

#[tokio::test]
async fn test_generated_group_is_committed_as_a_whole() {
    let app = TestApp::new();
    let coach = coach();
    let exercise = app.exercise(&coach).await;
    let exercise_id = exercise.exercise.id;

    let mut generator = MockGenerator::new();
    generator
        .expect_generate()
        .withf(move |prompt| prompt.exercises.len() == 1 && prompt.exercises[0].id == exercise_id)
        .times(1)
        .returning(move |_| Ok(skeleton(exercise_id, 3)));

    let node = service(&app, Some(Arc::new(generator)))
        .generate_preset_group(&coach, request(vec![exercise_id]))
        .await
        .unwrap();

    assert_eq!(node.group.owner_id, coach.user_id);
    assert_eq!(node.group.target_date, Some(date(2024, 10, 7)));
    assert_eq!(node.presets.len(), 1);
    let set_indexes: Vec<i32> = node.presets[0].details.iter().map(|d| d.set_index).collect();
    assert_eq!(set_indexes, vec![1, 2, 3]);

    let stored = app.plans.list_preset_groups(&coach).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, node.group.id);
}

#[tokio::test]
async fn test_skeleton_with_unknown_exercise_commits_nothing() {
    let app = TestApp::new();
    let coach = coach();
    let exercise = app.exercise(&coach).await;

    let mut generator = MockGenerator::new();
    generator
        .expect_generate()
        .returning(|_| Ok(skeleton(Uuid::new_v4(), 2)));

    let result = service(&app, Some(Arc::new(generator)))
        .generate_preset_group(&coach, request(vec![exercise.exercise.id]))
        .await;

    assert_matches!(result, Err(ServiceError::Validation(_)));
    assert!(app.store.list_preset_groups_by_owner(coach.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_skeleton_with_negative_metrics_is_rejected() {
    let app = TestApp::new();
    let coach = coach();
    let exercise_id = app.exercise(&coach).await.exercise.id;

    let mut generator = MockGenerator::new();
    generator.expect_generate().returning(move |_| {
        let mut generated = skeleton(exercise_id, 1);
        generated.presets[0].sets[0].reps = Some(-3);
        Ok(generated)
    });

    let result = service(&app, Some(Arc::new(generator)))
        .generate_preset_group(&coach, request(vec![]))
        .await;
    assert_matches!(result, Err(ServiceError::Validation(_)));
}

#[tokio::test]
async fn test_generator_failure_maps_to_generator_error() {
    let app = TestApp::new();
    let coach = coach();
    app.exercise(&coach).await;

    let mut generator = MockGenerator::new();
    generator.expect_generate().returning(|_| {
        Err(GeneratorError::Api {
            status: 503,
            body: "busy".into(),
        })
    });

    let result = service(&app, Some(Arc::new(generator)))
        .generate_preset_group(&coach, request(vec![]))
        .await;
    assert_matches!(result, Err(ServiceError::Generator(_)));
    assert!(app.store.list_preset_groups_by_owner(coach.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_generator_and_wrong_role() {
    let app = TestApp::new();
    let coach = coach();

    let result = service(&app, None).generate_preset_group(&coach, request(vec![])).await;
    assert_matches!(result, Err(ServiceError::Generator(_)));

    let (athlete, _) = app.athlete().await;
    let mut generator = MockGenerator::new();
    generator.expect_generate().never();
    let result = service(&app, Some(Arc::new(generator)))
        .generate_preset_group(&athlete, request(vec![]))
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden { .. }));
}

#[tokio::test]
async fn test_http_generator_posts_prompt_and_parses_skeleton() {
    let server = MockServer::start().await;
    let exercise_id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(header("authorization", "Bearer secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Sprint day",
            "description": null,
            "presets": [{
                "exercise_id": exercise_id,
                "superset_id": "A",
                "notes": null,
                "sets": [{ "distance": 60.0 }, { "distance": 60.0 }]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = HttpPlanGenerator::new(
        format!("{}/generate", server.uri()),
        Some("secret-key".into()),
        Duration::from_secs(5),
    )
    .unwrap();
    let prompt = GeneratorPrompt {
        prompt: "Acceleration work".into(),
        target_date: None,
        exercises: vec![GeneratorExercise {
            id: exercise_id,
            name: "Block start".into(),
            exercise_type: "sprint".into(),
        }],
    };

    let generated = generator.generate(&prompt).await.unwrap();
    assert_eq!(generated.name, "Sprint day");
    assert_eq!(generated.presets[0].superset_id.as_deref(), Some("A"));
    assert_eq!(generated.presets[0].sets.len(), 2);
    assert_eq!(generated.presets[0].sets[0].distance, Some(60.0));
}

#[tokio::test]
async fn test_http_generator_reports_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
        .mount(&server)
        .await;

    let generator = HttpPlanGenerator::new(server.uri(), None, Duration::from_secs(5)).unwrap();
    let prompt = GeneratorPrompt {
        prompt: "anything".into(),
        target_date: None,
        exercises: vec![],
    };

    let result = generator.generate(&prompt).await;
    assert_matches!(result, Err(GeneratorError::Api { status: 500, .. }));
}

#[tokio::test]
async fn test_http_generator_rejects_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let generator = HttpPlanGenerator::new(server.uri(), None, Duration::from_secs(5)).unwrap();
    let prompt = GeneratorPrompt {
        prompt: "anything".into(),
        target_date: None,
        exercises: vec![],
    };

    assert_matches!(generator.generate(&prompt).await, Err(GeneratorError::Parse(_)));
}
