use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::plan_service::{check_session_target, conflict_as_validation};
use super::plan_tree::{PlanRows, TreeBuilder};
use crate::auth::{policy, Principal};
use crate::errors::{ServiceError, ServiceResult};
use crate::models::{
    Exercise, GeneratedPresetGroup, GeneratorExercise, GeneratorPrompt, PlanGenerationRequest, Preset,
    PresetDetail, PresetGroup, PresetGroupNode,
};
use crate::repository::Store;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("plan generator is not configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generator responded with {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unreadable generator response: {0}")]
    Parse(String),
}

/// External text/JSON generator producing a preset group skeleton.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(&self, prompt: &GeneratorPrompt) -> Result<GeneratedPresetGroup, GeneratorError>;
}

/// Generator reached over HTTP: POSTs the prompt as JSON, expects the skeleton back.
pub struct HttpPlanGenerator {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpPlanGenerator {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> Result<Self, GeneratorError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl PlanGenerator for HttpPlanGenerator {
    async fn generate(&self, prompt: &GeneratorPrompt) -> Result<GeneratedPresetGroup, GeneratorError> {
        let mut request = self.http.post(&self.endpoint).json(prompt);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<GeneratedPresetGroup>()
            .await
            .map_err(|e| GeneratorError::Parse(e.to_string()))
    }
}

/// AI-assisted preset groups. Output is validated like hand-authored nodes
/// and committed in one store call, or not at all.
#[derive(Clone)]
pub struct PlanGenerationService {
    store: Arc<dyn Store>,
    generator: Option<Arc<dyn PlanGenerator>>,
}

impl PlanGenerationService {
    pub fn new(store: Arc<dyn Store>, generator: Option<Arc<dyn PlanGenerator>>) -> Self {
        Self { store, generator }
    }

    #[instrument(skip(self, request), fields(user_id = %principal.user_id))]
    pub async fn generate_preset_group(
        &self,
        principal: &Principal,
        request: PlanGenerationRequest,
    ) -> ServiceResult<PresetGroupNode> {
        if !principal.is_coach() {
            return Err(ServiceError::forbidden("plan_node", principal.user_id));
        }
        request.validate()?;

        if let Some(microcycle_id) = request.microcycle_id {
            let microcycle = self
                .store
                .get_microcycle(microcycle_id)
                .await?
                .ok_or_else(|| ServiceError::validation(format!("microcycle {} does not exist", microcycle_id)))?;
            if !policy::can_manage_plan(principal, microcycle.owner_id) {
                return Err(ServiceError::forbidden("microcycle", microcycle_id));
            }
        }
        check_session_target(
            self.store.as_ref(),
            principal,
            request.session_mode,
            request.athlete_group_id,
        )
        .await?;

        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| ServiceError::Generator(GeneratorError::NotConfigured.to_string()))?;

        let exercises = self.allowed_exercises(&request.exercise_ids).await?;
        let prompt = GeneratorPrompt {
            prompt: request.prompt.clone(),
            target_date: request.target_date,
            exercises: self.describe(&exercises).await?,
        };

        let generated = generator.generate(&prompt).await.map_err(|err| {
            warn!(error = %err, "plan generator failed");
            ServiceError::Generator(err.to_string())
        })?;

        let allowed: HashSet<Uuid> = exercises.iter().map(|e| e.id).collect();
        let (group, presets, details) = build_preset_group(principal, &request, generated, &allowed)?;

        self.store
            .insert_preset_group_tree(&group, &presets, &details)
            .await
            .map_err(conflict_as_validation)?;

        info!(
            preset_group_id = %group.id,
            presets = presets.len(),
            sets = details.len(),
            "generated preset group committed"
        );

        let rows = PlanRows {
            presets,
            details,
            exercises,
            ..Default::default()
        };
        Ok(TreeBuilder::new(rows).preset_group(group))
    }

    async fn allowed_exercises(&self, requested: &[Uuid]) -> ServiceResult<Vec<Exercise>> {
        if requested.is_empty() {
            return Ok(self.store.list_exercises().await?);
        }

        let unique: Vec<Uuid> = requested.iter().copied().collect::<HashSet<_>>().into_iter().collect();
        let found = self.store.list_exercises_by_ids(&unique).await?;
        if found.len() != unique.len() {
            return Err(ServiceError::validation("exercise_ids references unknown exercises"));
        }
        Ok(found)
    }

    async fn describe(&self, exercises: &[Exercise]) -> ServiceResult<Vec<GeneratorExercise>> {
        let type_ids: Vec<Uuid> = exercises
            .iter()
            .filter_map(|e| e.exercise_type_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let type_names: HashMap<Uuid, String> = self
            .store
            .list_exercise_types_by_ids(&type_ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();

        exercises
            .iter()
            .map(|e| {
                let exercise_type = e
                    .exercise_type_id
                    .and_then(|id| type_names.get(&id).cloned())
                    .ok_or_else(|| ServiceError::DataIntegrity(format!("exercise {} has no exercise type", e.id)))?;
                Ok(GeneratorExercise {
                    id: e.id,
                    name: e.name.clone(),
                    exercise_type,
                })
            })
            .collect()
    }
}

/// Turns the generator's skeleton into rows, applying the authoring rules.
pub fn build_preset_group(
    principal: &Principal,
    request: &PlanGenerationRequest,
    generated: GeneratedPresetGroup,
    allowed_exercises: &HashSet<Uuid>,
) -> ServiceResult<(PresetGroup, Vec<Preset>, Vec<PresetDetail>)> {
    let name = generated.name.trim().to_string();
    if name.is_empty() || name.chars().count() > 200 {
        return Err(ServiceError::validation("generated name must be 1 to 200 characters"));
    }
    if generated.presets.is_empty() {
        return Err(ServiceError::validation("generated preset group has no presets"));
    }

    let now = Utc::now();
    let group = PresetGroup {
        id: Uuid::new_v4(),
        owner_id: principal.user_id,
        microcycle_id: request.microcycle_id,
        name,
        description: generated.description,
        target_date: request.target_date,
        week: None,
        day: request.day,
        session_mode: request.session_mode,
        athlete_group_id: request.athlete_group_id,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };

    let mut presets = Vec::with_capacity(generated.presets.len());
    let mut details = Vec::new();
    for (position, generated_preset) in generated.presets.into_iter().enumerate() {
        if !allowed_exercises.contains(&generated_preset.exercise_id) {
            return Err(ServiceError::validation(format!(
                "generated preset uses unknown exercise {}",
                generated_preset.exercise_id
            )));
        }
        if let Some(superset) = &generated_preset.superset_id {
            if superset.is_empty() || superset.chars().count() > 50 {
                return Err(ServiceError::validation("generated superset_id must be 1 to 50 characters"));
            }
        }

        let preset = Preset {
            id: Uuid::new_v4(),
            preset_group_id: group.id,
            exercise_id: generated_preset.exercise_id,
            preset_order: position as i32,
            superset_id: generated_preset.superset_id,
            notes: generated_preset.notes,
        };

        for (index, planned) in generated_preset.sets.into_iter().enumerate() {
            planned.validate()?;
            details.push(PresetDetail {
                id: Uuid::new_v4(),
                preset_id: preset.id,
                set_index: index as i32 + 1,
                planned,
            });
        }
        presets.push(preset);
    }

    Ok((group, presets, details))
}
