use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::plan_service::conflict_as_validation;
use crate::auth::Principal;
use crate::errors::{ServiceError, ServiceResult};
use crate::models::{
    CreateExercise, CreateExerciseType, CreateTag, CreateUnit, Exercise, ExerciseQuery, ExerciseType,
    ExerciseView, Tag, Unit,
};
use crate::repository::Store;

/// Exercise reference data. Every exercise read resolves its type or fails.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn require_coach(principal: &Principal) -> ServiceResult<()> {
        if principal.is_coach() {
            Ok(())
        } else {
            Err(ServiceError::forbidden("catalog", principal.user_id))
        }
    }

    #[instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn create_exercise_type(
        &self,
        principal: &Principal,
        input: CreateExerciseType,
    ) -> ServiceResult<ExerciseType> {
        Self::require_coach(principal)?;
        input.validate()?;

        let exercise_type = ExerciseType {
            id: Uuid::new_v4(),
            name: input.name,
            created_at: Utc::now(),
        };
        self.store
            .insert_exercise_type(&exercise_type)
            .await
            .map_err(conflict_as_validation)?;
        Ok(exercise_type)
    }

    #[instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn create_unit(&self, principal: &Principal, input: CreateUnit) -> ServiceResult<Unit> {
        Self::require_coach(principal)?;
        input.validate()?;

        let unit = Unit {
            id: Uuid::new_v4(),
            name: input.name,
            abbreviation: input.abbreviation,
            created_at: Utc::now(),
        };
        self.store.insert_unit(&unit).await.map_err(conflict_as_validation)?;
        Ok(unit)
    }

    #[instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn create_tag(&self, principal: &Principal, input: CreateTag) -> ServiceResult<Tag> {
        Self::require_coach(principal)?;
        input.validate()?;

        let tag = Tag {
            id: Uuid::new_v4(),
            name: input.name,
            created_at: Utc::now(),
        };
        self.store.insert_tag(&tag).await.map_err(conflict_as_validation)?;
        Ok(tag)
    }

    #[instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn create_exercise(&self, principal: &Principal, input: CreateExercise) -> ServiceResult<ExerciseView> {
        Self::require_coach(principal)?;
        input.validate()?;

        let types = self
            .store
            .list_exercise_types_by_ids(&[input.exercise_type_id])
            .await?;
        if types.is_empty() {
            return Err(ServiceError::validation(format!(
                "exercise type {} does not exist",
                input.exercise_type_id
            )));
        }
        if let Some(unit_id) = input.unit_id {
            if self.store.list_units_by_ids(&[unit_id]).await?.is_empty() {
                return Err(ServiceError::validation(format!("unit {} does not exist", unit_id)));
            }
        }

        let tag_ids: Vec<Uuid> = input
            .tag_ids
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let known_tags = self.store.list_tags_by_ids(&tag_ids).await?;
        if known_tags.len() != tag_ids.len() {
            let known: HashSet<Uuid> = known_tags.iter().map(|t| t.id).collect();
            let missing: Vec<String> = tag_ids
                .iter()
                .filter(|id| !known.contains(id))
                .map(|id| id.to_string())
                .collect();
            return Err(ServiceError::validation(format!(
                "unknown tag ids: {}",
                missing.join(", ")
            )));
        }

        let exercise = Exercise {
            id: Uuid::new_v4(),
            name: input.name,
            exercise_type_id: Some(input.exercise_type_id),
            unit_id: input.unit_id,
            description: input.description,
            media_url: input.media_url,
            created_by: principal.user_id,
            created_at: Utc::now(),
        };
        self.store
            .insert_exercise(&exercise, &tag_ids)
            .await
            .map_err(conflict_as_validation)?;

        info!(exercise_id = %exercise.id, "exercise created");
        let mut views = self.resolve(vec![exercise]).await?;
        views
            .pop()
            .ok_or_else(|| ServiceError::DataIntegrity("created exercise did not resolve".to_string()))
    }

    #[instrument(skip(self))]
    pub async fn get_exercise(&self, id: Uuid) -> ServiceResult<ExerciseView> {
        let exercise = self
            .store
            .get_exercise(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("exercise", id))?;
        let mut views = self.resolve(vec![exercise]).await?;
        views
            .pop()
            .ok_or_else(|| ServiceError::not_found("exercise", id))
    }

    #[instrument(skip(self))]
    pub async fn list_exercises(&self, query: ExerciseQuery) -> ServiceResult<Vec<ExerciseView>> {
        let exercises = self.store.list_exercises().await?;
        let views = self.resolve(exercises).await?;

        Ok(views
            .into_iter()
            .filter(|v| query.exercise_type_id.map_or(true, |t| v.exercise_type.id == t))
            .filter(|v| query.tag_id.map_or(true, |t| v.tags.iter().any(|tag| tag.id == t)))
            .collect())
    }

    /// Joins exercises with their type, unit and tags using one batch read each.
    async fn resolve(&self, exercises: Vec<Exercise>) -> ServiceResult<Vec<ExerciseView>> {
        if exercises.is_empty() {
            return Ok(Vec::new());
        }

        let type_ids: Vec<Uuid> = exercises
            .iter()
            .filter_map(|e| e.exercise_type_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let unit_ids: Vec<Uuid> = exercises
            .iter()
            .filter_map(|e| e.unit_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let exercise_ids: Vec<Uuid> = exercises.iter().map(|e| e.id).collect();

        let types: HashMap<Uuid, ExerciseType> = self
            .store
            .list_exercise_types_by_ids(&type_ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();
        let units: HashMap<Uuid, Unit> = self
            .store
            .list_units_by_ids(&unit_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let links = self.store.list_exercise_tags(&exercise_ids).await?;
        let tag_ids: Vec<Uuid> = links
            .iter()
            .map(|l| l.tag_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let tags: HashMap<Uuid, Tag> = self
            .store
            .list_tags_by_ids(&tag_ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();
        let mut tags_by_exercise: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for link in links {
            if let Some(tag) = tags.get(&link.tag_id) {
                tags_by_exercise.entry(link.exercise_id).or_default().push(tag.clone());
            }
        }

        exercises
            .into_iter()
            .map(|exercise| {
                let exercise_type = exercise
                    .exercise_type_id
                    .and_then(|id| types.get(&id).cloned())
                    .ok_or_else(|| {
                        error!(exercise_id = %exercise.id, "exercise has no resolvable type");
                        ServiceError::DataIntegrity(format!(
                            "exercise {} has no exercise type",
                            exercise.id
                        ))
                    })?;
                let unit = exercise.unit_id.and_then(|id| units.get(&id).cloned());
                let mut tags = tags_by_exercise.remove(&exercise.id).unwrap_or_default();
                tags.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(ExerciseView {
                    exercise,
                    exercise_type,
                    unit,
                    tags,
                })
            })
            .collect()
    }
}
