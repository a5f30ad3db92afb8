use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{
    AthleteRepository, BeginOutcome, CatalogRepository, PlanRepository, SessionRepository,
    StoreResult,
};
use crate::errors::StoreError;
use crate::models::{
    Athlete, AthleteGroup, AthleteGroupHistory, Exercise, ExerciseTag, ExerciseType, Macrocycle,
    Mesocycle, Microcycle, Preset, PresetDetail, PresetGroup, SessionStatus, Tag, TrainingDetail,
    TrainingDetailUpdate, TrainingSession, Unit, UpsertOutcome, UpsertedSession,
};

const MACROCYCLE_COLUMNS: &str = "id, owner_id, name, start_date, end_date, created_at, updated_at";
const MESOCYCLE_COLUMNS: &str =
    "id, macrocycle_id, owner_id, name, start_date, end_date, ordinal, created_at, updated_at";
const MICROCYCLE_COLUMNS: &str =
    "id, mesocycle_id, owner_id, name, start_date, end_date, week_index, created_at, updated_at";
const PRESET_GROUP_COLUMNS: &str = "id, owner_id, microcycle_id, name, description, target_date, week, day, session_mode, athlete_group_id, is_deleted, created_at, updated_at";
const PRESET_COLUMNS: &str = "id, preset_group_id, exercise_id, preset_order, superset_id, notes";
const PRESET_DETAIL_COLUMNS: &str =
    "id, preset_id, set_index, reps, resistance, distance, duration_seconds, tempo, power, velocity";
const EXERCISE_COLUMNS: &str =
    "id, name, exercise_type_id, unit_id, description, media_url, created_by, created_at";
const ATHLETE_COLUMNS: &str = "id, user_id, height_cm, weight_kg, goals, experience, events, current_group_id, created_at, updated_at";
const HISTORY_COLUMNS: &str = "id, athlete_id, group_id, changed_at, author_id, notes";
const SESSION_COLUMNS: &str = "id, athlete_id, athlete_group_id, preset_group_id, scheduled_at, status, notes, created_at, updated_at";
const DETAIL_COLUMNS: &str = "d.id, d.training_session_id, d.preset_id, d.set_index, d.reps, d.resistance, d.distance, d.duration_seconds, d.tempo, d.power, d.velocity, d.completed, d.updated_at";

#[derive(FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    session: TrainingSession,
    inserted: bool,
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn status_strings(statuses: &[SessionStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl PlanRepository for PgStore {
    async fn insert_macrocycle(&self, m: &Macrocycle) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO macrocycles (id, owner_id, name, start_date, end_date, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(m.id)
        .bind(m.owner_id)
        .bind(&m.name)
        .bind(m.start_date)
        .bind(m.end_date)
        .bind(m.created_at)
        .bind(m.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn get_macrocycle(&self, id: Uuid) -> StoreResult<Option<Macrocycle>> {
        let row = sqlx::query_as::<_, Macrocycle>(&format!(
            "SELECT {} FROM macrocycles WHERE id = $1",
            MACROCYCLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn update_macrocycle(&self, m: &Macrocycle) -> StoreResult<()> {
        sqlx::query(
            "UPDATE macrocycles SET name = $2, start_date = $3, end_date = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(m.id)
        .bind(&m.name)
        .bind(m.start_date)
        .bind(m.end_date)
        .bind(m.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn delete_macrocycle(&self, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        sqlx::query(
            r#"
            UPDATE preset_groups
            SET is_deleted = TRUE, microcycle_id = NULL, updated_at = NOW()
            WHERE microcycle_id IN (
                SELECT mi.id FROM microcycles mi
                JOIN mesocycles me ON me.id = mi.mesocycle_id
                WHERE me.macrocycle_id = $1
            )
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        // mesocycles and microcycles go with ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM macrocycles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_mesocycle(&self, m: &Mesocycle) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO mesocycles (id, macrocycle_id, owner_id, name, start_date, end_date, ordinal, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(m.id)
        .bind(m.macrocycle_id)
        .bind(m.owner_id)
        .bind(&m.name)
        .bind(m.start_date)
        .bind(m.end_date)
        .bind(m.ordinal)
        .bind(m.created_at)
        .bind(m.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn get_mesocycle(&self, id: Uuid) -> StoreResult<Option<Mesocycle>> {
        let row = sqlx::query_as::<_, Mesocycle>(&format!(
            "SELECT {} FROM mesocycles WHERE id = $1",
            MESOCYCLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn update_mesocycle(&self, m: &Mesocycle) -> StoreResult<()> {
        sqlx::query(
            "UPDATE mesocycles SET name = $2, start_date = $3, end_date = $4, ordinal = $5, updated_at = $6 WHERE id = $1",
        )
        .bind(m.id)
        .bind(&m.name)
        .bind(m.start_date)
        .bind(m.end_date)
        .bind(m.ordinal)
        .bind(m.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn delete_mesocycle(&self, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        sqlx::query(
            r#"
            UPDATE preset_groups
            SET is_deleted = TRUE, microcycle_id = NULL, updated_at = NOW()
            WHERE microcycle_id IN (SELECT id FROM microcycles WHERE mesocycle_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        let result = sqlx::query("DELETE FROM mesocycles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_mesocycles_by_macrocycles(&self, macrocycle_ids: &[Uuid]) -> StoreResult<Vec<Mesocycle>> {
        let rows = sqlx::query_as::<_, Mesocycle>(&format!(
            "SELECT {} FROM mesocycles WHERE macrocycle_id = ANY($1)",
            MESOCYCLE_COLUMNS
        ))
        .bind(macrocycle_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn insert_microcycle(&self, m: &Microcycle) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO microcycles (id, mesocycle_id, owner_id, name, start_date, end_date, week_index, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(m.id)
        .bind(m.mesocycle_id)
        .bind(m.owner_id)
        .bind(&m.name)
        .bind(m.start_date)
        .bind(m.end_date)
        .bind(m.week_index)
        .bind(m.created_at)
        .bind(m.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn get_microcycle(&self, id: Uuid) -> StoreResult<Option<Microcycle>> {
        let row = sqlx::query_as::<_, Microcycle>(&format!(
            "SELECT {} FROM microcycles WHERE id = $1",
            MICROCYCLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn update_microcycle(&self, m: &Microcycle) -> StoreResult<()> {
        sqlx::query(
            "UPDATE microcycles SET name = $2, start_date = $3, end_date = $4, week_index = $5, updated_at = $6 WHERE id = $1",
        )
        .bind(m.id)
        .bind(&m.name)
        .bind(m.start_date)
        .bind(m.end_date)
        .bind(m.week_index)
        .bind(m.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn delete_microcycle(&self, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        sqlx::query(
            "UPDATE preset_groups SET is_deleted = TRUE, microcycle_id = NULL, updated_at = NOW() WHERE microcycle_id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        let result = sqlx::query("DELETE FROM microcycles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_microcycles_by_mesocycles(&self, mesocycle_ids: &[Uuid]) -> StoreResult<Vec<Microcycle>> {
        let rows = sqlx::query_as::<_, Microcycle>(&format!(
            "SELECT {} FROM microcycles WHERE mesocycle_id = ANY($1)",
            MICROCYCLE_COLUMNS
        ))
        .bind(mesocycle_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn insert_preset_group(&self, g: &PresetGroup) -> StoreResult<()> {
        insert_preset_group_on(&self.pool, g).await
    }

    async fn get_preset_group(&self, id: Uuid) -> StoreResult<Option<PresetGroup>> {
        let row = sqlx::query_as::<_, PresetGroup>(&format!(
            "SELECT {} FROM preset_groups WHERE id = $1",
            PRESET_GROUP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn update_preset_group(&self, g: &PresetGroup) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE preset_groups
            SET name = $2, description = $3, target_date = $4, week = $5, day = $6,
                session_mode = $7, athlete_group_id = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(g.id)
        .bind(&g.name)
        .bind(&g.description)
        .bind(g.target_date)
        .bind(g.week)
        .bind(g.day)
        .bind(g.session_mode)
        .bind(g.athlete_group_id)
        .bind(g.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn soft_delete_preset_group(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE preset_groups SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_preset_groups_by_microcycles(&self, microcycle_ids: &[Uuid]) -> StoreResult<Vec<PresetGroup>> {
        let rows = sqlx::query_as::<_, PresetGroup>(&format!(
            "SELECT {} FROM preset_groups WHERE microcycle_id = ANY($1) AND NOT is_deleted",
            PRESET_GROUP_COLUMNS
        ))
        .bind(microcycle_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn list_preset_groups_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<PresetGroup>> {
        let rows = sqlx::query_as::<_, PresetGroup>(&format!(
            "SELECT {} FROM preset_groups WHERE owner_id = $1 AND NOT is_deleted ORDER BY target_date ASC NULLS FIRST, week ASC NULLS FIRST, day ASC NULLS FIRST, created_at ASC",
            PRESET_GROUP_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn insert_preset_group_tree(
        &self,
        group: &PresetGroup,
        presets: &[Preset],
        details: &[PresetDetail],
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        insert_preset_group_on(&mut *tx, group).await?;

        if !presets.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO presets (id, preset_group_id, exercise_id, preset_order, superset_id, notes) ",
            );
            builder.push_values(presets, |mut row, p| {
                row.push_bind(p.id)
                    .push_bind(p.preset_group_id)
                    .push_bind(p.exercise_id)
                    .push_bind(p.preset_order)
                    .push_bind(p.superset_id.clone())
                    .push_bind(p.notes.clone());
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;
        }

        if !details.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO preset_details ({}) ",
                PRESET_DETAIL_COLUMNS
            ));
            builder.push_values(details, |mut row, d| {
                row.push_bind(d.id)
                    .push_bind(d.preset_id)
                    .push_bind(d.set_index)
                    .push_bind(d.planned.reps)
                    .push_bind(d.planned.resistance)
                    .push_bind(d.planned.distance)
                    .push_bind(d.planned.duration_seconds)
                    .push_bind(d.planned.tempo.clone())
                    .push_bind(d.planned.power)
                    .push_bind(d.planned.velocity);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;
        }

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn insert_preset(&self, p: &Preset) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO presets (id, preset_group_id, exercise_id, preset_order, superset_id, notes) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(p.id)
        .bind(p.preset_group_id)
        .bind(p.exercise_id)
        .bind(p.preset_order)
        .bind(&p.superset_id)
        .bind(&p.notes)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn get_preset(&self, id: Uuid) -> StoreResult<Option<Preset>> {
        let row = sqlx::query_as::<_, Preset>(&format!(
            "SELECT {} FROM presets WHERE id = $1",
            PRESET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn update_preset(&self, p: &Preset) -> StoreResult<()> {
        sqlx::query("UPDATE presets SET preset_order = $2, superset_id = $3, notes = $4 WHERE id = $1")
            .bind(p.id)
            .bind(p.preset_order)
            .bind(&p.superset_id)
            .bind(&p.notes)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn delete_preset(&self, id: Uuid) -> StoreResult<bool> {
        // preset_details cascade; training_details block the delete
        let result = sqlx::query("DELETE FROM presets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_presets_by_groups(&self, group_ids: &[Uuid]) -> StoreResult<Vec<Preset>> {
        let rows = sqlx::query_as::<_, Preset>(&format!(
            "SELECT {} FROM presets WHERE preset_group_id = ANY($1)",
            PRESET_COLUMNS
        ))
        .bind(group_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn insert_preset_detail(&self, d: &PresetDetail) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO preset_details ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            PRESET_DETAIL_COLUMNS
        ))
        .bind(d.id)
        .bind(d.preset_id)
        .bind(d.set_index)
        .bind(d.planned.reps)
        .bind(d.planned.resistance)
        .bind(d.planned.distance)
        .bind(d.planned.duration_seconds)
        .bind(&d.planned.tempo)
        .bind(d.planned.power)
        .bind(d.planned.velocity)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn get_preset_detail(&self, id: Uuid) -> StoreResult<Option<PresetDetail>> {
        let row = sqlx::query_as::<_, PresetDetail>(&format!(
            "SELECT {} FROM preset_details WHERE id = $1",
            PRESET_DETAIL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn update_preset_detail(&self, d: &PresetDetail) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE preset_details
            SET reps = $2, resistance = $3, distance = $4, duration_seconds = $5,
                tempo = $6, power = $7, velocity = $8
            WHERE id = $1
            "#,
        )
        .bind(d.id)
        .bind(d.planned.reps)
        .bind(d.planned.resistance)
        .bind(d.planned.distance)
        .bind(d.planned.duration_seconds)
        .bind(&d.planned.tempo)
        .bind(d.planned.power)
        .bind(d.planned.velocity)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn delete_preset_detail(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM preset_details WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_preset_details_by_presets(&self, preset_ids: &[Uuid]) -> StoreResult<Vec<PresetDetail>> {
        let rows = sqlx::query_as::<_, PresetDetail>(&format!(
            "SELECT {} FROM preset_details WHERE preset_id = ANY($1)",
            PRESET_DETAIL_COLUMNS
        ))
        .bind(preset_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }
}

async fn insert_preset_group_on<'e, E>(executor: E, g: &PresetGroup) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(&format!(
        "INSERT INTO preset_groups ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        PRESET_GROUP_COLUMNS
    ))
    .bind(g.id)
    .bind(g.owner_id)
    .bind(g.microcycle_id)
    .bind(&g.name)
    .bind(&g.description)
    .bind(g.target_date)
    .bind(g.week)
    .bind(g.day)
    .bind(g.session_mode)
    .bind(g.athlete_group_id)
    .bind(g.is_deleted)
    .bind(g.created_at)
    .bind(g.updated_at)
    .execute(executor)
    .await
    .map_err(StoreError::from_sqlx)?;
    Ok(())
}

#[async_trait]
impl CatalogRepository for PgStore {
    async fn insert_exercise_type(&self, t: &ExerciseType) -> StoreResult<()> {
        sqlx::query("INSERT INTO exercise_types (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(t.id)
            .bind(&t.name)
            .bind(t.created_at)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn list_exercise_types_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<ExerciseType>> {
        let rows = sqlx::query_as::<_, ExerciseType>(
            "SELECT id, name, created_at FROM exercise_types WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn insert_unit(&self, u: &Unit) -> StoreResult<()> {
        sqlx::query("INSERT INTO units (id, name, abbreviation, created_at) VALUES ($1, $2, $3, $4)")
            .bind(u.id)
            .bind(&u.name)
            .bind(&u.abbreviation)
            .bind(u.created_at)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn list_units_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Unit>> {
        let rows = sqlx::query_as::<_, Unit>(
            "SELECT id, name, abbreviation, created_at FROM units WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn insert_tag(&self, t: &Tag) -> StoreResult<()> {
        sqlx::query("INSERT INTO tags (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(t.id)
            .bind(&t.name)
            .bind(t.created_at)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn list_tags_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Tag>> {
        let rows = sqlx::query_as::<_, Tag>("SELECT id, name, created_at FROM tags WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn insert_exercise(&self, e: &Exercise, tag_ids: &[Uuid]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        sqlx::query(&format!(
            "INSERT INTO exercises ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            EXERCISE_COLUMNS
        ))
        .bind(e.id)
        .bind(&e.name)
        .bind(e.exercise_type_id)
        .bind(e.unit_id)
        .bind(&e.description)
        .bind(&e.media_url)
        .bind(e.created_by)
        .bind(e.created_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        if !tag_ids.is_empty() {
            sqlx::query("INSERT INTO exercise_tags (exercise_id, tag_id) SELECT $1, UNNEST($2::uuid[])")
                .bind(e.id)
                .bind(tag_ids)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;
        }

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn get_exercise(&self, id: Uuid) -> StoreResult<Option<Exercise>> {
        let row = sqlx::query_as::<_, Exercise>(&format!(
            "SELECT {} FROM exercises WHERE id = $1",
            EXERCISE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn list_exercises(&self) -> StoreResult<Vec<Exercise>> {
        let rows = sqlx::query_as::<_, Exercise>(&format!(
            "SELECT {} FROM exercises ORDER BY name ASC",
            EXERCISE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn list_exercises_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Exercise>> {
        let rows = sqlx::query_as::<_, Exercise>(&format!(
            "SELECT {} FROM exercises WHERE id = ANY($1)",
            EXERCISE_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn list_exercise_tags(&self, exercise_ids: &[Uuid]) -> StoreResult<Vec<ExerciseTag>> {
        let rows = sqlx::query_as::<_, ExerciseTag>(
            "SELECT exercise_id, tag_id FROM exercise_tags WHERE exercise_id = ANY($1)",
        )
        .bind(exercise_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }
}

#[async_trait]
impl AthleteRepository for PgStore {
    async fn insert_athlete(&self, a: &Athlete) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO athletes ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            ATHLETE_COLUMNS
        ))
        .bind(a.id)
        .bind(a.user_id)
        .bind(a.height_cm)
        .bind(a.weight_kg)
        .bind(&a.goals)
        .bind(&a.experience)
        .bind(&a.events)
        .bind(a.current_group_id)
        .bind(a.created_at)
        .bind(a.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn get_athlete(&self, id: Uuid) -> StoreResult<Option<Athlete>> {
        let row = sqlx::query_as::<_, Athlete>(&format!(
            "SELECT {} FROM athletes WHERE id = $1",
            ATHLETE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn get_athlete_by_user(&self, user_id: Uuid) -> StoreResult<Option<Athlete>> {
        let row = sqlx::query_as::<_, Athlete>(&format!(
            "SELECT {} FROM athletes WHERE user_id = $1",
            ATHLETE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn update_athlete_profile(&self, a: &Athlete) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE athletes
            SET height_cm = $2, weight_kg = $3, goals = $4, experience = $5, events = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(a.id)
        .bind(a.height_cm)
        .bind(a.weight_kg)
        .bind(&a.goals)
        .bind(&a.experience)
        .bind(&a.events)
        .bind(a.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn list_athletes_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Athlete>> {
        let rows = sqlx::query_as::<_, Athlete>(&format!(
            "SELECT {} FROM athletes WHERE id = ANY($1)",
            ATHLETE_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn list_athletes_in_group(&self, group_id: Uuid) -> StoreResult<Vec<Athlete>> {
        let rows = sqlx::query_as::<_, Athlete>(&format!(
            "SELECT {} FROM athletes WHERE current_group_id = $1 ORDER BY created_at ASC",
            ATHLETE_COLUMNS
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn insert_athlete_group(&self, g: &AthleteGroup) -> StoreResult<()> {
        sqlx::query("INSERT INTO athlete_groups (id, owner_id, name, created_at) VALUES ($1, $2, $3, $4)")
            .bind(g.id)
            .bind(g.owner_id)
            .bind(&g.name)
            .bind(g.created_at)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn get_athlete_group(&self, id: Uuid) -> StoreResult<Option<AthleteGroup>> {
        let row = sqlx::query_as::<_, AthleteGroup>(
            "SELECT id, owner_id, name, created_at FROM athlete_groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn list_athlete_groups(&self, owner_id: Uuid) -> StoreResult<Vec<AthleteGroup>> {
        let rows = sqlx::query_as::<_, AthleteGroup>(
            "SELECT id, owner_id, name, created_at FROM athlete_groups WHERE owner_id = $1 ORDER BY name ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn move_athlete(&self, entry: &AthleteGroupHistory) -> StoreResult<Option<Athlete>> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        let athlete = sqlx::query_as::<_, Athlete>(&format!(
            "UPDATE athletes SET current_group_id = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            ATHLETE_COLUMNS
        ))
        .bind(entry.athlete_id)
        .bind(entry.group_id)
        .bind(entry.changed_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        let Some(athlete) = athlete else {
            return Ok(None);
        };

        sqlx::query(&format!(
            "INSERT INTO athlete_group_history ({}) VALUES ($1, $2, $3, $4, $5, $6)",
            HISTORY_COLUMNS
        ))
        .bind(entry.id)
        .bind(entry.athlete_id)
        .bind(entry.group_id)
        .bind(entry.changed_at)
        .bind(entry.author_id)
        .bind(&entry.notes)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(Some(athlete))
    }

    async fn list_group_history(&self, athlete_id: Uuid) -> StoreResult<Vec<AthleteGroupHistory>> {
        let rows = sqlx::query_as::<_, AthleteGroupHistory>(&format!(
            "SELECT {} FROM athlete_group_history WHERE athlete_id = $1 ORDER BY changed_at ASC",
            HISTORY_COLUMNS
        ))
        .bind(athlete_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn upsert_sessions(&self, sessions: &[TrainingSession]) -> StoreResult<Vec<UpsertedSession>> {
        if sessions.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO training_sessions ({}) ", SESSION_COLUMNS));
        builder.push_values(sessions, |mut row, s| {
            row.push_bind(s.id)
                .push_bind(s.athlete_id)
                .push_bind(s.athlete_group_id)
                .push_bind(s.preset_group_id)
                .push_bind(s.scheduled_at)
                .push_bind(s.status)
                .push_bind(s.notes.clone())
                .push_bind(s.created_at)
                .push_bind(s.updated_at);
        });
        builder.push(
            r#"
            ON CONFLICT (athlete_id, preset_group_id) DO UPDATE SET
                scheduled_at = CASE WHEN training_sessions.status IN ('pending', 'assigned')
                    THEN EXCLUDED.scheduled_at ELSE training_sessions.scheduled_at END,
                athlete_group_id = CASE WHEN training_sessions.status IN ('pending', 'assigned')
                    THEN EXCLUDED.athlete_group_id ELSE training_sessions.athlete_group_id END,
                updated_at = CASE WHEN training_sessions.status IN ('pending', 'assigned')
                    THEN EXCLUDED.updated_at ELSE training_sessions.updated_at END
            RETURNING "#,
        );
        builder.push(SESSION_COLUMNS);
        builder.push(", (xmax = 0) AS inserted");

        let rows = builder
            .build_query_as::<UpsertRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        debug!(rows = rows.len(), "upserted training sessions");

        Ok(rows
            .into_iter()
            .map(|row| {
                let outcome = if row.inserted {
                    UpsertOutcome::Inserted
                } else if SessionStatus::NOT_STARTED.contains(&row.session.status) {
                    UpsertOutcome::Updated
                } else {
                    UpsertOutcome::Preserved
                };
                UpsertedSession {
                    session: row.session,
                    outcome,
                }
            })
            .collect())
    }

    async fn get_session(&self, id: Uuid) -> StoreResult<Option<TrainingSession>> {
        let row = sqlx::query_as::<_, TrainingSession>(&format!(
            "SELECT {} FROM training_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn get_session_for(&self, athlete_id: Uuid, preset_group_id: Uuid) -> StoreResult<Option<TrainingSession>> {
        let row = sqlx::query_as::<_, TrainingSession>(&format!(
            "SELECT {} FROM training_sessions WHERE athlete_id = $1 AND preset_group_id = $2",
            SESSION_COLUMNS
        ))
        .bind(athlete_id)
        .bind(preset_group_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn list_sessions_for_athlete(&self, athlete_id: Uuid) -> StoreResult<Vec<TrainingSession>> {
        let rows = sqlx::query_as::<_, TrainingSession>(&format!(
            "SELECT {} FROM training_sessions WHERE athlete_id = $1 ORDER BY scheduled_at ASC",
            SESSION_COLUMNS
        ))
        .bind(athlete_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn list_sessions_for_preset_group(&self, preset_group_id: Uuid) -> StoreResult<Vec<TrainingSession>> {
        let rows = sqlx::query_as::<_, TrainingSession>(&format!(
            "SELECT {} FROM training_sessions WHERE preset_group_id = $1 ORDER BY scheduled_at ASC, athlete_id ASC",
            SESSION_COLUMNS
        ))
        .bind(preset_group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn begin_session(
        &self,
        session_id: Uuid,
        details: &[TrainingDetail],
        now: DateTime<Utc>,
    ) -> StoreResult<BeginOutcome> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;

        let current = sqlx::query_as::<_, TrainingSession>(&format!(
            "SELECT {} FROM training_sessions WHERE id = $1 FOR UPDATE",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        let Some(current) = current else {
            return Ok(BeginOutcome::Missing);
        };
        if !current.status.can_start() {
            return Ok(BeginOutcome::NotStartable(current));
        }

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM training_details WHERE training_session_id = $1")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;

        let details_created = existing == 0;
        if details_created && !details.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO training_details (id, training_session_id, preset_id, set_index, reps, resistance, distance, duration_seconds, tempo, power, velocity, completed, updated_at) ",
            );
            builder.push_values(details, |mut row, d| {
                row.push_bind(d.id)
                    .push_bind(d.training_session_id)
                    .push_bind(d.preset_id)
                    .push_bind(d.set_index)
                    .push_bind(d.actual.reps)
                    .push_bind(d.actual.resistance)
                    .push_bind(d.actual.distance)
                    .push_bind(d.actual.duration_seconds)
                    .push_bind(d.actual.tempo.clone())
                    .push_bind(d.actual.power)
                    .push_bind(d.actual.velocity)
                    .push_bind(d.completed)
                    .push_bind(d.updated_at);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;
        }

        let session = sqlx::query_as::<_, TrainingSession>(&format!(
            "UPDATE training_sessions SET status = 'ongoing', updated_at = $2 WHERE id = $1 RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(BeginOutcome::Started {
            session,
            details_created,
        })
    }

    async fn list_details(&self, session_id: Uuid) -> StoreResult<Vec<TrainingDetail>> {
        let rows = sqlx::query_as::<_, TrainingDetail>(&format!(
            r#"
            SELECT {} FROM training_details d
            JOIN presets p ON p.id = d.preset_id
            WHERE d.training_session_id = $1
            ORDER BY p.preset_order ASC, d.preset_id ASC, d.set_index ASC
            "#,
            DETAIL_COLUMNS
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows)
    }

    async fn apply_detail_updates(
        &self,
        session_id: Uuid,
        updates: &[TrainingDetailUpdate],
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Vec<TrainingDetail>>> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;

        let ids: Vec<Uuid> = updates.iter().map(|u| u.id).collect();
        let matched: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM training_details WHERE training_session_id = $1 AND id = ANY($2)",
        )
        .bind(session_id)
        .bind(&ids)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        if matched as usize != ids.len() {
            return Ok(None);
        }

        let mut updated = Vec::with_capacity(updates.len());
        for update in updates {
            let row = sqlx::query_as::<_, TrainingDetail>(
                r#"
                UPDATE training_details AS d
                SET reps = $3, resistance = $4, distance = $5, duration_seconds = $6,
                    tempo = $7, power = $8, velocity = $9, completed = $10, updated_at = $11
                WHERE d.id = $1 AND d.training_session_id = $2
                RETURNING d.id, d.training_session_id, d.preset_id, d.set_index, d.reps, d.resistance,
                          d.distance, d.duration_seconds, d.tempo, d.power, d.velocity, d.completed, d.updated_at
                "#,
            )
            .bind(update.id)
            .bind(session_id)
            .bind(update.actual.reps)
            .bind(update.actual.resistance)
            .bind(update.actual.distance)
            .bind(update.actual.duration_seconds)
            .bind(&update.actual.tempo)
            .bind(update.actual.power)
            .bind(update.actual.velocity)
            .bind(update.completed)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;
            updated.push(row);
        }

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(Some(updated))
    }

    async fn transition_session(
        &self,
        id: Uuid,
        from: &[SessionStatus],
        to: SessionStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<TrainingSession>> {
        let row = sqlx::query_as::<_, TrainingSession>(&format!(
            "UPDATE training_sessions SET status = $3, updated_at = $4 WHERE id = $1 AND status::text = ANY($2) RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(id)
        .bind(status_strings(from))
        .bind(to)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(row)
    }

    async fn promote_due_sessions(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE training_sessions SET status = 'assigned', updated_at = $2 WHERE status = 'pending' AND scheduled_at < $1",
        )
        .bind(cutoff)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected())
    }
}
