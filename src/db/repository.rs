//! PostgreSQL repositories for arguments, appeals and training data

use async_trait::async_trait;
use sqlx::PgPool;

use super::models::{AppealRow, ArgumentRow, TrainingSampleRow};
use super::store::{AppealStore, ArgumentStore, TrainingSampleStore};
use super::DbError;
use crate::model::{
    Annotation, Appeal, AppealStatus, Argument, NewAppeal, NewArgument, NewTrainingSample,
    TrainingSample,
};

const ARGUMENT_COLUMNS: &str = "id, topic_id, author_id, content, active_yn, fallacy_checked_yn, \
     fallacy_has_fallacy, fallacy_type, fallacy_confidence, fallacy_explanation, created_at, updated_at";

/// Repository for the fallacy columns of `debate_argument`
#[derive(Clone)]
pub struct ArgumentRepository {
    pool: PgPool,
}

impl ArgumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArgumentStore for ArgumentRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Argument>, DbError> {
        let row: Option<ArgumentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM debate_argument WHERE id = $1",
            ARGUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ArgumentRow::into_domain))
    }

    async fn insert(&self, argument: NewArgument) -> Result<Argument, DbError> {
        let mut tx = self.pool.begin().await?;

        let row: ArgumentRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO debate_argument (topic_id, author_id, content)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            ARGUMENT_COLUMNS
        ))
        .bind(argument.topic_id)
        .bind(argument.author_id)
        .bind(&argument.content)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(argument_id = row.id, "Inserted debate argument");
        Ok(row.into_domain())
    }

    async fn apply_annotation(&self, id: i64, annotation: &Annotation) -> Result<bool, DbError> {
        // Fresh transaction from the pool; never the creator's connection
        let mut tx = self.pool.begin().await?;

        let locked: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM debate_argument WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE debate_argument SET
                fallacy_checked_yn = TRUE,
                fallacy_has_fallacy = $2,
                fallacy_type = $3,
                fallacy_confidence = $4,
                fallacy_explanation = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(annotation.has_fallacy)
        .bind(&annotation.fallacy_type)
        .bind(annotation.confidence)
        .bind(&annotation.explanation)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

/// Repository for `debate_argument_fallacy_appeal`
#[derive(Clone)]
pub struct AppealRepository {
    pool: PgPool,
}

impl AppealRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn rows_into_domain(rows: Vec<AppealRow>) -> Result<Vec<Appeal>, DbError> {
        rows.into_iter()
            .map(|row| row.into_domain().map_err(DbError::Serialization))
            .collect()
    }
}

#[async_trait]
impl AppealStore for AppealRepository {
    async fn insert(&self, appeal: NewAppeal) -> Result<Appeal, DbError> {
        let snapshot = serde_json::to_value(&appeal.snapshot)
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        let row: AppealRow = sqlx::query_as(
            r#"
            INSERT INTO debate_argument_fallacy_appeal (
                argument_id, appealer_id, appeal_reason, ai_original_judgment, status
            ) VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(appeal.argument_id)
        .bind(appeal.appealer_id)
        .bind(&appeal.reason)
        .bind(&snapshot)
        .bind(AppealStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.into_domain().map_err(DbError::Serialization)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Appeal>, DbError> {
        let row: Option<AppealRow> =
            sqlx::query_as("SELECT * FROM debate_argument_fallacy_appeal WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.into_domain().map_err(DbError::Serialization))
            .transpose()
    }

    async fn find_by_argument(&self, argument_id: i64) -> Result<Vec<Appeal>, DbError> {
        let rows: Vec<AppealRow> = sqlx::query_as(
            "SELECT * FROM debate_argument_fallacy_appeal WHERE argument_id = $1 ORDER BY created_at, id",
        )
        .bind(argument_id)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_into_domain(rows)
    }

    async fn find_by_status(&self, status: AppealStatus) -> Result<Vec<Appeal>, DbError> {
        let rows: Vec<AppealRow> = sqlx::query_as(
            "SELECT * FROM debate_argument_fallacy_appeal WHERE status = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        Self::rows_into_domain(rows)
    }

    async fn count_by_argument(&self, argument_id: i64) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM debate_argument_fallacy_appeal WHERE argument_id = $1",
        )
        .bind(argument_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn count_by_argument_and_status(
        &self,
        argument_id: i64,
        status: AppealStatus,
    ) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM debate_argument_fallacy_appeal WHERE argument_id = $1 AND status = $2",
        )
        .bind(argument_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn transition(
        &self,
        id: i64,
        from: AppealStatus,
        to: AppealStatus,
    ) -> Result<Option<Appeal>, DbError> {
        // Compare-and-set on status: the losing side of a race updates zero rows
        let row: Option<AppealRow> = sqlx::query_as(
            r#"
            UPDATE debate_argument_fallacy_appeal
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_domain().map_err(DbError::Serialization))
            .transpose()
    }

    async fn arguments_with_pending_at_least(&self, threshold: i64) -> Result<Vec<i64>, DbError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT argument_id FROM debate_argument_fallacy_appeal
            WHERE status = 'PENDING'
            GROUP BY argument_id
            HAVING COUNT(id) >= $1
            ORDER BY COUNT(id) DESC, argument_id
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

/// Repository for `debate_argument_fallacy_training_data`
#[derive(Clone)]
pub struct TrainingDataRepository {
    pool: PgPool,
}

impl TrainingDataRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn rows_into_domain(rows: Vec<TrainingSampleRow>) -> Result<Vec<TrainingSample>, DbError> {
        rows.into_iter()
            .map(|row| row.into_domain().map_err(DbError::Serialization))
            .collect()
    }
}

#[async_trait]
impl TrainingSampleStore for TrainingDataRepository {
    async fn insert_once_per_argument(
        &self,
        sample: NewTrainingSample,
    ) -> Result<Option<TrainingSample>, DbError> {
        // uq_training_argument turns a concurrent duplicate into a no-op
        let row: Option<TrainingSampleRow> = sqlx::query_as(
            r#"
            INSERT INTO debate_argument_fallacy_training_data (
                argument_id, text, label, source, used_for_training
            ) VALUES ($1, $2, $3, $4, FALSE)
            ON CONFLICT (argument_id) WHERE argument_id IS NOT NULL DO NOTHING
            RETURNING *
            "#,
        )
        .bind(sample.argument_id)
        .bind(&sample.text)
        .bind(&sample.label)
        .bind(sample.source.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_domain().map_err(DbError::Serialization))
            .transpose()
    }

    async fn find_by_argument(&self, argument_id: i64) -> Result<Vec<TrainingSample>, DbError> {
        let rows: Vec<TrainingSampleRow> = sqlx::query_as(
            "SELECT * FROM debate_argument_fallacy_training_data WHERE argument_id = $1",
        )
        .bind(argument_id)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_into_domain(rows)
    }

    async fn find_unused(&self) -> Result<Vec<TrainingSample>, DbError> {
        let rows: Vec<TrainingSampleRow> = sqlx::query_as(
            r#"
            SELECT * FROM debate_argument_fallacy_training_data
            WHERE used_for_training = FALSE
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Self::rows_into_domain(rows)
    }

    async fn count_unused(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM debate_argument_fallacy_training_data WHERE used_for_training = FALSE",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn mark_used(&self, ids: &[i64]) -> Result<u64, DbError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE debate_argument_fallacy_training_data
            SET used_for_training = TRUE
            WHERE id = ANY($1) AND used_for_training = FALSE
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JudgmentSnapshot, SampleSource};

    async fn test_pool() -> PgPool {
        let pool = crate::db::create_pool().await.unwrap();
        crate::db::init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL
    async fn test_transition_is_compare_and_set() {
        let pool = test_pool().await;
        let arguments = ArgumentRepository::new(pool.clone());
        let appeals = AppealRepository::new(pool);

        let argument = arguments
            .insert(NewArgument {
                topic_id: 1,
                author_id: 1,
                content: "Everyone agrees, so it must be true".to_string(),
            })
            .await
            .unwrap();

        let appeal = appeals
            .insert(NewAppeal {
                argument_id: argument.id,
                appealer_id: 1,
                reason: "not a bandwagon".to_string(),
                snapshot: JudgmentSnapshot::capture(&argument),
            })
            .await
            .unwrap();

        let first = appeals
            .transition(appeal.id, AppealStatus::Pending, AppealStatus::Approved)
            .await
            .unwrap();
        let second = appeals
            .transition(appeal.id, AppealStatus::Pending, AppealStatus::Rejected)
            .await
            .unwrap();

        assert_eq!(first.map(|a| a.status), Some(AppealStatus::Approved));
        assert!(second.is_none());
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL
    async fn test_one_training_sample_per_argument() {
        let pool = test_pool().await;
        let arguments = ArgumentRepository::new(pool.clone());
        let samples = TrainingDataRepository::new(pool);

        let argument = arguments
            .insert(NewArgument {
                topic_id: 1,
                author_id: 1,
                content: "You are too young to understand economics".to_string(),
            })
            .await
            .unwrap();

        let new_sample = || NewTrainingSample {
            argument_id: Some(argument.id),
            text: argument.content.clone(),
            label: "ad_hominem".to_string(),
            source: SampleSource::UserAppeal,
        };

        assert!(samples.insert_once_per_argument(new_sample()).await.unwrap().is_some());
        assert!(samples.insert_once_per_argument(new_sample()).await.unwrap().is_none());
        assert_eq!(samples.find_by_argument(argument.id).await.unwrap().len(), 1);
    }
}
