//! PostgreSQL progress store.
//!
//! All SQL is runtime-checked (`sqlx::query`, not `sqlx::query!`) so the
//! crate builds without a database. The schema lives in `migrations/` and is
//! applied by [`PgProgressStore::migrate`].

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use survey_core::config::DatabaseConfig;
use survey_core::types::{Progress, RespondentId, SurveyId, SurveyStatus};
use survey_core::{SurveyError, SurveyResult};

use crate::traits::ProgressStore;

/// SQLSTATE raised on a foreign key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Postgres-backed progress store.
#[derive(Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool. Every session gets a server-side
    /// `statement_timeout` so no query can block indefinitely.
    pub async fn connect(config: &DatabaseConfig) -> SurveyResult<Self> {
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(store_error)?
            .options([("statement_timeout", config.statement_timeout_ms.to_string())]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
            .connect_with(options)
            .await
            .map_err(store_error)?;

        info!(
            max_connections = config.max_connections,
            statement_timeout_ms = config.statement_timeout_ms,
            "Connected to PostgreSQL"
        );
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> SurveyResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SurveyError::Store(format!("migration failed: {e}")))?;
        info!("Database schema up to date");
        Ok(())
    }
}

fn store_error(err: sqlx::Error) -> SurveyError {
    SurveyError::Store(err.to_string())
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn health_check(&self) -> SurveyResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn upsert_respondent(&self, address: &str) -> SurveyResult<RespondentId> {
        // DO UPDATE (not DO NOTHING) so RETURNING yields the existing row.
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO respondents (id, address)
            VALUES ($1, $2)
            ON CONFLICT (address) DO UPDATE SET address = EXCLUDED.address
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(address)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(id)
    }

    async fn start_survey(&self, respondent_id: RespondentId) -> SurveyResult<SurveyId> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO survey_instances (id, respondent_id, status)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(respondent_id)
        .bind(SurveyStatus::InProgress.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        debug!(survey_id = %id, respondent_id = %respondent_id, "Survey started");
        Ok(id)
    }

    async fn record_answer(
        &self,
        survey_id: SurveyId,
        question_number: u32,
        answer_id: &str,
        answer_label: &str,
    ) -> SurveyResult<()> {
        let question_number = i32::try_from(question_number).map_err(|_| {
            SurveyError::Store(format!("question number {question_number} out of range"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO answers (survey_instance_id, question_number, answer_id, answer_label)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(survey_id)
        .bind(question_number)
        .bind(answer_id)
        .bind(answer_label)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let missing_survey = e
                .as_database_error()
                .and_then(|db| db.code())
                .is_some_and(|code| code == FOREIGN_KEY_VIOLATION);
            if missing_survey {
                SurveyError::SurveyNotFound(survey_id)
            } else {
                store_error(e)
            }
        })?;
        Ok(())
    }

    async fn current_progress(&self, address: &str) -> SurveyResult<Option<Progress>> {
        let row = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT s.id, COUNT(a.id)
            FROM survey_instances s
            JOIN respondents r ON r.id = s.respondent_id
            LEFT JOIN answers a ON a.survey_instance_id = s.id
            WHERE r.address = $1 AND s.status = $2
            GROUP BY s.id, s.started_at
            ORDER BY s.started_at DESC
            LIMIT 1
            "#,
        )
        .bind(address)
        .bind(SurveyStatus::InProgress.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(|(survey_id, count)| {
            let answered_count = u32::try_from(count).map_err(|_| {
                SurveyError::Store(format!("answer count {count} out of range"))
            })?;
            Ok(Progress {
                survey_id,
                answered_count,
            })
        })
        .transpose()
    }

    async fn finish_survey(&self, survey_id: SurveyId) -> SurveyResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE survey_instances
            SET status = $2, ended_at = NOW()
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(survey_id)
        .bind(SurveyStatus::Finished.as_str())
        .bind(SurveyStatus::InProgress.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM survey_instances WHERE id = $1)",
            )
            .bind(survey_id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
            if !exists {
                return Err(SurveyError::SurveyNotFound(survey_id));
            }
            debug!(survey_id = %survey_id, "Survey already finished");
        }
        Ok(())
    }
}
