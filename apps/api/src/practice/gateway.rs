//! Practice Session Gateway: hand-off of finalized sessions for persistence.
//!
//! Failure here is never fatal: the scorecard is already computed and shown
//! locally, the caller only surfaces a warning.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use crate::practice::models::SessionRecord;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Gateway rejected record: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait PracticeSessionGateway: Send + Sync {
    async fn submit(&self, record: &SessionRecord) -> Result<(), PersistenceError>;
}

/// Writes finalized sessions to the `practice_sessions` table.
pub struct PgPracticeGateway {
    pool: PgPool,
}

impl PgPracticeGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PracticeSessionGateway for PgPracticeGateway {
    async fn submit(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO practice_sessions
                (id, user_id, session_type, questions, answers, scorecard,
                 overall_score, duration_minutes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.session_id)
        .bind(record.user_id)
        .bind(&record.session_type)
        .bind(Json(&record.questions))
        .bind(Json(&record.answers))
        .bind(Json(&record.scorecard))
        .bind(record.overall_score as i16)
        .bind(record.duration_minutes as i32)
        .execute(&self.pool)
        .await?;

        info!(
            "Persisted practice session {} for user {}",
            record.session_id, record.user_id
        );
        Ok(())
    }
}

/// Used when no database is configured. Records are logged and dropped.
pub struct LogOnlyGateway;

#[async_trait]
impl PracticeSessionGateway for LogOnlyGateway {
    async fn submit(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        info!(
            session_id = %record.session_id,
            user_id = %record.user_id,
            session_type = %record.session_type,
            overall_score = record.overall_score,
            duration_minutes = record.duration_minutes,
            answers = record.answers.len(),
            "Practice session finalized (not persisted: no database configured)"
        );
        Ok(())
    }
}
