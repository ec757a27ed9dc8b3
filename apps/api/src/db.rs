use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

const PRACTICE_SESSIONS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS practice_sessions (
    id               UUID PRIMARY KEY,
    user_id          UUID NOT NULL,
    session_type     TEXT NOT NULL,
    questions        JSONB NOT NULL,
    answers          JSONB NOT NULL,
    scorecard        JSONB NOT NULL,
    overall_score    SMALLINT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

/// Creates a PostgreSQL pool and makes sure the hand-off table exists.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::query(PRACTICE_SESSIONS_DDL).execute(&pool).await?;

    info!("PostgreSQL pool ready; practice_sessions table present");
    Ok(pool)
}
