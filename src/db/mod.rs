//! Database module for PostgreSQL persistence

pub mod memory;
pub mod models;
pub mod repository;
pub mod store;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::env;

pub use store::{AppealStore, ArgumentStore, TrainingSampleStore};

// Environment variable names
const ENV_POSTGRES_HOST: &str = "FALLACY_POSTGRES_HOST";
const ENV_POSTGRES_PORT: &str = "FALLACY_POSTGRES_PORT";
const ENV_POSTGRES_USER: &str = "FALLACY_POSTGRES_USER";
const ENV_POSTGRES_PASSWORD: &str = "FALLACY_POSTGRES_PASSWORD";
const ENV_POSTGRES_DB: &str = "FALLACY_POSTGRES_DB";

// Default values
const DEFAULT_POSTGRES_HOST: &str = "127.0.0.1";
const DEFAULT_POSTGRES_PORT: &str = "5432";
const DEFAULT_POSTGRES_USER: &str = "junglebook";
const DEFAULT_POSTGRES_PASSWORD: &str = "junglebook";
const DEFAULT_POSTGRES_DB: &str = "junglebook";

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Create a new database connection pool
pub async fn create_pool() -> Result<PgPool, DbError> {
    let host = env::var(ENV_POSTGRES_HOST).unwrap_or_else(|_| DEFAULT_POSTGRES_HOST.to_string());
    let port = env::var(ENV_POSTGRES_PORT).unwrap_or_else(|_| DEFAULT_POSTGRES_PORT.to_string());
    let user = env::var(ENV_POSTGRES_USER).unwrap_or_else(|_| DEFAULT_POSTGRES_USER.to_string());
    let password =
        env::var(ENV_POSTGRES_PASSWORD).unwrap_or_else(|_| DEFAULT_POSTGRES_PASSWORD.to_string());
    let database = env::var(ENV_POSTGRES_DB).unwrap_or_else(|_| DEFAULT_POSTGRES_DB.to_string());

    let database_url = format!(
        "postgres://{}:{}@{}:{}/{}",
        user, password, host, port, database
    );

    tracing::debug!(host = %host, port = %port, database = %database, "Connecting to PostgreSQL");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    tracing::info!(host = %host, port = %port, "PostgreSQL connection established");

    Ok(pool)
}

const SCHEMA: &[&str] = &[
    // Owned by the forum; created here only so the service can run standalone
    r#"
    CREATE TABLE IF NOT EXISTS debate_argument (
        id BIGSERIAL PRIMARY KEY,
        topic_id BIGINT NOT NULL,
        author_id BIGINT NOT NULL,
        content TEXT NOT NULL,
        active_yn BOOLEAN NOT NULL DEFAULT TRUE,
        fallacy_checked_yn BOOLEAN NOT NULL DEFAULT FALSE,
        fallacy_has_fallacy BOOLEAN,
        fallacy_type VARCHAR(50),
        fallacy_confidence DOUBLE PRECISION,
        fallacy_explanation TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS debate_argument_fallacy_appeal (
        id BIGSERIAL PRIMARY KEY,
        argument_id BIGINT NOT NULL,
        appealer_id BIGINT NOT NULL,
        appeal_reason TEXT NOT NULL,
        ai_original_judgment JSONB NOT NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_appeal_argument_status ON debate_argument_fallacy_appeal(argument_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_appeal_status ON debate_argument_fallacy_appeal(status)",
    r#"
    CREATE TABLE IF NOT EXISTS debate_argument_fallacy_training_data (
        id BIGSERIAL PRIMARY KEY,
        argument_id BIGINT,
        text TEXT NOT NULL,
        label VARCHAR(50) NOT NULL,
        source VARCHAR(50) NOT NULL,
        used_for_training BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_training_used ON debate_argument_fallacy_training_data(used_for_training)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_training_argument ON debate_argument_fallacy_training_data(argument_id) WHERE argument_id IS NOT NULL",
];

/// Initialize database schema
pub async fn init_schema(pool: &PgPool) -> Result<(), DbError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database schema initialized");

    Ok(())
}
