use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the data-access layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Map unique-constraint violations to `Conflict` and dangling
    /// references to `NotFound`, keep everything else
    pub fn from_sqlx(err: sqlx::Error, conflict_message: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DatabaseError::Conflict(conflict_message.to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                DatabaseError::NotFound("Referenced record not found".to_string())
            }
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            _ => DatabaseError::Sqlx(err),
        }
    }
}

/// Builds the PostgreSQL connection pool
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        Self::validate_url(url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Created database pool for: {}", Self::redacted(url));
        Ok(pool)
    }

    fn validate_url(url: &str) -> Result<(), DatabaseError> {
        let parsed = url::Url::parse(url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        match parsed.scheme() {
            "postgres" | "postgresql" => Ok(()),
            _ => Err(DatabaseError::InvalidDatabaseUrl),
        }
    }

    /// Connection string without credentials, for logs
    fn redacted(url: &str) -> String {
        match url::Url::parse(url) {
            Ok(mut parsed) => {
                let _ = parsed.set_password(None);
                let _ = parsed.set_username("");
                parsed.to_string()
            }
            Err(_) => "<invalid url>".to_string(),
        }
    }
}
