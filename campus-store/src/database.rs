use campus_core::CoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Whether the error is a unique-constraint violation on the named
/// constraint (SQLSTATE 23505).
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err.as_database_error() {
        Some(db) => {
            db.code().as_deref() == Some("23505")
                && db.constraint().map(|c| c.contains(constraint)).unwrap_or(false)
        }
        None => false,
    }
}

/// Whether the error is a foreign-key violation on the named constraint
/// (SQLSTATE 23503).
pub(crate) fn is_fk_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err.as_database_error() {
        Some(db) => {
            db.code().as_deref() == Some("23503")
                && db.constraint().map(|c| c.contains(constraint)).unwrap_or(false)
        }
        None => false,
    }
}

pub(crate) fn storage_err(err: sqlx::Error) -> CoreError {
    CoreError::Storage(err.to_string())
}
