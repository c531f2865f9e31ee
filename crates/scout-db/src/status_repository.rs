use chrono::{DateTime, Utc};
use scout_core::error::AppError;
use scout_core::models::WorkerStatus;
use sqlx::{PgPool, Pool, Postgres};

/// Named heartbeat records in the `worker_status` table.
#[derive(Clone)]
pub struct StatusRepository {
    pool: Pool<Postgres>,
}

impl StatusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create or overwrite the heartbeat for `name`.
    pub async fn record_run(&self, name: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO worker_status (name, last_run)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET last_run = EXCLUDED.last_run
            "#,
        )
        .bind(name)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn get_status(&self, name: &str) -> Result<Option<WorkerStatus>, AppError> {
        let row = sqlx::query_as::<_, StatusRow>(
            "SELECT name, last_run FROM worker_status WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }
}

#[derive(sqlx::FromRow)]
struct StatusRow {
    name: String,
    last_run: DateTime<Utc>,
}

impl From<StatusRow> for WorkerStatus {
    fn from(row: StatusRow) -> Self {
        WorkerStatus {
            name: row.name,
            last_run: row.last_run,
        }
    }
}

impl scout_core::traits::StatusStore for StatusRepository {
    async fn record_run(&self, name: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        StatusRepository::record_run(self, name, at).await
    }

    async fn get_status(&self, name: &str) -> Result<Option<WorkerStatus>, AppError> {
        StatusRepository::get_status(self, name).await
    }
}
