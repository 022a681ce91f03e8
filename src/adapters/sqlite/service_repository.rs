//! SQLite implementation of the ServiceRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Service, ServiceStatus};
use crate::domain::ports::ServiceRepository;

use super::execution_repository::parse_timestamp;

#[derive(Clone)]
pub struct SqliteServiceRepository {
    pool: SqlitePool,
}

impl SqliteServiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServiceRepository for SqliteServiceRepository {
    async fn get(&self, name: &str) -> DomainResult<Option<Service>> {
        let row: Option<ServiceRow> = sqlx::query_as("SELECT * FROM services WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Service::try_from).transpose()
    }

    async fn seed(&self, service: &Service) -> DomainResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO services (name, description, status, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.status.as_str())
        .bind(service.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status(&self, name: &str, active: bool) -> DomainResult<()> {
        let status = if active { ServiceStatus::Active } else { ServiceStatus::Inactive };
        let result = sqlx::query("UPDATE services SET status = ? WHERE name = ?")
            .bind(status.as_str())
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ServiceNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Service>> {
        let rows: Vec<ServiceRow> = sqlx::query_as("SELECT * FROM services ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Service::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ServiceRow {
    name: String,
    description: String,
    status: String,
    created_at: String,
}

impl TryFrom<ServiceRow> for Service {
    type Error = DomainError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        Ok(Service {
            name: row.name,
            description: row.description,
            status: ServiceStatus::from_str(&row.status).ok_or_else(|| {
                DomainError::SerializationError(format!("unknown service status '{}'", row.status))
            })?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}
