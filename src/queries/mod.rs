use crate::errors::ServiceError;
use async_trait::async_trait;
use sea_orm::DatabaseConnection;

pub mod advisory_queries;
pub mod movement_queries;

/// A read-only question asked of the store. Queries never mutate.
#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send + Sync;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError>;
}
