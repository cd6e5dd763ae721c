use crate::{
    entities::movement::{self, Entity as Movement, MovementReason},
    errors::ServiceError,
    queries::Query,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use serde::{Deserialize, Serialize};

/// Audit-trail page for one product, newest entries first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMovementHistoryQuery {
    pub product_id: i64,
    /// Matches entries where this location is either end.
    pub location_id: Option<i64>,
    pub reason: Option<MovementReason>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// 1-based page index.
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone)]
pub struct MovementPage {
    pub entries: Vec<movement::Model>,
    pub total: u64,
}

#[async_trait]
impl Query for GetMovementHistoryQuery {
    type Result = MovementPage;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let mut query = Movement::find()
            .filter(movement::Column::ProductId.eq(self.product_id));

        if let Some(location_id) = self.location_id {
            query = query.filter(
                Condition::any()
                    .add(movement::Column::FromLocation.eq(location_id))
                    .add(movement::Column::ToLocation.eq(location_id)),
            );
        }
        if let Some(reason) = self.reason {
            query = query.filter(movement::Column::Reason.eq(reason.as_str()));
        }
        if let Some(since) = self.since {
            query = query.filter(movement::Column::Ts.gte(since));
        }
        if let Some(until) = self.until {
            query = query.filter(movement::Column::Ts.lte(until));
        }

        let paginator = query
            .order_by_desc(movement::Column::Ts)
            .order_by_desc(movement::Column::Id)
            .paginate(db, self.per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let page = self.page.max(1);
        let entries = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(MovementPage { entries, total })
    }
}
