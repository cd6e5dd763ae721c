use crate::{
    db::DbPool,
    entities::{
        inventory_record::{self, Entity as InventoryRecord},
        location::Entity as Location,
        movement::{self, Entity as Movement, MovementReason},
        product::Entity as Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionError, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One endpoint of a stock movement.
///
/// `External` stands for the world outside the warehouse (suppliers,
/// customers, shrinkage). A movement needs at least one `Internal` end;
/// both ends external would be a no-op the ledger refuses to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEnd {
    Internal(i64),
    External,
}

impl StockEnd {
    pub fn from_location_id(location_id: Option<i64>) -> Self {
        match location_id {
            Some(id) => StockEnd::Internal(id),
            None => StockEnd::External,
        }
    }

    pub fn location_id(&self) -> Option<i64> {
        match self {
            StockEnd::Internal(id) => Some(*id),
            StockEnd::External => None,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, StockEnd::External)
    }
}

/// Parameters for a single ledger movement.
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub product_id: i64,
    pub from: StockEnd,
    pub to: StockEnd,
    pub quantity: i32,
    pub reason: MovementReason,
    pub actor_id: Uuid,
}

/// Attempts per movement before a concurrent-update conflict is
/// surfaced to the caller.
const MAX_MOVEMENT_ATTEMPTS: u32 = 3;

/// Service owning all writes to inventory quantities.
///
/// Every mutation goes through [`apply_movement`](Self::apply_movement),
/// which debits, credits and records the audit entry in one transaction.
/// Quantities are never written outside that path, so on-hand numbers
/// and movement history cannot drift apart.
#[derive(Clone)]
pub struct InventoryLedgerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl InventoryLedgerService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Moves `quantity` units of a product between two stock ends.
    ///
    /// The debit, the credit and the movement entry commit atomically.
    /// Records are touched in ascending location-id order, and every
    /// quantity write is guarded by the record version; a lost race
    /// restarts the whole transaction, up to a bounded number of
    /// attempts.
    #[instrument(skip(self))]
    pub async fn apply_movement(
        &self,
        request: MovementRequest,
    ) -> Result<movement::Model, ServiceError> {
        validate_request(&request)?;

        let mut attempt = 1;
        let recorded = loop {
            match self.apply_movement_once(request.clone()).await {
                Ok(entry) => break entry,
                Err(ServiceError::ConcurrentModification(detail))
                    if attempt < MAX_MOVEMENT_ATTEMPTS =>
                {
                    warn!(attempt, %detail, "movement lost a version race, retrying");
                    counter!("ledger_movements.retries", 1);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        counter!("ledger_movements.applied", 1);
        if let Err(e) = self
            .event_sender
            .send(Event::MovementRecorded {
                movement_id: recorded.id,
                product_id: recorded.product_id,
                from_location: recorded.from_location,
                to_location: recorded.to_location,
                quantity: recorded.quantity,
                reason: recorded.reason.clone(),
                ts: recorded.ts,
            })
            .await
        {
            warn!("Failed to publish movement event: {}", e);
        }

        Ok(recorded)
    }

    /// Current on-hand quantity for a product at a location.
    ///
    /// A missing inventory record reads as zero; unknown ids are not
    /// distinguished from never-stocked ones here.
    #[instrument(skip(self))]
    pub async fn get_quantity(
        &self,
        product_id: i64,
        location_id: i64,
    ) -> Result<i32, ServiceError> {
        let db = self.db_pool.as_ref();

        let record = InventoryRecord::find_by_id((product_id, location_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(record.map(|r| r.quantity).unwrap_or(0))
    }

    /// Per-location quantities for a product, ordered by location id.
    #[instrument(skip(self))]
    pub async fn stock_levels(
        &self,
        product_id: i64,
    ) -> Result<Vec<inventory_record::Model>, ServiceError> {
        let db = self.db_pool.as_ref();

        Product::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        InventoryRecord::find()
            .filter(inventory_record::Column::ProductId.eq(product_id))
            .order_by_asc(inventory_record::Column::LocationId)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Books received goods into a location.
    pub async fn receive(
        &self,
        product_id: i64,
        location_id: i64,
        quantity: i32,
        actor_id: Uuid,
    ) -> Result<movement::Model, ServiceError> {
        self.apply_movement(MovementRequest {
            product_id,
            from: StockEnd::External,
            to: StockEnd::Internal(location_id),
            quantity,
            reason: MovementReason::Receipt,
            actor_id,
        })
        .await
    }

    /// Books an outbound shipment from a location.
    pub async fn ship(
        &self,
        product_id: i64,
        location_id: i64,
        quantity: i32,
        actor_id: Uuid,
    ) -> Result<movement::Model, ServiceError> {
        self.apply_movement(MovementRequest {
            product_id,
            from: StockEnd::Internal(location_id),
            to: StockEnd::External,
            quantity,
            reason: MovementReason::Shipment,
            actor_id,
        })
        .await
    }

    async fn apply_movement_once(
        &self,
        request: MovementRequest,
    ) -> Result<movement::Model, ServiceError> {
        let db = self.db_pool.as_ref();

        db.transaction::<_, movement::Model, ServiceError>(move |txn| {
            Box::pin(async move {
                Product::find_by_id(request.product_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Product {} not found", request.product_id))
                    })?;

                for location_id in [request.from.location_id(), request.to.location_id()]
                    .into_iter()
                    .flatten()
                {
                    Location::find_by_id(location_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Location {} not found", location_id))
                        })?;
                }

                // Touch records in ascending location-id order so two
                // movements over the same pair of locations cannot
                // acquire them in opposite orders.
                let mut deltas: Vec<(i64, i32)> = Vec::with_capacity(2);
                if let StockEnd::Internal(id) = request.from {
                    deltas.push((id, -request.quantity));
                }
                if let StockEnd::Internal(id) = request.to {
                    deltas.push((id, request.quantity));
                }
                deltas.sort_by_key(|(location_id, _)| *location_id);

                for (location_id, delta) in deltas {
                    apply_quantity_delta(txn, request.product_id, location_id, delta).await?;
                }

                let recorded = record_entry(txn, &request).await?;

                info!(
                    "Movement {} applied: product {} qty {} from {:?} to {:?} ({})",
                    recorded.id,
                    recorded.product_id,
                    recorded.quantity,
                    recorded.from_location,
                    recorded.to_location,
                    recorded.reason
                );

                Ok(recorded)
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }
}

fn validate_request(request: &MovementRequest) -> Result<(), ServiceError> {
    if request.quantity <= 0 {
        return Err(ServiceError::InvalidArgument(format!(
            "Movement quantity must be positive, got {}",
            request.quantity
        )));
    }
    if request.from.is_external() && request.to.is_external() {
        return Err(ServiceError::InvalidArgument(
            "Movement needs at least one internal end".to_string(),
        ));
    }
    Ok(())
}

/// Inserts the audit entry for a movement into the caller's transaction.
pub(crate) async fn record_entry(
    txn: &DatabaseTransaction,
    request: &MovementRequest,
) -> Result<movement::Model, ServiceError> {
    let entry = movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(request.product_id),
        from_location: Set(request.from.location_id()),
        to_location: Set(request.to.location_id()),
        quantity: Set(request.quantity),
        reason: Set(request.reason.as_str().to_string()),
        actor_id: Set(request.actor_id),
        ts: Set(Utc::now()),
    };

    entry.insert(txn).await.map_err(ServiceError::db_error)
}

/// Applies a signed quantity change to one inventory record.
///
/// The update is filtered on the version observed at read time; zero
/// rows affected means another writer got there first and the caller
/// must retry from a fresh read.
pub(crate) async fn apply_quantity_delta(
    txn: &DatabaseTransaction,
    product_id: i64,
    location_id: i64,
    delta: i32,
) -> Result<(), ServiceError> {
    let existing = InventoryRecord::find_by_id((product_id, location_id))
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?;

    match existing {
        Some(record) => {
            let new_quantity = record.quantity + delta;
            if new_quantity < 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "Product {} has {} on hand at location {}, movement needs {}",
                    product_id, record.quantity, location_id, -delta
                )));
            }

            let result = InventoryRecord::update_many()
                .col_expr(inventory_record::Column::Quantity, Expr::value(new_quantity))
                .col_expr(
                    inventory_record::Column::Version,
                    Expr::value(record.version + 1),
                )
                .col_expr(inventory_record::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(inventory_record::Column::ProductId.eq(product_id))
                .filter(inventory_record::Column::LocationId.eq(location_id))
                .filter(inventory_record::Column::Version.eq(record.version))
                .exec(txn)
                .await
                .map_err(ServiceError::db_error)?;

            if result.rows_affected == 0 {
                return Err(ServiceError::ConcurrentModification(format!(
                    "Inventory record for product {} at location {} changed under this movement",
                    product_id, location_id
                )));
            }
            Ok(())
        }
        None => {
            // A record that was never written reads as quantity zero.
            if delta < 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "Product {} has no stock at location {}",
                    product_id, location_id
                )));
            }

            let record = inventory_record::ActiveModel {
                product_id: Set(product_id),
                location_id: Set(location_id),
                quantity: Set(delta),
                version: Set(1),
                updated_at: Set(Utc::now()),
            };

            match record.insert(txn).await {
                Ok(_) => Ok(()),
                Err(e) => match e.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => {
                        Err(ServiceError::ConcurrentModification(format!(
                            "Inventory record for product {} at location {} was created concurrently",
                            product_id, location_id
                        )))
                    }
                    _ => Err(ServiceError::db_error(e)),
                },
            }
        }
    }
}
