use crate::{
    db::DbPool,
    entities::{
        inventory_record::{self, Entity as InventoryRecord},
        location::Entity as Location,
        movement::MovementReason,
        product::Entity as Product,
        stocktake_line::{self, Entity as StocktakeLine},
        stocktake_session::{self, Entity as StocktakeSession, SessionStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::ledger::{apply_quantity_delta, record_entry, MovementRequest, StockEnd},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// How one counted line compares against the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiscrepancyStatus {
    Match,
    Shortage,
    Overage,
}

impl DiscrepancyStatus {
    fn for_delta(delta: i32) -> Self {
        match delta {
            0 => DiscrepancyStatus::Match,
            d if d < 0 => DiscrepancyStatus::Shortage,
            _ => DiscrepancyStatus::Overage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiscrepancyLine {
    pub product_id: i64,
    pub expected_qty: i32,
    pub counted_qty: i32,
    pub delta: i32,
    pub status: DiscrepancyStatus,
}

/// Outcome of completing a stocktake session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiscrepancyReport {
    pub session_id: Uuid,
    pub location_id: i64,
    pub applied: bool,
    pub accuracy_percentage: f64,
    pub lines: Vec<DiscrepancyLine>,
}

impl DiscrepancyReport {
    pub fn matched_lines(&self) -> u64 {
        self.lines
            .iter()
            .filter(|l| l.status == DiscrepancyStatus::Match)
            .count() as u64
    }
}

const MAX_COMPLETE_ATTEMPTS: u32 = 3;

/// Reconciles physical counts against the ledger.
///
/// Sessions move Open -> Completed exactly once. Expected quantities are
/// read at completion time, not at session start, so movements recorded
/// mid-count do not show up as phantom discrepancies.
#[derive(Clone)]
pub struct StocktakeService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StocktakeService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Opens a counting session for a location.
    #[instrument(skip(self))]
    pub async fn start(&self, location_id: i64) -> Result<stocktake_session::Model, ServiceError> {
        let db = self.db_pool.as_ref();

        Location::find_by_id(location_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Location {} not found", location_id)))?;

        let session = stocktake_session::ActiveModel {
            id: Set(Uuid::new_v4()),
            location_id: Set(location_id),
            status: Set(SessionStatus::Open.as_str().to_string()),
            started_at: Set(Utc::now()),
            completed_at: Set(None),
        };
        let session = session.insert(db).await.map_err(ServiceError::db_error)?;

        info!(
            "Stocktake session {} opened for location {}",
            session.id, location_id
        );
        if let Err(e) = self
            .event_sender
            .send(Event::StocktakeStarted {
                session_id: session.id,
                location_id,
            })
            .await
        {
            warn!("Failed to publish stocktake event: {}", e);
        }

        Ok(session)
    }

    /// Records one physical count; a later count for the same product
    /// replaces the earlier one.
    #[instrument(skip(self))]
    pub async fn record_count(
        &self,
        session_id: Uuid,
        product_id: i64,
        counted_qty: i32,
    ) -> Result<stocktake_line::Model, ServiceError> {
        if counted_qty < 0 {
            return Err(ServiceError::InvalidArgument(format!(
                "Counted quantity cannot be negative, got {}",
                counted_qty
            )));
        }

        let db = self.db_pool.as_ref();
        self.load_open_session(db, session_id).await?;

        Product::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = StocktakeLine::find_by_id((session_id, product_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        let line = match existing {
            Some(line) => {
                let mut active: stocktake_line::ActiveModel = line.into();
                active.counted_qty = Set(counted_qty);
                active.recorded_at = Set(Utc::now());
                active.update(db).await.map_err(ServiceError::db_error)?
            }
            None => {
                let line = stocktake_line::ActiveModel {
                    session_id: Set(session_id),
                    product_id: Set(product_id),
                    counted_qty: Set(counted_qty),
                    recorded_at: Set(Utc::now()),
                };
                line.insert(db).await.map_err(ServiceError::db_error)?
            }
        };

        Ok(line)
    }

    /// Diffs the session's counts against the ledger and closes it.
    ///
    /// With `apply` set, every nonzero discrepancy becomes a
    /// stocktake-correction movement; all corrections and the status
    /// change commit together or not at all. A completion that cannot
    /// commit in full leaves the session Open and reports
    /// `ReconciliationFailed`. Without `apply` the session closes and
    /// the ledger is untouched.
    #[instrument(skip(self))]
    pub async fn complete(
        &self,
        session_id: Uuid,
        apply: bool,
        actor_id: Uuid,
    ) -> Result<DiscrepancyReport, ServiceError> {
        let mut attempt = 1;
        let report = loop {
            match self.complete_once(session_id, apply, actor_id).await {
                Ok(report) => break report,
                Err(ServiceError::ConcurrentModification(detail))
                    if attempt < MAX_COMPLETE_ATTEMPTS =>
                {
                    warn!(attempt, %detail, "stocktake completion lost a version race, retrying");
                    attempt += 1;
                }
                Err(ServiceError::ConcurrentModification(detail)) => {
                    return Err(ServiceError::ReconciliationFailed(format!(
                        "Corrections kept conflicting with concurrent movements: {}",
                        detail
                    )));
                }
                Err(ServiceError::InsufficientStock(detail)) => {
                    return Err(ServiceError::ReconciliationFailed(format!(
                        "Correction would overdraw stock: {}",
                        detail
                    )));
                }
                Err(e) => return Err(e),
            }
        };

        info!(
            "Stocktake session {} completed: {} lines, {:.1}% accurate, applied={}",
            session_id,
            report.lines.len(),
            report.accuracy_percentage,
            report.applied
        );
        if let Err(e) = self
            .event_sender
            .send(Event::StocktakeCompleted {
                session_id,
                location_id: report.location_id,
                applied: report.applied,
                total_lines: report.lines.len() as u64,
                matched_lines: report.matched_lines(),
            })
            .await
        {
            warn!("Failed to publish stocktake event: {}", e);
        }

        Ok(report)
    }

    /// Fetches a session with its counted lines, ordered by product id.
    #[instrument(skip(self))]
    pub async fn get_session(
        &self,
        session_id: Uuid,
    ) -> Result<(stocktake_session::Model, Vec<stocktake_line::Model>), ServiceError> {
        let db = self.db_pool.as_ref();
        let session = self.load_session(db, session_id).await?;

        let lines = StocktakeLine::find()
            .filter(stocktake_line::Column::SessionId.eq(session_id))
            .order_by_asc(stocktake_line::Column::ProductId)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((session, lines))
    }

    async fn complete_once(
        &self,
        session_id: Uuid,
        apply: bool,
        actor_id: Uuid,
    ) -> Result<DiscrepancyReport, ServiceError> {
        let db = self.db_pool.as_ref();

        db.transaction::<_, DiscrepancyReport, ServiceError>(move |txn| {
            Box::pin(async move {
                let session = StocktakeSession::find_by_id(session_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Stocktake session {} not found", session_id))
                    })?;
                if SessionStatus::from_str(&session.status) != Some(SessionStatus::Open) {
                    return Err(ServiceError::InvalidState(format!(
                        "Stocktake session {} is not open",
                        session_id
                    )));
                }
                let location_id = session.location_id;

                let counted_lines = StocktakeLine::find()
                    .filter(stocktake_line::Column::SessionId.eq(session_id))
                    .all(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                let records = InventoryRecord::find()
                    .filter(inventory_record::Column::LocationId.eq(location_id))
                    .all(txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                let expected: HashMap<i64, i32> = records
                    .iter()
                    .map(|r| (r.product_id, r.quantity))
                    .collect();

                // Counted products, plus every product the ledger says is
                // present but nobody counted. The count sheet being silent
                // on held stock is itself a discrepancy.
                let mut counted: BTreeMap<i64, i32> = counted_lines
                    .iter()
                    .map(|l| (l.product_id, l.counted_qty))
                    .collect();
                for (product_id, quantity) in &expected {
                    if *quantity != 0 {
                        counted.entry(*product_id).or_insert(0);
                    }
                }

                let lines: Vec<DiscrepancyLine> = counted
                    .into_iter()
                    .map(|(product_id, counted_qty)| {
                        let expected_qty = expected.get(&product_id).copied().unwrap_or(0);
                        let delta = counted_qty - expected_qty;
                        DiscrepancyLine {
                            product_id,
                            expected_qty,
                            counted_qty,
                            delta,
                            status: DiscrepancyStatus::for_delta(delta),
                        }
                    })
                    .collect();

                if apply {
                    for line in lines.iter().filter(|l| l.delta != 0) {
                        let (from, to) = if line.delta > 0 {
                            (StockEnd::External, StockEnd::Internal(location_id))
                        } else {
                            (StockEnd::Internal(location_id), StockEnd::External)
                        };
                        apply_quantity_delta(txn, line.product_id, location_id, line.delta)
                            .await?;
                        record_entry(
                            txn,
                            &MovementRequest {
                                product_id: line.product_id,
                                from,
                                to,
                                quantity: line.delta.abs(),
                                reason: MovementReason::StocktakeCorrection,
                                actor_id,
                            },
                        )
                        .await?;
                    }
                }

                let mut active: stocktake_session::ActiveModel = session.into();
                active.status = Set(SessionStatus::Completed.as_str().to_string());
                active.completed_at = Set(Some(Utc::now()));
                active.update(txn).await.map_err(ServiceError::db_error)?;

                let total = lines.len();
                let matched = lines
                    .iter()
                    .filter(|l| l.status == DiscrepancyStatus::Match)
                    .count();
                let accuracy_percentage = if total == 0 {
                    100.0
                } else {
                    100.0 * matched as f64 / total as f64
                };

                Ok(DiscrepancyReport {
                    session_id,
                    location_id,
                    applied: apply,
                    accuracy_percentage,
                    lines,
                })
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }

    async fn load_session(
        &self,
        db: &DatabaseConnection,
        session_id: Uuid,
    ) -> Result<stocktake_session::Model, ServiceError> {
        StocktakeSession::find_by_id(session_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Stocktake session {} not found", session_id))
            })
    }

    async fn load_open_session(
        &self,
        db: &DatabaseConnection,
        session_id: Uuid,
    ) -> Result<stocktake_session::Model, ServiceError> {
        let session = self.load_session(db, session_id).await?;
        if SessionStatus::from_str(&session.status) != Some(SessionStatus::Open) {
            return Err(ServiceError::InvalidState(format!(
                "Stocktake session {} is not open",
                session_id
            )));
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, DiscrepancyStatus::Match)]
    #[case(-1, DiscrepancyStatus::Shortage)]
    #[case(-5, DiscrepancyStatus::Shortage)]
    #[case(1, DiscrepancyStatus::Overage)]
    #[case(3, DiscrepancyStatus::Overage)]
    fn delta_sign_decides_discrepancy_status(
        #[case] delta: i32,
        #[case] expected: DiscrepancyStatus,
    ) {
        assert_eq!(DiscrepancyStatus::for_delta(delta), expected);
    }
}
