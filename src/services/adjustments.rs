use crate::{
    entities::movement::{self, MovementReason},
    errors::ServiceError,
    services::ledger::{InventoryLedgerService, MovementRequest, StockEnd},
};
use tracing::instrument;
use uuid::Uuid;

/// Corrects on-hand quantities by a signed delta.
///
/// Positive deltas credit the location from the external end, negative
/// deltas debit towards it, so every correction still leaves a movement
/// entry. Only correction reasons are accepted here; operational codes
/// like `receipt` belong to their own flows.
#[derive(Clone)]
pub struct AdjustmentService {
    ledger: InventoryLedgerService,
}

impl AdjustmentService {
    pub fn new(ledger: InventoryLedgerService) -> Self {
        Self { ledger }
    }

    #[instrument(skip(self))]
    pub async fn adjust(
        &self,
        product_id: i64,
        location_id: i64,
        delta: i32,
        reason: MovementReason,
        actor_id: Uuid,
    ) -> Result<movement::Model, ServiceError> {
        if delta == 0 {
            return Err(ServiceError::InvalidArgument(
                "Adjustment delta must be non-zero".to_string(),
            ));
        }
        if !reason.is_adjustment() {
            return Err(ServiceError::InvalidArgument(format!(
                "Reason '{}' is not an adjustment reason",
                reason.as_str()
            )));
        }

        let (from, to) = if delta > 0 {
            (StockEnd::External, StockEnd::Internal(location_id))
        } else {
            (StockEnd::Internal(location_id), StockEnd::External)
        };

        self.ledger
            .apply_movement(MovementRequest {
                product_id,
                from,
                to,
                quantity: delta.abs(),
                reason,
                actor_id,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustment_reasons_are_the_correction_codes() {
        assert!(MovementReason::WriteOff.is_adjustment());
        assert!(MovementReason::FoundStock.is_adjustment());
        assert!(MovementReason::StocktakeCorrection.is_adjustment());
        assert!(!MovementReason::Transfer.is_adjustment());
        assert!(!MovementReason::Receipt.is_adjustment());
        assert!(!MovementReason::Shipment.is_adjustment());
    }
}
