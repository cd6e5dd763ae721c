use crate::{
    entities::movement::{self, MovementReason},
    errors::ServiceError,
    services::ledger::{InventoryLedgerService, MovementRequest, StockEnd},
};
use tracing::instrument;
use uuid::Uuid;

/// Moves stock between two internal locations.
///
/// A transfer is a plain ledger movement with both ends internal and
/// the reason fixed to `transfer`; conservation across the pair falls
/// out of the ledger's debit-and-credit transaction.
#[derive(Clone)]
pub struct TransferService {
    ledger: InventoryLedgerService,
}

impl TransferService {
    pub fn new(ledger: InventoryLedgerService) -> Self {
        Self { ledger }
    }

    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        product_id: i64,
        from_location: i64,
        to_location: i64,
        quantity: i32,
        actor_id: Uuid,
    ) -> Result<movement::Model, ServiceError> {
        if from_location == to_location {
            return Err(ServiceError::InvalidArgument(format!(
                "Cannot transfer within location {}",
                from_location
            )));
        }

        self.ledger
            .apply_movement(MovementRequest {
                product_id,
                from: StockEnd::Internal(from_location),
                to: StockEnd::Internal(to_location),
                quantity,
                reason: MovementReason::Transfer,
                actor_id,
            })
            .await
    }
}
