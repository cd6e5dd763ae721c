pub mod advisory;
pub mod health;
pub mod inventory;
pub mod stocktakes;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    adjustments::AdjustmentService, ledger::InventoryLedgerService, stocktakes::StocktakeService,
    transfers::TransferService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Business-logic layer the HTTP handlers dispatch into.
#[derive(Clone)]
pub struct AppServices {
    pub ledger: InventoryLedgerService,
    pub transfers: TransferService,
    pub adjustments: AdjustmentService,
    pub stocktakes: StocktakeService,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        let ledger = InventoryLedgerService::new(db_pool.clone(), event_sender.clone());
        Self {
            transfers: TransferService::new(ledger.clone()),
            adjustments: AdjustmentService::new(ledger.clone()),
            stocktakes: StocktakeService::new(db_pool, event_sender),
            ledger,
        }
    }
}
