// Ledger core
pub mod ledger;

// Operations layered on the ledger primitive
pub mod adjustments;
pub mod transfers;

// Reconciliation
pub mod stocktakes;
