//! Property-based tests for the ledger's pure domain rules.
//!
//! These use proptest to verify invariants across a wide range of inputs:
//! reason codes stay a closed set, stock ends tag locations losslessly, and
//! the error taxonomy maps onto stable HTTP semantics.

use proptest::prelude::*;

use inventory_ledger::entities::movement::MovementReason;
use inventory_ledger::entities::stocktake_session::SessionStatus;
use inventory_ledger::errors::ServiceError;
use inventory_ledger::services::ledger::StockEnd;

const REASON_CODES: [&str; 6] = [
    "transfer",
    "write-off",
    "found-stock",
    "stocktake-correction",
    "receipt",
    "shipment",
];

fn message_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,.:]{0,80}".prop_map(|s| s)
}

// Property: the reason enum is closed; nothing outside the six codes parses.
proptest! {
    #[test]
    fn unknown_reason_strings_never_parse(s in "[a-z-]{1,30}") {
        if !REASON_CODES.contains(&s.as_str()) {
            prop_assert!(MovementReason::from_str(&s).is_none(),
                "unexpected reason accepted: {}", s);
        }
    }

    #[test]
    fn reason_parsing_is_exact_match_only(s in "\\s*(transfer|receipt|shipment)\\s*") {
        // Whitespace-padded variants of valid codes must not slip through.
        if s.trim() != s {
            prop_assert!(MovementReason::from_str(&s).is_none());
        }
    }
}

// Property: StockEnd tags nullable location columns without loss.
proptest! {
    #[test]
    fn stock_end_round_trips_location_columns(id in proptest::option::of(any::<i64>())) {
        let end = StockEnd::from_location_id(id);
        prop_assert_eq!(end.location_id(), id);
        prop_assert_eq!(end.is_external(), id.is_none());
    }
}

// Property: session states are a closed two-value set.
proptest! {
    #[test]
    fn unknown_session_states_never_parse(s in "[a-z]{1,20}") {
        if s != "open" && s != "completed" {
            prop_assert!(SessionStatus::from_str(&s).is_none());
        }
    }
}

// Property: every taxonomy variant keeps its message visible to callers
// and maps into the client-error or service-unavailable range.
proptest! {
    #[test]
    fn error_messages_survive_display(msg in message_strategy()) {
        let errors = [
            ServiceError::NotFound(msg.clone()),
            ServiceError::InvalidArgument(msg.clone()),
            ServiceError::InvalidState(msg.clone()),
            ServiceError::InsufficientStock(msg.clone()),
            ServiceError::ReconciliationFailed(msg.clone()),
            ServiceError::ConcurrentModification(msg.clone()),
        ];
        for err in errors {
            prop_assert!(err.to_string().contains(&msg),
                "message lost in display: {}", err);
            let status = err.status_code().as_u16();
            prop_assert!((400..500).contains(&status),
                "taxonomy error outside 4xx: {}", status);
            // Client-facing message matches the display form for domain errors.
            prop_assert_eq!(err.response_message(), err.to_string());
        }
    }

    #[test]
    fn storage_errors_redact_details(detail in message_strategy()) {
        let err = ServiceError::db_error(detail);
        prop_assert_eq!(err.status_code().as_u16(), 503);
        prop_assert_eq!(err.response_message(), "Storage unavailable, retry with backoff");
    }
}
