use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Inventory Ledger API",
        version = env!("CARGO_PKG_VERSION"),
        description = r#"
# Inventory Ledger & Reconciliation API

Tracks on-hand stock per product and location as a movement ledger: every
change is a double-entry movement that debits one end and credits the other,
with current quantities kept as a materialized projection of that ledger.

## Features

- **Movement Ledger**: Transfers, adjustments, receipts and shipments recorded as atomic double-entry movements
- **Stock Queries**: Point lookups and per-product stock level breakdowns
- **Stocktakes**: Count sessions reconciled against the ledger, with optional write-back of discrepancies
- **Advisory**: Low-stock flags, ABC classification by consumption value, reorder suggestions

## Error Handling

Errors use a consistent response shape with appropriate HTTP status codes:

```json
{
  "success": false,
  "error": "Insufficient Stock",
  "message": "Product 42 has 3 on hand at location 7, movement needs 10",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

Movement history supports `page` (default 1) and `limit` (default 20, max 100)
query parameters and returns entries newest first.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080/api/v1", description = "Local development")
    ),
    tags(
        (name = "Inventory", description = "Quantity lookups and ledger movements"),
        (name = "Stocktakes", description = "Count sessions and reconciliation"),
        (name = "Advisory", description = "Read-only stock analysis"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Inventory
        crate::handlers::inventory::get_quantity,
        crate::handlers::inventory::get_stock_levels,
        crate::handlers::inventory::apply_movement,
        crate::handlers::inventory::get_movement_history,
        crate::handlers::inventory::transfer,
        crate::handlers::inventory::adjust,
        crate::handlers::inventory::receive,
        crate::handlers::inventory::ship,

        // Stocktakes
        crate::handlers::stocktakes::start_stocktake,
        crate::handlers::stocktakes::record_count,
        crate::handlers::stocktakes::complete_stocktake,
        crate::handlers::stocktakes::get_stocktake,

        // Advisory
        crate::handlers::advisory::low_stock,
        crate::handlers::advisory::abc_classification,
        crate::handlers::advisory::reorder_suggestions,

        // Health intentionally omitted from OpenAPI paths for now
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,

            // Inventory types
            crate::handlers::inventory::MovementResponse,
            crate::handlers::inventory::QuantityResponse,
            crate::handlers::inventory::StockLevelRow,
            crate::handlers::inventory::StockLevelsResponse,
            crate::handlers::inventory::ApplyMovementRequest,
            crate::handlers::inventory::TransferRequest,
            crate::handlers::inventory::AdjustmentRequest,
            crate::handlers::inventory::ReceiveRequest,
            crate::handlers::inventory::ShipRequest,
            crate::entities::movement::MovementReason,

            // Stocktake types
            crate::handlers::stocktakes::SessionResponse,
            crate::handlers::stocktakes::CountLineResponse,
            crate::handlers::stocktakes::SessionDetailResponse,
            crate::handlers::stocktakes::StartStocktakeRequest,
            crate::handlers::stocktakes::RecordCountRequest,
            crate::handlers::stocktakes::CompleteStocktakeRequest,
            crate::services::stocktakes::DiscrepancyReport,
            crate::services::stocktakes::DiscrepancyLine,
            crate::services::stocktakes::DiscrepancyStatus,

            // Advisory types
            crate::queries::advisory_queries::LowStockRow,
            crate::queries::advisory_queries::AbcClass,
            crate::queries::advisory_queries::AbcRow,
            crate::queries::advisory_queries::ReorderSuggestion,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_the_ledger_routes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Inventory Ledger API"));
        assert!(json.contains("/inventory/movements"));
        assert!(json.contains("/stocktakes/{session_id}/complete"));
        assert!(json.contains("/advisory/abc-classification"));
    }
}
