use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::movement::{self, MovementReason};
use crate::queries::{movement_queries::GetMovementHistoryQuery, Query as LedgerQuery};
use crate::services::ledger::{MovementRequest, StockEnd};
use crate::{errors::ServiceError, ApiResponse, AppState, PaginatedResponse};

// Inventory DTOs

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MovementResponse {
    pub id: Uuid,
    pub product_id: i64,
    pub from_location: Option<i64>,
    pub to_location: Option<i64>,
    pub quantity: i32,
    pub reason: String,
    pub actor_id: Uuid,
    pub ts: DateTime<Utc>,
}

impl From<movement::Model> for MovementResponse {
    fn from(model: movement::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            from_location: model.from_location,
            to_location: model.to_location,
            quantity: model.quantity,
            reason: model.reason,
            actor_id: model.actor_id,
            ts: model.ts,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuantityResponse {
    pub product_id: i64,
    pub location_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StockLevelRow {
    pub location_id: i64,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StockLevelsResponse {
    pub product_id: i64,
    pub total: i64,
    pub levels: Vec<StockLevelRow>,
}

#[derive(Debug, Deserialize)]
pub struct QuantityParams {
    pub product_id: i64,
    pub location_id: i64,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ApplyMovementRequest {
    pub product_id: i64,

    /// Source location; omit for an external source.
    pub from_location: Option<i64>,

    /// Destination location; omit for an external sink.
    pub to_location: Option<i64>,

    #[validate(range(min = 1))]
    pub quantity: i32,

    pub reason: MovementReason,
    pub actor_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TransferRequest {
    pub product_id: i64,
    pub from_location: i64,
    pub to_location: i64,

    #[validate(range(min = 1))]
    pub quantity: i32,

    pub actor_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AdjustmentRequest {
    pub product_id: i64,
    pub location_id: i64,

    /// Signed correction; positive adds stock, negative removes it.
    pub delta: i32,

    pub reason: MovementReason,
    pub actor_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ReceiveRequest {
    pub product_id: i64,
    pub location_id: i64,

    #[validate(range(min = 1))]
    pub quantity: i32,

    pub actor_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ShipRequest {
    pub product_id: i64,
    pub location_id: i64,

    #[validate(range(min = 1))]
    pub quantity: i32,

    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct MovementHistoryParams {
    pub product_id: i64,
    pub location_id: Option<i64>,
    pub reason: Option<MovementReason>,
    pub from_ts: Option<DateTime<Utc>>,
    pub to_ts: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Current on-hand quantity for one (product, location) pair
#[utoipa::path(
    get,
    path = "/api/v1/inventory/quantity",
    summary = "Get on-hand quantity",
    description = "Current quantity for a product at a location; pairs without a record read as zero",
    params(
        ("product_id" = i64, Query, description = "Product id"),
        ("location_id" = i64, Query, description = "Location id"),
    ),
    responses(
        (status = 200, description = "Quantity retrieved", body = ApiResponse<QuantityResponse>),
        (status = 503, description = "Store unavailable", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_quantity(
    State(state): State<AppState>,
    Query(params): Query<QuantityParams>,
) -> Result<Json<ApiResponse<QuantityResponse>>, ServiceError> {
    let quantity = state
        .services
        .ledger
        .get_quantity(params.product_id, params.location_id)
        .await?;

    Ok(Json(ApiResponse::success(QuantityResponse {
        product_id: params.product_id,
        location_id: params.location_id,
        quantity,
    })))
}

/// Per-location stock breakdown for a product
#[utoipa::path(
    get,
    path = "/api/v1/inventory/stock-levels/{product_id}",
    summary = "Get stock levels",
    description = "Every location holding the product, with the summed total",
    params(
        ("product_id" = i64, Path, description = "Product id"),
    ),
    responses(
        (status = 200, description = "Levels retrieved", body = ApiResponse<StockLevelsResponse>),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_stock_levels(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<StockLevelsResponse>>, ServiceError> {
    let records = state.services.ledger.stock_levels(product_id).await?;

    let total = records.iter().map(|r| i64::from(r.quantity)).sum();
    let levels = records
        .into_iter()
        .map(|r| StockLevelRow {
            location_id: r.location_id,
            quantity: r.quantity,
            updated_at: r.updated_at,
        })
        .collect();

    Ok(Json(ApiResponse::success(StockLevelsResponse {
        product_id,
        total,
        levels,
    })))
}

/// Record a raw ledger movement
#[utoipa::path(
    post,
    path = "/api/v1/inventory/movements",
    summary = "Apply movement",
    description = "Moves quantity between two stock ends; debit, credit and audit entry commit atomically",
    request_body = ApplyMovementRequest,
    responses(
        (status = 201, description = "Movement recorded", body = ApiResponse<MovementResponse>),
        (status = 400, description = "Invalid movement", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product or location", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent update conflict", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    )
)]
pub async fn apply_movement(
    State(state): State<AppState>,
    Json(request): Json<ApplyMovementRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MovementResponse>>), ServiceError> {
    request.validate()?;

    let entry = state
        .services
        .ledger
        .apply_movement(MovementRequest {
            product_id: request.product_id,
            from: StockEnd::from_location_id(request.from_location),
            to: StockEnd::from_location_id(request.to_location),
            quantity: request.quantity,
            reason: request.reason,
            actor_id: request.actor_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(entry.into())),
    ))
}

/// Movement history for a product, newest first
#[utoipa::path(
    get,
    path = "/api/v1/inventory/movements",
    summary = "Get movement history",
    description = "Paginated audit trail for a product, optionally narrowed by location, reason or time range",
    params(
        ("product_id" = i64, Query, description = "Product id"),
        ("location_id" = Option<i64>, Query, description = "Match entries touching this location"),
        ("reason" = Option<String>, Query, description = "Reason code filter"),
        ("from_ts" = Option<String>, Query, description = "Earliest timestamp (RFC 3339)"),
        ("to_ts" = Option<String>, Query, description = "Latest timestamp (RFC 3339)"),
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default from config)"),
    ),
    responses(
        (status = 200, description = "History page", body = ApiResponse<PaginatedResponse<MovementResponse>>),
        (status = 503, description = "Store unavailable", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_movement_history(
    State(state): State<AppState>,
    Query(params): Query<MovementHistoryParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<MovementResponse>>>, ServiceError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(state.config.api_default_page_size)
        .clamp(1, state.config.api_max_page_size);

    let result = GetMovementHistoryQuery {
        product_id: params.product_id,
        location_id: params.location_id,
        reason: params.reason,
        since: params.from_ts,
        until: params.to_ts,
        page,
        per_page: limit,
    }
    .execute(&state.db)
    .await?;

    let total_pages = result.total.div_ceil(limit);
    let items = result
        .entries
        .into_iter()
        .map(MovementResponse::from)
        .collect();

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total: result.total,
        page,
        limit,
        total_pages,
    })))
}

/// Move stock between two locations
#[utoipa::path(
    post,
    path = "/api/v1/inventory/transfer",
    summary = "Transfer stock",
    description = "Moves quantity from one internal location to another in a single atomic movement",
    request_body = TransferRequest,
    responses(
        (status = 201, description = "Transfer recorded", body = ApiResponse<MovementResponse>),
        (status = 400, description = "Invalid transfer", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product or location", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    )
)]
pub async fn transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MovementResponse>>), ServiceError> {
    request.validate()?;

    let entry = state
        .services
        .transfers
        .transfer(
            request.product_id,
            request.from_location,
            request.to_location,
            request.quantity,
            request.actor_id,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(entry.into())),
    ))
}

/// Correct on-hand stock by a signed delta
#[utoipa::path(
    post,
    path = "/api/v1/inventory/adjust",
    summary = "Adjust stock",
    description = "Applies a signed correction with a mandatory adjustment reason",
    request_body = AdjustmentRequest,
    responses(
        (status = 201, description = "Adjustment recorded", body = ApiResponse<MovementResponse>),
        (status = 400, description = "Zero delta or non-adjustment reason", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product or location", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    )
)]
pub async fn adjust(
    State(state): State<AppState>,
    Json(request): Json<AdjustmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MovementResponse>>), ServiceError> {
    request.validate()?;

    let entry = state
        .services
        .adjustments
        .adjust(
            request.product_id,
            request.location_id,
            request.delta,
            request.reason,
            request.actor_id,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(entry.into())),
    ))
}

/// Book received goods into a location
#[utoipa::path(
    post,
    path = "/api/v1/inventory/receive",
    summary = "Receive stock",
    request_body = ReceiveRequest,
    responses(
        (status = 201, description = "Receipt recorded", body = ApiResponse<MovementResponse>),
        (status = 400, description = "Invalid receipt", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product or location", body = crate::errors::ErrorResponse),
    )
)]
pub async fn receive(
    State(state): State<AppState>,
    Json(request): Json<ReceiveRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MovementResponse>>), ServiceError> {
    request.validate()?;

    let entry = state
        .services
        .ledger
        .receive(
            request.product_id,
            request.location_id,
            request.quantity,
            request.actor_id,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(entry.into())),
    ))
}

/// Book an outbound shipment from a location
#[utoipa::path(
    post,
    path = "/api/v1/inventory/ship",
    summary = "Ship stock",
    request_body = ShipRequest,
    responses(
        (status = 201, description = "Shipment recorded", body = ApiResponse<MovementResponse>),
        (status = 400, description = "Invalid shipment", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product or location", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    )
)]
pub async fn ship(
    State(state): State<AppState>,
    Json(request): Json<ShipRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MovementResponse>>), ServiceError> {
    request.validate()?;

    let entry = state
        .services
        .ledger
        .ship(
            request.product_id,
            request.location_id,
            request.quantity,
            request.actor_id,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(entry.into())),
    ))
}
