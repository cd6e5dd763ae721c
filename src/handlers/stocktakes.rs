use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{stocktake_line, stocktake_session};
use crate::services::stocktakes::DiscrepancyReport;
use crate::{errors::ServiceError, ApiResponse, AppState};

// Stocktake DTOs

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub location_id: i64,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<stocktake_session::Model> for SessionResponse {
    fn from(model: stocktake_session::Model) -> Self {
        Self {
            id: model.id,
            location_id: model.location_id,
            status: model.status,
            started_at: model.started_at,
            completed_at: model.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CountLineResponse {
    pub product_id: i64,
    pub counted_qty: i32,
    pub recorded_at: DateTime<Utc>,
}

impl From<stocktake_line::Model> for CountLineResponse {
    fn from(model: stocktake_line::Model) -> Self {
        Self {
            product_id: model.product_id,
            counted_qty: model.counted_qty,
            recorded_at: model.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionDetailResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub lines: Vec<CountLineResponse>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct StartStocktakeRequest {
    pub location_id: i64,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RecordCountRequest {
    pub product_id: i64,

    #[validate(range(min = 0))]
    pub counted_qty: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CompleteStocktakeRequest {
    /// When true, discrepancies are written back as corrections.
    pub apply: bool,

    pub actor_id: Uuid,
}

/// Open a stocktake session
#[utoipa::path(
    post,
    path = "/api/v1/stocktakes",
    summary = "Start stocktake",
    description = "Opens a counting session for one location; expected quantities are read at completion",
    request_body = StartStocktakeRequest,
    responses(
        (status = 201, description = "Session opened", body = ApiResponse<SessionResponse>),
        (status = 404, description = "Unknown location", body = crate::errors::ErrorResponse),
    )
)]
pub async fn start_stocktake(
    State(state): State<AppState>,
    Json(request): Json<StartStocktakeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SessionResponse>>), ServiceError> {
    let session = state
        .services
        .stocktakes
        .start(request.location_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(session.into())),
    ))
}

/// Record one physical count
#[utoipa::path(
    post,
    path = "/api/v1/stocktakes/{session_id}/counts",
    summary = "Record count",
    description = "Upserts a counted quantity into an open session; the latest count for a product wins",
    params(
        ("session_id" = Uuid, Path, description = "Stocktake session id"),
    ),
    request_body = RecordCountRequest,
    responses(
        (status = 200, description = "Count recorded", body = ApiResponse<CountLineResponse>),
        (status = 400, description = "Negative count", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown session or product", body = crate::errors::ErrorResponse),
        (status = 409, description = "Session already completed", body = crate::errors::ErrorResponse),
    )
)]
pub async fn record_count(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<RecordCountRequest>,
) -> Result<Json<ApiResponse<CountLineResponse>>, ServiceError> {
    request.validate()?;

    let line = state
        .services
        .stocktakes
        .record_count(session_id, request.product_id, request.counted_qty)
        .await?;

    Ok(Json(ApiResponse::success(line.into())))
}

/// Complete a stocktake session
#[utoipa::path(
    post,
    path = "/api/v1/stocktakes/{session_id}/complete",
    summary = "Complete stocktake",
    description = "Diffs counts against the ledger; with apply=true discrepancies become corrections in one transaction",
    params(
        ("session_id" = Uuid, Path, description = "Stocktake session id"),
    ),
    request_body = CompleteStocktakeRequest,
    responses(
        (status = 200, description = "Session completed", body = ApiResponse<DiscrepancyReport>),
        (status = 404, description = "Unknown session", body = crate::errors::ErrorResponse),
        (status = 409, description = "Session not open, or corrections failed to commit", body = crate::errors::ErrorResponse),
    )
)]
pub async fn complete_stocktake(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<CompleteStocktakeRequest>,
) -> Result<Json<ApiResponse<DiscrepancyReport>>, ServiceError> {
    let report = state
        .services
        .stocktakes
        .complete(session_id, request.apply, request.actor_id)
        .await?;

    Ok(Json(ApiResponse::success(report)))
}

/// Fetch a session with its counted lines
#[utoipa::path(
    get,
    path = "/api/v1/stocktakes/{session_id}",
    summary = "Get stocktake session",
    params(
        ("session_id" = Uuid, Path, description = "Stocktake session id"),
    ),
    responses(
        (status = 200, description = "Session retrieved", body = ApiResponse<SessionDetailResponse>),
        (status = 404, description = "Unknown session", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_stocktake(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiResponse<SessionDetailResponse>>, ServiceError> {
    let (session, lines) = state.services.stocktakes.get_session(session_id).await?;

    Ok(Json(ApiResponse::success(SessionDetailResponse {
        session: session.into(),
        lines: lines.into_iter().map(CountLineResponse::from).collect(),
    })))
}
