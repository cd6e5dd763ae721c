use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;

use crate::queries::{
    advisory_queries::{
        AbcRow, GetAbcClassificationQuery, GetLowStockQuery, GetReorderSuggestionsQuery,
        LowStockRow, ReorderSuggestion,
    },
    Query as LedgerQuery,
};
use crate::{errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct LowStockParams {
    pub threshold: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct AbcParams {
    pub window_days: Option<i64>,
}

/// Products short on stock
#[utoipa::path(
    get,
    path = "/api/v1/advisory/low-stock",
    summary = "Low stock report",
    description = "Products whose summed on-hand quantity is below the threshold, or below their own reorder point when none is given",
    params(
        ("threshold" = Option<i32>, Query, description = "Uniform threshold; defaults to each product's reorder point"),
    ),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<Vec<LowStockRow>>),
        (status = 503, description = "Store unavailable", body = crate::errors::ErrorResponse),
    )
)]
pub async fn low_stock(
    State(state): State<AppState>,
    Query(params): Query<LowStockParams>,
) -> Result<Json<ApiResponse<Vec<LowStockRow>>>, ServiceError> {
    let rows = GetLowStockQuery {
        threshold: params.threshold,
    }
    .execute(&state.db)
    .await?;

    Ok(Json(ApiResponse::success(rows)))
}

/// ABC ranking by consumption value
#[utoipa::path(
    get,
    path = "/api/v1/advisory/abc-classification",
    summary = "ABC classification",
    description = "Ranks products by trailing consumption value and cuts A/B/C classes on cumulative share",
    params(
        ("window_days" = Option<i64>, Query, description = "Trailing window; defaults from config"),
    ),
    responses(
        (status = 200, description = "Classification computed", body = ApiResponse<Vec<AbcRow>>),
        (status = 400, description = "Invalid window", body = crate::errors::ErrorResponse),
    )
)]
pub async fn abc_classification(
    State(state): State<AppState>,
    Query(params): Query<AbcParams>,
) -> Result<Json<ApiResponse<Vec<AbcRow>>>, ServiceError> {
    let window_days = params
        .window_days
        .unwrap_or(i64::from(state.config.abc_window_days));
    if window_days < 1 {
        return Err(ServiceError::InvalidArgument(format!(
            "Window must be at least one day, got {}",
            window_days
        )));
    }

    let rows = GetAbcClassificationQuery {
        window_days,
        class_a_share: state.config.abc_class_a_share,
        class_b_share: state.config.abc_class_b_share,
    }
    .execute(&state.db)
    .await?;

    Ok(Json(ApiResponse::success(rows)))
}

/// Reorder proposals
#[utoipa::path(
    get,
    path = "/api/v1/advisory/reorder-suggestions",
    summary = "Reorder suggestions",
    description = "Suggests a reorder quantity for every product under its reorder point; read-only",
    responses(
        (status = 200, description = "Suggestions computed", body = ApiResponse<Vec<ReorderSuggestion>>),
        (status = 503, description = "Store unavailable", body = crate::errors::ErrorResponse),
    )
)]
pub async fn reorder_suggestions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ReorderSuggestion>>>, ServiceError> {
    let rows = GetReorderSuggestionsQuery {}.execute(&state.db).await?;

    Ok(Json(ApiResponse::success(rows)))
}
