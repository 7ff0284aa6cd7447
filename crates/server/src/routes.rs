use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use axum::Json;
use ecotag_core::{EstimateContext, TagResponse};
use ecotag_scan::TagRequest;
use ecotag_storage::ScanRecord;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const MAX_HISTORY_LIMIT: u32 = 200;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

/// POST /api/tag
///
/// Multipart upload: `image` (required file), plus optional `category`,
/// `weight_g` and `washes_per_month` text fields.
pub async fn analyze_tag(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TagResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Rejected multipart body: {e}");
        ApiError::MissingImage
    })?;

    let mut image: Option<Vec<u8>> = None;
    let mut context = EstimateContext::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => image = Some(field.bytes().await?.to_vec()),
            "category" => context.garment_type = text_field(field).await,
            "weight_g" => context.weight_g = positive_number(field).await,
            "washes_per_month" => context.washes_per_month = positive_number(field).await,
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let image = image.filter(|bytes| !bytes.is_empty()).ok_or(ApiError::MissingImage)?;
    tracing::info!(bytes = image.len(), "Analyzing tag image");

    let request = TagRequest::new(image).with_context(context);
    let response = state.pipeline.analyze(&request).await?;
    Ok(Json(response))
}

async fn text_field(field: Field<'_>) -> Option<String> {
    let text = field.text().await.ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Unparseable or non-positive values are ignored.
async fn positive_number(field: Field<'_>) -> Option<f64> {
    let text = text_field(field).await?;
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => Some(n),
        _ => {
            tracing::debug!(value = %text, "Ignoring invalid numeric field");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// GET /api/history?limit=n
pub async fn history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<ScanRecord>>, ApiError> {
    let limit = match query {
        Ok(Query(query)) => query.limit,
        Err(e) => {
            tracing::debug!("Ignoring unreadable history query: {e}");
            None
        }
    };
    let Some(history) = state.pipeline.history() else {
        return Ok(Json(Vec::new()));
    };

    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
    let scans = history
        .recent(limit)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read scan history: {e}")))?;
    Ok(Json(scans))
}
