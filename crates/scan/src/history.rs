use ecotag_core::TagResponse;
use ecotag_storage::{DbPool, NewScan, ScanRecord};
use serde_json::json;

use crate::pipeline::PipelineError;

/// Passive sink for scan history. Write failures are logged and swallowed.
#[derive(Clone)]
pub struct ScanHistory {
    pool: DbPool,
}

impl ScanHistory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, image_key: &str, outcome: &Result<TagResponse, PipelineError>) {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().timestamp_millis();

        let (scan_json, display_name) = match outcome {
            Ok(response) => (serde_json::to_string(response), response.parsed.display_name()),
            Err(e) => (
                serde_json::to_string(&json!({"error": {"code": e.code()}})),
                "Tag scan".to_string(),
            ),
        };
        let result_json = match scan_json {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!("Failed to encode scan result: {e}");
                None
            }
        };

        let scan = NewScan {
            id: &id,
            created_at,
            success: outcome.is_ok(),
            co2e_grams: outcome
                .as_ref()
                .map(|r| (r.emissions.total_kgco2e * 1000.0).round() as i64)
                .unwrap_or(0),
            display_name: Some(display_name.as_str()),
            image_hash: Some(image_key),
            error_code: outcome.as_ref().err().map(PipelineError::code),
            result_json: result_json.as_deref(),
        };

        if let Err(e) = ecotag_storage::insert_scan(&self.pool, &scan).await {
            tracing::warn!("Failed to write scan history: {e}");
        }
    }

    pub async fn recent(&self, limit: u32) -> Result<Vec<ScanRecord>, sqlx::Error> {
        ecotag_storage::get_recent_scans(&self.pool, limit).await
    }
}
