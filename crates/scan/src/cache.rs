use ecotag_core::TagResponse;
use ecotag_storage::DbPool;
use serde_json::Value;
use thiserror::Error;

use crate::hash;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Cache payload could not be encoded or decoded: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Content-addressed cache of `{parsed, emissions}` responses, keyed by
/// [`hash::response_key`]: the SHA-256 of the image bytes, with any caller
/// context folded in.
///
/// Entries are evicted oldest-first once `max_entries` is exceeded; a hit
/// does not refresh an entry. Storage failures never reach the caller:
/// `lookup` degrades to a miss and `store` to a no-op, both with a warning.
#[derive(Clone)]
pub struct ResponseCache {
    pool: DbPool,
    max_entries: u32,
}

impl ResponseCache {
    pub fn new(pool: DbPool, max_entries: u32) -> Self {
        Self { pool, max_entries: max_entries.max(1) }
    }

    pub fn max_entries(&self) -> u32 {
        self.max_entries
    }

    pub async fn lookup(&self, key: &str) -> Option<TagResponse> {
        match self.try_lookup(key).await {
            Ok(Some(response)) => {
                tracing::info!(key = hash::short_key(key), "Cache HIT");
                Some(response)
            }
            Ok(None) => {
                tracing::info!(key = hash::short_key(key), "Cache MISS");
                None
            }
            Err(e) => {
                tracing::warn!(key = hash::short_key(key), "Cache lookup failed: {e}");
                None
            }
        }
    }

    pub async fn store(&self, key: &str, response: &TagResponse) {
        match self.try_store(key, response).await {
            Ok(evicted) if evicted > 0 => {
                tracing::debug!(key = hash::short_key(key), evicted, "Cache stored, evicted oldest entries");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(key = hash::short_key(key), "Cache store failed: {e}"),
        }
    }

    /// A stored payload missing `parsed` or `emissions` counts as a miss.
    async fn try_lookup(&self, key: &str) -> Result<Option<TagResponse>, CacheError> {
        let Some(row) = ecotag_storage::get_cache_entry(&self.pool, key).await? else {
            return Ok(None);
        };

        let payload: Value = serde_json::from_str(&row.response_json)?;
        let complete = ["parsed", "emissions"]
            .iter()
            .all(|field| payload.get(field).is_some_and(|v| !v.is_null()));
        if !complete {
            tracing::debug!(key = hash::short_key(key), "Ignoring incomplete cache payload");
            return Ok(None);
        }

        Ok(Some(serde_json::from_value(payload)?))
    }

    async fn try_store(&self, key: &str, response: &TagResponse) -> Result<u64, CacheError> {
        let json = serde_json::to_string(response)?;
        let created_at = chrono::Utc::now().timestamp_millis();
        let evicted =
            ecotag_storage::put_cache_entry(&self.pool, key, &json, created_at, self.max_entries)
                .await?;
        Ok(evicted)
    }
}
