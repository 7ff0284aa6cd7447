use crate::db::DbPool;

/// Default capacity of the image response cache.
pub const DEFAULT_CACHE_MAX_ENTRIES: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRow {
    pub image_hash: String,
    pub response_json: String,
    pub created_at: i64,
}

pub async fn get_cache_entry(pool: &DbPool, image_hash: &str) -> Result<Option<CacheRow>, sqlx::Error> {
    let row = sqlx::query_as::<_, (String, String, i64)>(
        "SELECT image_hash, response_json, created_at FROM image_cache WHERE image_hash = ?",
    )
    .bind(image_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| CacheRow {
        image_hash: r.0,
        response_json: r.1,
        created_at: r.2,
    }))
}

/// Insert or replace the entry for `image_hash`, then trim the table to the
/// newest `max_entries` rows by `created_at` (insertion order breaks ties).
/// Both statements run in one transaction, so concurrent stores cannot each
/// see the table under capacity. Returns how many rows were evicted.
pub async fn put_cache_entry(
    pool: &DbPool,
    image_hash: &str,
    response_json: &str,
    created_at: i64,
    max_entries: u32,
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT OR REPLACE INTO image_cache (image_hash, response_json, created_at) VALUES (?, ?, ?)",
    )
    .bind(image_hash)
    .bind(response_json)
    .bind(created_at)
    .execute(&mut *tx)
    .await?;

    let evicted = sqlx::query(
        r#"
        DELETE FROM image_cache WHERE image_hash NOT IN (
            SELECT image_hash FROM image_cache ORDER BY created_at DESC, rowid DESC LIMIT ?
        )
        "#,
    )
    .bind(i64::from(max_entries))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    Ok(evicted)
}

pub async fn count_cache_entries(pool: &DbPool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM image_cache")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Cached hashes, oldest first.
pub async fn get_cache_hashes(pool: &DbPool) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT image_hash FROM image_cache ORDER BY created_at ASC, rowid ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}
