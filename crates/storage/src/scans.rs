use serde::Serialize;

use crate::db::DbPool;

/// One pipeline run as written to the history table.
#[derive(Debug, Clone)]
pub struct NewScan<'a> {
    pub id: &'a str,
    pub created_at: i64,
    pub success: bool,
    pub co2e_grams: i64,
    pub display_name: Option<&'a str>,
    pub image_hash: Option<&'a str>,
    pub error_code: Option<&'a str>,
    pub result_json: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRecord {
    pub id: String,
    pub created_at: i64,
    pub success: bool,
    pub co2e_grams: i64,
    pub display_name: Option<String>,
    pub image_hash: Option<String>,
    pub error_code: Option<String>,
    /// Stored payload, `None` when absent or no longer valid JSON.
    pub result: Option<serde_json::Value>,
}

pub async fn insert_scan(pool: &DbPool, scan: &NewScan<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO scans (id, created_at, success, co2e_grams, display_name, image_hash, error_code, result_json)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(scan.id)
    .bind(scan.created_at)
    .bind(i64::from(scan.success))
    .bind(scan.co2e_grams)
    .bind(scan.display_name)
    .bind(scan.image_hash)
    .bind(scan.error_code)
    .bind(scan.result_json)
    .execute(pool)
    .await?;

    Ok(())
}

type ScanRow = (String, i64, i64, i64, Option<String>, Option<String>, Option<String>, Option<String>);

/// Most recent scans first.
pub async fn get_recent_scans(pool: &DbPool, limit: u32) -> Result<Vec<ScanRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ScanRow>(
        r#"
        SELECT id, created_at, success, co2e_grams, display_name, image_hash, error_code, result_json
        FROM scans ORDER BY created_at DESC, rowid DESC LIMIT ?
        "#,
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ScanRecord {
            id: r.0,
            created_at: r.1,
            success: r.2 != 0,
            co2e_grams: r.3,
            display_name: r.4,
            image_hash: r.5,
            error_code: r.6,
            result: r.7.and_then(|json| serde_json::from_str(&json).ok()),
        })
        .collect())
}
