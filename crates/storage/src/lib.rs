pub mod cache;
pub mod db;
pub mod scans;

pub use cache::{
    count_cache_entries, get_cache_entry, get_cache_hashes, put_cache_entry, CacheRow,
    DEFAULT_CACHE_MAX_ENTRIES,
};
pub use db::{create_db, create_memory_db, DbPool};
pub use scans::{get_recent_scans, insert_scan, NewScan, ScanRecord};
