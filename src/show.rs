//! Catalog record retrieval by origin path.
//!
//! Used by `wfc show` to inspect what an import stored for one document.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::config::Config;
use crate::db;
use crate::models::CatalogRecord;
use crate::sqlite_store::SqliteStore;
use crate::store::CatalogStore;

/// Record as printed by `wfc show`: the payload is embedded as JSON rather
/// than as an escaped string.
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub id: String,
    pub collection: String,
    pub origin_path: String,
    pub name: String,
    pub category: Option<String>,
    pub node_count: i64,
    pub integrations: Vec<String>,
    pub tags: Vec<String>,
    pub active: bool,
    pub public: bool,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
    pub payload: serde_json::Value,
}

impl RecordResponse {
    pub fn new(collection: &str, record: CatalogRecord) -> Self {
        let body = record.payload.trim_start_matches('\u{feff}');
        let payload = serde_json::from_str(body)
            .unwrap_or_else(|_| serde_json::Value::String(record.payload.clone()));
        Self {
            id: record.id,
            collection: collection.to_string(),
            origin_path: record.origin_path,
            name: record.name,
            category: record.category,
            node_count: record.node_count,
            integrations: record.integrations,
            tags: record.tags,
            active: record.active,
            public: record.public,
            created_at: format_ts_iso(record.created_at),
            updated_at: format_ts_iso(record.updated_at),
            payload,
        }
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub async fn run_show(config: &Config, slug: &str, origin_path: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    let Some(collection) = store.find_collection(slug).await? else {
        store.pool().close().await;
        bail!("collection not found: {}", slug);
    };

    let origin = origin_path.replace('\\', "/");
    let record = store.find_by_origin(&collection.id, &origin).await?;
    store.pool().close().await;

    let Some(record) = record else {
        bail!("no workflow with origin path '{}' in '{}'", origin, slug);
    };

    let response = RecordResponse::new(&collection.slug, record);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
