//! Catalog storage abstraction.
//!
//! The [`CatalogStore`] trait is the only way the pipeline touches the
//! persistent catalog. Implementations must be `Send + Sync` so a batch of
//! items can share one store while running concurrently.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`ensure_collection`](CatalogStore::ensure_collection) | Find or bootstrap a collection |
//! | [`find_by_origin`](CatalogStore::find_by_origin) | Look up a record by origin path |
//! | [`upsert`](CatalogStore::upsert) | Atomic insert-or-update keyed by origin path |
//! | [`summary`](CatalogStore::summary) | Aggregate counts for the run report |

pub mod memory;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::IngestError;
use crate::models::{CatalogRecord, CatalogSummary, CollectionRef, Features, UpsertOutcome};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Find the collection with `slug`, or create it together with its
    /// system owner and owner membership in one transaction.
    async fn ensure_collection(&self, slug: &str, name: &str)
        -> Result<CollectionRef, IngestError>;

    async fn find_by_origin(
        &self,
        collection_id: &str,
        origin_path: &str,
    ) -> Result<Option<CatalogRecord>, IngestError>;

    /// Create the record for `(collection_id, origin_path)`, or refresh its
    /// payload, node count, integrations and `updated_at` if it exists.
    async fn upsert(
        &self,
        collection_id: &str,
        creator_id: &str,
        origin_path: &str,
        features: &Features,
        payload: &str,
    ) -> Result<UpsertOutcome, IngestError>;

    async fn summary(&self, collection_id: &str) -> Result<CatalogSummary, IngestError>;
}

/// Hex SHA-256 of a document payload.
pub fn content_hash(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Email of the system identity that owns a bootstrapped collection.
pub fn system_email(slug: &str) -> String {
    format!("system@{}", slug)
}

/// Sort category counts by descending count, then by name.
pub(crate) fn order_categories(rows: &mut [(Option<String>, i64)]) {
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}
