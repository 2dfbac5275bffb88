//! In-memory [`CatalogStore`] implementation for tests and dry experiments.
//!
//! Uses `HashMap`s behind `std::sync::RwLock`. Upserts take the write lock
//! for the whole check-and-write, so they are atomic like the SQLite upsert.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::IngestError;
use crate::models::{CatalogRecord, CatalogSummary, CollectionRef, Features, UpsertOutcome};

use super::{order_categories, CatalogStore};

/// In-memory catalog keyed by `(collection_id, origin_path)`.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, CollectionRef>>,
    records: RwLock<HashMap<(String, String), CatalogRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> IngestError {
    IngestError::Store("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn ensure_collection(
        &self,
        slug: &str,
        name: &str,
    ) -> Result<CollectionRef, IngestError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let collection = collections
            .entry(slug.to_string())
            .or_insert_with(|| CollectionRef {
                id: Uuid::new_v4().to_string(),
                slug: slug.to_string(),
                name: name.to_string(),
                owner_id: Uuid::new_v4().to_string(),
            });
        Ok(collection.clone())
    }

    async fn find_by_origin(
        &self,
        collection_id: &str,
        origin_path: &str,
    ) -> Result<Option<CatalogRecord>, IngestError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .get(&(collection_id.to_string(), origin_path.to_string()))
            .cloned())
    }

    async fn upsert(
        &self,
        collection_id: &str,
        creator_id: &str,
        origin_path: &str,
        features: &Features,
        payload: &str,
    ) -> Result<UpsertOutcome, IngestError> {
        let now = chrono::Utc::now().timestamp();
        let mut records = self.records.write().map_err(poisoned)?;
        let key = (collection_id.to_string(), origin_path.to_string());

        if let Some(existing) = records.get_mut(&key) {
            existing.payload = payload.to_string();
            existing.node_count = features.node_count;
            existing.integrations = features.integrations.iter().cloned().collect();
            existing.updated_at = now;
            return Ok(UpsertOutcome::Updated);
        }

        records.insert(
            key,
            CatalogRecord {
                id: Uuid::new_v4().to_string(),
                collection_id: collection_id.to_string(),
                creator_id: creator_id.to_string(),
                origin_path: origin_path.to_string(),
                name: features.name.clone(),
                payload: payload.to_string(),
                node_count: features.node_count,
                integrations: features.integrations.iter().cloned().collect(),
                tags: features.tags.iter().cloned().collect(),
                category: Some(features.category.clone()),
                active: true,
                public: true,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(UpsertOutcome::Created)
    }

    async fn summary(&self, collection_id: &str) -> Result<CatalogSummary, IngestError> {
        let records = self.records.read().map_err(poisoned)?;

        let mut summary = CatalogSummary::default();
        let mut by_category: HashMap<Option<String>, i64> = HashMap::new();
        for record in records.values().filter(|r| r.collection_id == collection_id) {
            summary.total_records += 1;
            summary.total_nodes += record.node_count;
            *by_category.entry(record.category.clone()).or_default() += 1;
        }

        summary.by_category = by_category.into_iter().collect();
        order_categories(&mut summary.by_category);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn features(category: &str, nodes: i64) -> Features {
        Features {
            category: category.to_string(),
            name: "Flow".to_string(),
            node_count: nodes,
            integrations: BTreeSet::from(["slack".to_string()]),
            tags: BTreeSet::from(["slack".to_string(), "notification".to_string()]),
        }
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let store = InMemoryStore::new();
        let a = store.ensure_collection("public", "Public").await.unwrap();
        let b = store.ensure_collection("public", "Public").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn upsert_creates_then_updates_in_place() {
        let store = InMemoryStore::new();
        let c = store.ensure_collection("public", "Public").await.unwrap();

        let first = store
            .upsert(&c.id, &c.owner_id, "A/x.json", &features("A", 2), "{}")
            .await
            .unwrap();
        assert_eq!(first, UpsertOutcome::Created);

        let second = store
            .upsert(&c.id, &c.owner_id, "A/x.json", &features("B", 5), "{\"v\":2}")
            .await
            .unwrap();
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(store.record_count(), 1);

        let rec = store.find_by_origin(&c.id, "A/x.json").await.unwrap().unwrap();
        assert_eq!(rec.node_count, 5);
        assert_eq!(rec.payload, "{\"v\":2}");
        // Category is fixed at creation
        assert_eq!(rec.category.as_deref(), Some("A"));
        assert!(rec.active && rec.public);
    }

    #[tokio::test]
    async fn summary_orders_categories_by_count() {
        let store = InMemoryStore::new();
        let c = store.ensure_collection("public", "Public").await.unwrap();
        for (path, cat) in [("A/1.json", "A"), ("B/1.json", "B"), ("B/2.json", "B")] {
            store
                .upsert(&c.id, &c.owner_id, path, &features(cat, 3), "{}")
                .await
                .unwrap();
        }
        let s = store.summary(&c.id).await.unwrap();
        assert_eq!(s.total_records, 3);
        assert_eq!(s.total_nodes, 9);
        assert_eq!(
            s.by_category,
            vec![(Some("B".to_string()), 2), (Some("A".to_string()), 1)]
        );
    }
}
