//! SQLite-backed [`CatalogStore`] implementation.
//!
//! Every write is keyed on a unique constraint, so concurrent imports into
//! the same database converge instead of duplicating rows.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::IngestError;
use crate::models::{CatalogRecord, CatalogSummary, CollectionRef, Features, UpsertOutcome};
use crate::store::{content_hash, order_categories, system_email, CatalogStore};

/// SQLite implementation of the [`CatalogStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Look up a collection without creating it.
    pub async fn find_collection(&self, slug: &str) -> Result<Option<CollectionRef>, IngestError> {
        let row = sqlx::query("SELECT id, slug, name, owner_id FROM collections WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| CollectionRef {
            id: row.get("id"),
            slug: row.get("slug"),
            name: row.get("name"),
            owner_id: row.get("owner_id"),
        }))
    }
}

fn to_json_array<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    let items: Vec<&String> = items.into_iter().collect();
    serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string())
}

fn from_json_array(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn record_from_row(row: &SqliteRow) -> CatalogRecord {
    let integrations: String = row.get("integrations_json");
    let tags: String = row.get("tags_json");
    CatalogRecord {
        id: row.get("id"),
        collection_id: row.get("collection_id"),
        creator_id: row.get("creator_id"),
        origin_path: row.get("origin_path"),
        name: row.get("name"),
        payload: row.get("payload"),
        node_count: row.get("node_count"),
        integrations: from_json_array(&integrations),
        tags: from_json_array(&tags),
        category: row.get("category"),
        active: row.get("active"),
        public: row.get("public"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn ensure_collection(
        &self,
        slug: &str,
        name: &str,
    ) -> Result<CollectionRef, IngestError> {
        let now = chrono::Utc::now().timestamp();
        let email = system_email(slug);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO users (id, email, name, created_at) VALUES (?, ?, ?, ?) ON CONFLICT(email) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&email)
        .bind(format!("{} system", name))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let owner_id: String = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO collections (id, slug, name, owner_id, created_at) VALUES (?, ?, ?, ?, ?) ON CONFLICT(slug) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(slug)
        .bind(name)
        .bind(&owner_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query("SELECT id, slug, name, owner_id FROM collections WHERE slug = ?")
            .bind(slug)
            .fetch_one(&mut *tx)
            .await?;
        let collection = CollectionRef {
            id: row.get("id"),
            slug: row.get("slug"),
            name: row.get("name"),
            owner_id: row.get("owner_id"),
        };

        sqlx::query(
            "INSERT INTO memberships (collection_id, user_id, role, created_at) VALUES (?, ?, 'owner', ?) ON CONFLICT(collection_id, user_id) DO NOTHING",
        )
        .bind(&collection.id)
        .bind(&collection.owner_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(collection)
    }

    async fn find_by_origin(
        &self,
        collection_id: &str,
        origin_path: &str,
    ) -> Result<Option<CatalogRecord>, IngestError> {
        let row = sqlx::query(
            r#"
            SELECT id, collection_id, creator_id, origin_path, name, payload, node_count,
                   integrations_json, tags_json, category, active, public, created_at, updated_at
            FROM workflows
            WHERE collection_id = ? AND origin_path = ?
            "#,
        )
        .bind(collection_id)
        .bind(origin_path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(record_from_row))
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
        let id = Uuid::new_v4().to_string();

        // RETURNING yields the stored id, which only equals ours on insert
        let stored_id: String = sqlx::query_scalar(
            r#"
            INSERT INTO workflows (id, collection_id, creator_id, origin_path, name, payload,
                                   content_hash, node_count, integrations_json, tags_json,
                                   category, active, public, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 1, ?, ?)
            ON CONFLICT(collection_id, origin_path) DO UPDATE SET
                payload = excluded.payload,
                content_hash = excluded.content_hash,
                node_count = excluded.node_count,
                integrations_json = excluded.integrations_json,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&id)
        .bind(collection_id)
        .bind(creator_id)
        .bind(origin_path)
        .bind(&features.name)
        .bind(payload)
        .bind(content_hash(payload))
        .bind(features.node_count)
        .bind(to_json_array(&features.integrations))
        .bind(to_json_array(&features.tags))
        .bind(&features.category)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        if stored_id == id {
            Ok(UpsertOutcome::Created)
        } else {
            Ok(UpsertOutcome::Updated)
        }
    }

    async fn summary(&self, collection_id: &str) -> Result<CatalogSummary, IngestError> {
        let totals = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(node_count), 0) AS nodes FROM workflows WHERE collection_id = ?",
        )
        .bind(collection_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IngestError::ReportQuery(e.to_string()))?;

        let category_rows = sqlx::query(
            r#"
            SELECT category, COUNT(*) AS count
            FROM workflows
            WHERE collection_id = ?
            GROUP BY category
            ORDER BY count DESC
            "#,
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::ReportQuery(e.to_string()))?;

        let mut by_category: Vec<(Option<String>, i64)> = category_rows
            .iter()
            .map(|row| (row.get("category"), row.get("count")))
            .collect();
        order_categories(&mut by_category);

        Ok(CatalogSummary {
            total_records: totals.get("total"),
            total_nodes: totals.get("nodes"),
            by_category,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::apply_schema;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::BTreeSet;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        apply_schema(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn features(category: &str, integrations: &[&str]) -> Features {
        let integrations: BTreeSet<String> = integrations.iter().map(|s| s.to_string()).collect();
        Features {
            category: category.to_string(),
            name: "Slack".to_string(),
            node_count: integrations.len() as i64,
            tags: integrations.clone(),
            integrations,
        }
    }

    #[tokio::test]
    async fn ensure_collection_twice_returns_same_collection() {
        let store = memory_store().await;
        let a = store.ensure_collection("public", "Public").await.unwrap();
        let b = store.ensure_collection("public", "Public").await.unwrap();
        assert_eq!(a, b);

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(store.pool())
            .await
            .unwrap();
        let members: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memberships")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(users, 1);
        assert_eq!(members, 1);
        assert_eq!(store.find_collection("public").await.unwrap(), Some(a));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_bootstraps_converge_on_one_collection() {
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::time::Duration;

        let tmp = tempfile::TempDir::new().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(tmp.path().join("catalog.sqlite"))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));

        let setup = SqlitePoolOptions::new()
            .connect_with(options.clone())
            .await
            .unwrap();
        apply_schema(&setup).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let options = options.clone();
            handles.push(tokio::spawn(async move {
                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect_with(options)
                    .await
                    .unwrap();
                let store = SqliteStore::new(pool);
                let collection = store.ensure_collection("public", "Public").await.unwrap();
                store.pool().close().await;
                collection
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let collections: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collections")
            .fetch_one(&setup)
            .await
            .unwrap();
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&setup)
            .await
            .unwrap();
        let members: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memberships")
            .fetch_one(&setup)
            .await
            .unwrap();
        assert_eq!((collections, users, members), (1, 1, 1));
        setup.close().await;
    }

    #[tokio::test]
    async fn upsert_never_duplicates_origin_path() {
        let store = memory_store().await;
        let c = store.ensure_collection("public", "Public").await.unwrap();

        let created = store
            .upsert(&c.id, &c.owner_id, "Communication/slack.json", &features("Communication", &["slack"]), "{}")
            .await
            .unwrap();
        let updated = store
            .upsert(
                &c.id,
                &c.owner_id,
                "Communication/slack.json",
                &features("Other", &["slack", "webhook"]),
                r#"{"nodes":[]}"#,
            )
            .await
            .unwrap();
        assert_eq!(created, UpsertOutcome::Created);
        assert_eq!(updated, UpsertOutcome::Updated);

        let rec = store
            .find_by_origin(&c.id, "Communication/slack.json")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.payload, r#"{"nodes":[]}"#);
        assert_eq!(rec.node_count, 2);
        assert_eq!(rec.integrations, vec!["slack", "webhook"]);
        // Only payload, node count, integrations and timestamp are refreshed
        assert_eq!(rec.tags, vec!["slack"]);
        assert_eq!(rec.category.as_deref(), Some("Communication"));
        assert!(rec.active);
        assert!(rec.public);

        let summary = store.summary(&c.id).await.unwrap();
        assert_eq!(summary.total_records, 1);
        assert_eq!(summary.total_nodes, 2);
    }

    #[tokio::test]
    async fn summary_reports_null_category() {
        let store = memory_store().await;
        let c = store.ensure_collection("public", "Public").await.unwrap();
        store
            .upsert(&c.id, &c.owner_id, "A/1.json", &features("A", &["gmail"]), "{}")
            .await
            .unwrap();
        sqlx::query("UPDATE workflows SET category = NULL")
            .execute(store.pool())
            .await
            .unwrap();

        let summary = store.summary(&c.id).await.unwrap();
        assert_eq!(summary.by_category, vec![(None, 1)]);
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let store = memory_store().await;
        let c = store.ensure_collection("public", "Public").await.unwrap();
        assert!(store.find_by_origin(&c.id, "nope.json").await.unwrap().is_none());
    }
}
