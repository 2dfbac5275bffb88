//! Core data models used throughout the workflow catalog.
//!
//! A [`SourceDocument`] is read from disk, classified into [`Features`], and
//! persisted as a [`CatalogRecord`] under a [`CollectionRef`].

use std::collections::BTreeSet;

use serde::Serialize;

/// Category assigned to documents that sit directly at the ingestion root.
pub const DEFAULT_CATEGORY: &str = "General";

/// One parsed workflow document.
///
/// Only `name` and `nodes` are interpreted; `payload` is the file content
/// exactly as read and is what gets persisted.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Path relative to the ingestion root, `/`-separated.
    pub origin_path: String,
    pub name: Option<String>,
    pub nodes: Vec<NodeDescriptor>,
    pub payload: String,
}

/// One step of a workflow document.
#[derive(Debug, Clone, Default)]
pub struct NodeDescriptor {
    /// Dotted type string, e.g. `actions.slack`.
    pub node_type: Option<String>,
    /// Everything else on the node, uninterpreted.
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Classification derived from a [`SourceDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Features {
    pub category: String,
    pub name: String,
    pub node_count: i64,
    pub integrations: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

/// Collection (workspace) that owns catalog records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionRef {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub owner_id: String,
}

/// Persisted, classified form of a workflow document.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogRecord {
    pub id: String,
    pub collection_id: String,
    pub creator_id: String,
    pub origin_path: String,
    pub name: String,
    pub payload: String,
    pub node_count: i64,
    pub integrations: Vec<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub active: bool,
    pub public: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Result of a successful upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Post-run aggregate over one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    pub total_records: i64,
    pub total_nodes: i64,
    /// `(category, count)`, highest count first.
    pub by_category: Vec<(Option<String>, i64)>,
}
