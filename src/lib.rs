//! # Workflow Catalog
//!
//! Batch ingestion of workflow-definition documents into a classified,
//! deduplicated catalog.
//!
//! A source tree of JSON workflow documents (each a list of typed "nodes") is
//! walked, every document is classified (category, name, node count,
//! integrations, tags), and the result is upserted into a SQLite catalog
//! keyed by `(collection, origin path)`. Re-running an import over the same
//! tree updates records in place and never duplicates them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────┐
//! │  Reader  │──▶│  Extract  │──▶│ CatalogStore │──▶│  Report  │
//! │ walk+parse│  │ classify  │   │ SQLite/memory│   │ summary  │
//! └──────────┘   └───────────┘   └──────────────┘   └──────────┘
//!        ▲                               ▲
//!        └──────── ingest (batches) ─────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wfc init                         # create database
//! wfc import --root ./workflows    # import a source tree
//! wfc stats                        # catalog breakdown by category
//! wfc show Communication/slack.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`reader`] | Document discovery and parsing |
//! | [`extract`] | Feature extraction and tag inference |
//! | [`store`] | Catalog store trait + in-memory store |
//! | [`sqlite_store`] | SQLite catalog store |
//! | [`ingest`] | Batched import pipeline |
//! | [`report`] | Run summary and catalog stats |
//! | [`progress`] | Progress reporting on stderr |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod reader;
pub mod report;
pub mod show;
pub mod sqlite_store;
pub mod store;
