//! Run summaries and catalog statistics.
//!
//! [`render_report`] turns the counters of an import plus the post-run
//! catalog aggregate into the text printed at the end of `wfc import`.
//! [`run_stats`] prints the same catalog aggregate on its own for `wfc stats`.

use std::fmt::Write;

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::ingest::{ImportReport, StatsSnapshot};
use crate::models::CatalogSummary;
use crate::sqlite_store::SqliteStore;
use crate::store::CatalogStore;

/// Label for records whose category is missing.
const UNCATEGORIZED: &str = "Uncategorized";
/// Failed origin paths listed in full before the rest is summarized.
const MAX_LISTED_FAILURES: usize = 20;

/// `imported / total` as a percentage, or `None` when nothing was found.
pub fn success_rate(stats: &StatsSnapshot) -> Option<f64> {
    if stats.total == 0 {
        None
    } else {
        Some(stats.imported as f64 * 100.0 / stats.total as f64)
    }
}

pub fn render_report(report: &ImportReport, summary: Option<&CatalogSummary>) -> String {
    let stats = &report.stats;
    let mut out = String::new();

    match &report.collection {
        Some(collection) => writeln!(out, "import {}", collection.slug).ok(),
        None => writeln!(out, "import (dry-run)").ok(),
    };
    writeln!(out, "  total: {}", stats.total).ok();
    writeln!(out, "  imported: {}", stats.imported).ok();
    writeln!(out, "  errors: {}", stats.errors).ok();
    if let Some(rate) = success_rate(stats) {
        writeln!(out, "  success rate: {:.1}%", rate).ok();
    }
    if report.collection.is_some() {
        writeln!(out, "  created: {}", stats.created).ok();
        writeln!(out, "  updated: {}", stats.updated).ok();
    }

    if let Some(summary) = summary {
        out.push('\n');
        render_summary(&mut out, summary);
    }

    if !report.failures.is_empty() {
        out.push('\n');
        writeln!(out, "  failed documents:").ok();
        for failure in report.failures.iter().take(MAX_LISTED_FAILURES) {
            writeln!(out, "    {}: {}", failure.origin_path, failure.reason).ok();
        }
        if report.failures.len() > MAX_LISTED_FAILURES {
            writeln!(
                out,
                "    ... and {} more",
                report.failures.len() - MAX_LISTED_FAILURES
            )
            .ok();
        }
    }

    writeln!(out, "ok").ok();
    out
}

fn render_summary(out: &mut String, summary: &CatalogSummary) {
    writeln!(out, "  workflows: {}", summary.total_records).ok();
    writeln!(out, "  total nodes: {}", summary.total_nodes).ok();

    if summary.by_category.is_empty() {
        return;
    }
    writeln!(out, "  by category:").ok();
    for (category, count) in &summary.by_category {
        let label = category.as_deref().unwrap_or(UNCATEGORIZED);
        writeln!(out, "    {:<32} {:>8}", label, count).ok();
    }
}

/// `wfc stats`: print the catalog aggregate for one collection.
pub async fn run_stats(config: &Config, slug: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    let Some(collection) = store.find_collection(slug).await? else {
        store.pool().close().await;
        bail!("collection not found: {}", slug);
    };
    let summary = store.summary(&collection.id).await?;

    let mut out = String::new();
    writeln!(out, "Workflow Catalog: {}", collection.name).ok();
    writeln!(out, "================").ok();
    render_summary(&mut out, &summary);
    print!("{}", out);

    store.pool().close().await;
    Ok(())
}
