//! Import pipeline orchestration.
//!
//! Coordinates the full import flow: discovery → collection bootstrap →
//! batched read/extract/upsert → counters. Batches run strictly one after
//! another in discovery order; the items inside a batch run concurrently and
//! the next batch starts only once every item of the current one finished.
//!
//! Per-item failures (read, parse, persistence, timeout) are counted, logged
//! with the origin path, and never abort the run.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ImportConfig};
use crate::db;
use crate::error::IngestError;
use crate::extract::extract;
use crate::models::{CatalogSummary, CollectionRef, Features, UpsertOutcome};
use crate::migrate;
use crate::progress::{ImportProgressEvent, ImportProgressReporter, ProgressMode, PROGRESS_EVERY};
use crate::reader;
use crate::report::render_report;
use crate::sqlite_store::SqliteStore;
use crate::store::CatalogStore;

/// Upper bound on a single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Everything a single import run needs besides the store.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub root: PathBuf,
    pub import: ImportConfig,
    /// Process at most this many discovered documents.
    pub limit: Option<usize>,
    /// Read and classify only; nothing is written.
    pub dry_run: bool,
}

/// Counters mutated concurrently by the items of a batch.
#[derive(Debug, Default)]
pub struct IngestionStats {
    total: AtomicU64,
    imported: AtomicU64,
    errors: AtomicU64,
    created: AtomicU64,
    updated: AtomicU64,
}

impl IngestionStats {
    /// Count one successful item. Returns the new imported count.
    fn record_success(&self, outcome: Option<UpsertOutcome>) -> u64 {
        match outcome {
            Some(UpsertOutcome::Created) => {
                self.created.fetch_add(1, Ordering::Relaxed);
            }
            Some(UpsertOutcome::Updated) => {
                self.updated.fetch_add(1, Ordering::Relaxed);
            }
            None => {}
        }
        self.imported.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            imported: self.imported.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
        }
    }
}

/// Final counter values of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total: u64,
    pub imported: u64,
    pub errors: u64,
    pub created: u64,
    pub updated: u64,
}

/// One document that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub origin_path: String,
    pub reason: String,
}

/// Outcome of [`run_import`].
#[derive(Debug, Clone)]
pub struct ImportReport {
    /// `None` for dry runs, which never touch the store.
    pub collection: Option<CollectionRef>,
    pub stats: StatsSnapshot,
    pub failures: Vec<ItemFailure>,
    /// Category counts of the parsed documents, filled for dry runs only.
    pub dry_run_summary: Option<CatalogSummary>,
}

struct ItemContext<'a> {
    root: &'a std::path::Path,
    store: &'a dyn CatalogStore,
    collection: Option<&'a CollectionRef>,
    import: &'a ImportConfig,
    stats: &'a IngestionStats,
    reporter: &'a dyn ImportProgressReporter,
    total: u64,
}

/// `wfc import`: run an import against the configured SQLite catalog and
/// print the run summary.
///
/// Item failures only show up in the summary. A failed summary query is
/// logged and the command still succeeds, since the import already
/// completed.
pub async fn run_import_cmd(
    config: &Config,
    options: &ImportOptions,
    progress: ProgressMode,
) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let store = SqliteStore::new(pool);
    let reporter = progress.reporter();

    let report = run_import(&store, options, reporter.as_ref()).await?;

    let summary = match (&report.collection, &report.dry_run_summary) {
        (_, Some(dry)) => Some(dry.clone()),
        (Some(collection), None) => match store.summary(&collection.id).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!(error = %e, "catalog summary query failed");
                None
            }
        },
        (None, None) => None,
    };

    print!("{}", render_report(&report, summary.as_ref()));

    store.pool().close().await;
    Ok(())
}

/// Run one import. Fails only when discovery or collection bootstrap fails.
pub async fn run_import(
    store: &dyn CatalogStore,
    options: &ImportOptions,
    reporter: &dyn ImportProgressReporter,
) -> Result<ImportReport, IngestError> {
    reporter.report(ImportProgressEvent::Discovering {
        root: options.root.display().to_string(),
    });
    let mut paths = reader::discover(&options.root, &options.import)?;
    if let Some(limit) = options.limit {
        paths.truncate(limit);
    }

    let stats = IngestionStats::default();
    stats.total.store(paths.len() as u64, Ordering::Relaxed);
    info!(
        root = %options.root.display(),
        documents = paths.len(),
        batch_size = options.import.batch_size,
        dry_run = options.dry_run,
        "discovered documents"
    );

    // Bootstrapped once, before any batch starts
    let collection = if options.dry_run {
        None
    } else {
        let collection = store
            .ensure_collection(&options.import.collection, &options.import.collection_name)
            .await?;
        info!(collection = %collection.slug, id = %collection.id, "using collection");
        Some(collection)
    };

    let ctx = ItemContext {
        root: &options.root,
        store,
        collection: collection.as_ref(),
        import: &options.import,
        stats: &stats,
        reporter,
        total: paths.len() as u64,
    };

    let batch_size = options.import.batch_size.max(1);
    let batch_count = paths.len().div_ceil(batch_size);
    let mut failures = Vec::new();
    let mut categories: HashMap<Option<String>, i64> = HashMap::new();
    let mut parsed_nodes = 0i64;

    for (index, batch) in paths.chunks(batch_size).enumerate() {
        let results = join_all(batch.iter().map(|origin| run_item(&ctx, origin))).await;

        for result in results {
            match result {
                Ok(features) if options.dry_run => {
                    parsed_nodes += features.node_count;
                    *categories.entry(Some(features.category)).or_default() += 1;
                }
                Ok(_) => {}
                Err(failure) => failures.push(failure),
            }
        }
        debug!(batch = index + 1, batches = batch_count, "batch complete");
    }

    let snapshot = stats.snapshot();
    info!(
        total = snapshot.total,
        imported = snapshot.imported,
        errors = snapshot.errors,
        "import finished"
    );

    let dry_run_summary = options.dry_run.then(|| {
        let mut by_category: Vec<_> = categories.into_iter().collect();
        crate::store::order_categories(&mut by_category);
        CatalogSummary {
            total_records: snapshot.imported as i64,
            total_nodes: parsed_nodes,
            by_category,
        }
    });

    Ok(ImportReport {
        collection,
        stats: snapshot,
        failures,
        dry_run_summary,
    })
}

/// Process one document and update the counters. Never propagates an error.
async fn run_item(ctx: &ItemContext<'_>, origin: &str) -> Result<Features, ItemFailure> {
    let result = match ctx.import.item_timeout_secs {
        0 => process_item(ctx, origin).await,
        secs => match tokio::time::timeout(Duration::from_secs(secs), process_item(ctx, origin))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(IngestError::Timeout(secs)),
        },
    };

    match result {
        Ok((features, outcome)) => {
            let imported = ctx.stats.record_success(outcome);
            if imported % PROGRESS_EVERY == 0 {
                ctx.reporter.report(ImportProgressEvent::Importing {
                    n: imported,
                    total: ctx.total,
                });
            }
            Ok(features)
        }
        Err(e) => {
            ctx.stats.record_error();
            if e.is_item_level() {
                warn!(origin = %origin, error = %e, "failed to import document");
            } else {
                error!(origin = %origin, error = %e, "unexpected error while importing document");
            }
            Err(ItemFailure {
                origin_path: origin.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

async fn process_item(
    ctx: &ItemContext<'_>,
    origin: &str,
) -> Result<(Features, Option<UpsertOutcome>), IngestError> {
    let doc = reader::read_document(ctx.root, origin).await?;
    let features = extract(&doc);

    let Some(collection) = ctx.collection else {
        return Ok((features, None));
    };

    let existing = with_retry(ctx.import, origin, || {
        ctx.store.find_by_origin(&collection.id, origin)
    })
    .await?;

    let outcome = with_retry(ctx.import, origin, || {
        ctx.store.upsert(
            &collection.id,
            &collection.owner_id,
            origin,
            &features,
            &doc.payload,
        )
    })
    .await?;

    debug!(
        origin = %origin,
        existed = existing.is_some(),
        outcome = ?outcome,
        nodes = features.node_count,
        "document stored"
    );
    Ok((features, Some(outcome)))
}

/// Retry persistence failures with exponential backoff. Other errors return
/// immediately.
async fn with_retry<T, F, Fut>(
    import: &ImportConfig,
    origin: &str,
    mut op: F,
) -> Result<T, IngestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IngestError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < import.max_retries => {
                let delay = backoff_delay(import.retry_backoff_ms, attempt);
                debug!(origin = %origin, attempt = attempt + 1, error = %e, "retrying store call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(10);
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}
