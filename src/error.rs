//! Error taxonomy for the ingestion pipeline.
//!
//! Item-level errors (`Read`, `Parse`, `Persistence`, `Timeout`) are counted
//! and logged by the batch coordinator; they never abort a run. `Discovery`
//! is fatal. `ReportQuery` is logged after the import already completed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("discovery failed for {root}: {reason}")]
    Discovery { root: String, reason: String },

    #[error("read error: {0}")]
    Read(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Store failure from a backend that does not speak sqlx.
    #[error("persistence error: {0}")]
    Store(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("report query failed: {0}")]
    ReportQuery(String),
}

impl IngestError {
    /// True for failures that are isolated to a single document.
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            Self::Read(_) | Self::Parse(_) | Self::Persistence(_) | Self::Store(_) | Self::Timeout(_)
        )
    }

    /// Only store contention is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Store(_))
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let parse = IngestError::Parse("bad".into());
        assert!(parse.is_item_level());
        assert!(!parse.is_retryable());

        let store = IngestError::Store("locked".into());
        assert!(store.is_item_level());
        assert!(store.is_retryable());

        let discovery = IngestError::Discovery {
            root: "/nope".into(),
            reason: "missing".into(),
        };
        assert!(!discovery.is_item_level());
        assert!(discovery.to_string().contains("/nope"));
    }
}
