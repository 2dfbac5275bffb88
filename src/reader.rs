//! Document discovery and parsing.
//!
//! [`discover`] walks the ingestion root once and returns the sorted,
//! deduplicated list of origin paths. [`read_document`] reads and parses a
//! single document; its failures are per-item and never abort a run.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::path::{Component, Path};
use walkdir::WalkDir;

use crate::config::ImportConfig;
use crate::error::IngestError;
use crate::models::{NodeDescriptor, SourceDocument};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn discover(root: &Path, options: &ImportConfig) -> Result<Vec<String>, IngestError> {
    if !root.is_dir() {
        return Err(IngestError::Discovery {
            root: root.display().to_string(),
            reason: "root directory does not exist or is not a directory".to_string(),
        });
    }

    let include_set = build_globset(&options.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/node_modules/**".to_string()];
    default_excludes.extend(options.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&default_excludes)?;

    let mut paths = Vec::new();

    let walker = WalkDir::new(root).follow_links(options.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(IngestError::Discovery {
                    root: root.display().to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let origin = normalize(relative);

        if exclude_set.is_match(&origin) || !include_set.is_match(&origin) {
            continue;
        }

        paths.push(origin);
    }

    // Sorted and unique so no two items in a run share an origin path
    paths.sort();
    paths.dedup();

    Ok(paths)
}

/// Join path components with `/` regardless of platform.
pub fn normalize(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub async fn read_document(root: &Path, origin_path: &str) -> Result<SourceDocument, IngestError> {
    let bytes = tokio::fs::read(root.join(origin_path)).await?;
    parse_document(origin_path, bytes)
}

pub fn parse_document(origin_path: &str, bytes: Vec<u8>) -> Result<SourceDocument, IngestError> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);
    let value: Value = serde_json::from_slice(body)?;

    let Value::Object(obj) = value else {
        return Err(IngestError::Parse(
            "top-level value is not a JSON object".to_string(),
        ));
    };

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string);

    let nodes = obj
        .get("nodes")
        .and_then(Value::as_array)
        .map(|nodes| nodes.iter().map(node_descriptor).collect())
        .unwrap_or_default();

    let payload = String::from_utf8(bytes).map_err(|e| IngestError::Parse(e.to_string()))?;

    Ok(SourceDocument {
        origin_path: origin_path.to_string(),
        name,
        nodes,
        payload,
    })
}

fn node_descriptor(value: &Value) -> NodeDescriptor {
    match value {
        Value::Object(fields) => {
            let mut fields = fields.clone();
            let node_type = match fields.remove("type") {
                Some(Value::String(t)) => Some(t),
                Some(other) => {
                    fields.insert("type".to_string(), other);
                    None
                }
                None => None,
            };
            NodeDescriptor { node_type, fields }
        }
        _ => NodeDescriptor::default(),
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, IngestError> {
    let invalid = |e: globset::Error| IngestError::Discovery {
        root: String::new(),
        reason: format!("invalid glob: {}", e),
    };
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).map_err(invalid)?);
    }
    builder.build().map_err(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("Communication")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("Communication/slack.json"), "{}").unwrap();
        fs::write(root.join("root_flow.json"), "{}").unwrap();
        fs::write(root.join("notes.md"), "# not a workflow").unwrap();
        fs::write(root.join("node_modules/pkg/package.json"), "{}").unwrap();
        tmp
    }

    #[test]
    fn discovers_json_recursively_sorted() {
        let tmp = tree();
        let paths = discover(tmp.path(), &ImportConfig::default()).unwrap();
        assert_eq!(paths, vec!["Communication/slack.json", "root_flow.json"]);
    }

    #[test]
    fn exclude_globs_apply() {
        let tmp = tree();
        let opts = ImportConfig {
            exclude_globs: vec!["Communication/**".to_string()],
            ..Default::default()
        };
        let paths = discover(tmp.path(), &opts).unwrap();
        assert_eq!(paths, vec!["root_flow.json"]);
    }

    #[test]
    fn missing_root_is_discovery_error() {
        let tmp = TempDir::new().unwrap();
        let err = discover(&tmp.path().join("absent"), &ImportConfig::default()).unwrap_err();
        assert!(matches!(err, IngestError::Discovery { .. }));
    }

    #[test]
    fn parses_envelope_and_keeps_payload() {
        let raw = r##"{"name":"Flow","nodes":[{"type":"actions.slack","channel":"#ops"},{"id":2},7],"extra":true}"##;
        let doc = parse_document("a/flow.json", raw.as_bytes().to_vec()).unwrap();
        assert_eq!(doc.name.as_deref(), Some("Flow"));
        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.nodes[0].node_type.as_deref(), Some("actions.slack"));
        assert_eq!(doc.nodes[0].fields["channel"], "#ops");
        assert!(doc.nodes[1].node_type.is_none());
        assert_eq!(doc.payload, raw);
    }

    #[test]
    fn non_string_name_and_missing_nodes_are_tolerated() {
        let doc = parse_document("x.json", br#"{"name": 42}"#.to_vec()).unwrap();
        assert!(doc.name.is_none());
        assert!(doc.nodes.is_empty());
    }

    #[test]
    fn malformed_content_is_parse_error() {
        let err = parse_document("x.json", b"{ not json".to_vec()).unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));

        let err = parse_document("x.json", b"[1, 2]".to_vec()).unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn byte_order_mark_is_accepted() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(br#"{"nodes":[]}"#);
        assert!(parse_document("bom.json", bytes).is_ok());
    }

    #[tokio::test]
    async fn unreadable_file_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let err = read_document(tmp.path(), "gone.json").await.unwrap_err();
        assert!(matches!(err, IngestError::Read(_)));
    }
}
