//! Feature extraction for workflow documents.
//!
//! [`extract`] is a pure function: it derives the category, display name,
//! node count, integration set, and tag set of a [`SourceDocument`] without
//! touching the filesystem or the catalog.

use std::collections::BTreeSet;

use crate::models::{Features, SourceDocument, DEFAULT_CATEGORY};

const NOTIFICATION_SERVICES: &[&str] = &["slack", "discord", "telegram"];
const EMAIL_SERVICES: &[&str] = &["gmail", "sendgrid", "outlook"];
const DATA_SERVICES: &[&str] = &["sheets", "airtable"];

/// Classify a document. Never fails; an empty document yields zero nodes and
/// empty integration and tag sets.
pub fn extract(doc: &SourceDocument) -> Features {
    let integrations = integrations(doc);
    let tags = tags(doc, &integrations);

    Features {
        category: category_for(&doc.origin_path),
        name: display_name(doc),
        node_count: doc.nodes.len() as i64,
        integrations,
        tags,
    }
}

/// First path segment, or [`DEFAULT_CATEGORY`] for files at the root.
pub fn category_for(origin_path: &str) -> String {
    match origin_path.split_once('/') {
        Some((first, _)) if !first.is_empty() => first.to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

fn display_name(doc: &SourceDocument) -> String {
    if let Some(name) = doc.name.as_deref().map(str::trim) {
        if !name.is_empty() {
            return name.to_string();
        }
    }
    name_from_path(&doc.origin_path)
}

/// `"Email/send_daily_report.json"` -> `"Send Daily Report"`.
pub fn name_from_path(origin_path: &str) -> String {
    let file_name = origin_path.rsplit('/').next().unwrap_or(origin_path);
    let stem = match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    };

    let mut out = String::with_capacity(stem.len());
    let mut at_word_start = true;
    for c in stem.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Trailing dotted component of a node type, if there is one.
fn integration_of(node_type: &str) -> Option<&str> {
    let suffix = node_type.rsplit('.').next()?;
    if suffix.is_empty() {
        None
    } else {
        Some(suffix)
    }
}

fn integrations(doc: &SourceDocument) -> BTreeSet<String> {
    doc.nodes
        .iter()
        .filter_map(|n| n.node_type.as_deref())
        .filter_map(integration_of)
        .map(str::to_string)
        .collect()
}

fn tags(doc: &SourceDocument, integrations: &BTreeSet<String>) -> BTreeSet<String> {
    let mut tags = integrations.clone();

    // Case-sensitive on purpose; node types are lower-case by convention.
    let has_trigger = doc
        .nodes
        .iter()
        .filter_map(|n| n.node_type.as_deref())
        .any(|t| t.contains("trigger") || t.contains("webhook"));
    if has_trigger {
        tags.insert("trigger".to_string());
    }

    let any_of = |services: &[&str]| services.iter().any(|s| integrations.contains(*s));
    if any_of(NOTIFICATION_SERVICES) {
        tags.insert("notification".to_string());
    }
    if any_of(EMAIL_SERVICES) {
        tags.insert("email".to_string());
    }
    if any_of(DATA_SERVICES) {
        tags.insert("data".to_string());
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeDescriptor;

    fn doc(path: &str, name: Option<&str>, types: &[&str]) -> SourceDocument {
        SourceDocument {
            origin_path: path.to_string(),
            name: name.map(str::to_string),
            nodes: types
                .iter()
                .map(|t| NodeDescriptor {
                    node_type: Some(t.to_string()),
                    ..Default::default()
                })
                .collect(),
            payload: "{}".to_string(),
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn slack_webhook_scenario() {
        let d = doc(
            "Communication/slack.json",
            None,
            &["trigger.webhook", "actions.slack"],
        );
        let f = extract(&d);
        assert_eq!(f.name, "Slack");
        assert_eq!(f.category, "Communication");
        assert_eq!(f.node_count, 2);
        assert_eq!(f.integrations, set(&["webhook", "slack"]));
        assert_eq!(
            f.tags,
            set(&["webhook", "slack", "trigger", "notification"])
        );
    }

    #[test]
    fn category_derivation() {
        assert_eq!(category_for("Sales/crm/sync.json"), "Sales");
        assert_eq!(category_for("flow.json"), "General");
        assert_eq!(category_for("/flow.json"), "General");
    }

    #[test]
    fn name_falls_back_to_filename() {
        assert_eq!(name_from_path("a/send_daily_report.json"), "Send Daily Report");
        assert_eq!(name_from_path("my-flow.json"), "My-Flow");
        assert_eq!(name_from_path("already Upper.json"), "Already Upper");

        let blank = doc("x/blank_name.json", Some("   "), &[]);
        assert_eq!(extract(&blank).name, "Blank Name");

        let named = doc("x/file.json", Some("Lead Router"), &[]);
        assert_eq!(extract(&named).name, "Lead Router");
    }

    #[test]
    fn empty_document_has_no_tags() {
        let f = extract(&doc("empty.json", None, &[]));
        assert_eq!(f.node_count, 0);
        assert!(f.integrations.is_empty());
        assert!(f.tags.is_empty());
    }

    #[test]
    fn manual_trigger_yields_trigger_tag() {
        let f = extract(&doc("t.json", None, &["manual.trigger"]));
        assert!(f.tags.contains("trigger"));
    }

    #[test]
    fn trigger_match_is_case_sensitive() {
        let f = extract(&doc("t.json", None, &["Manual.Trigger"]));
        assert!(!f.tags.contains("trigger"));
        assert!(f.integrations.contains("Trigger"));
    }

    #[test]
    fn inferred_service_tags() {
        let f = extract(&doc(
            "Ops/report.json",
            None,
            &["actions.gmail", "actions.sheets", "actions.gmail", "http."],
        ));
        assert_eq!(f.integrations, set(&["gmail", "sheets"]));
        assert_eq!(f.tags, set(&["gmail", "sheets", "email", "data"]));
        assert_eq!(f.node_count, 4);
    }

    #[test]
    fn untyped_nodes_are_counted_but_skipped() {
        let mut d = doc("x.json", None, &["actions.discord"]);
        d.nodes.push(NodeDescriptor::default());
        let f = extract(&d);
        assert_eq!(f.node_count, 2);
        assert_eq!(f.integrations, set(&["discord"]));
        assert!(f.tags.contains("notification"));
    }

    #[test]
    fn extraction_is_deterministic() {
        let d = doc("A/b.json", None, &["x.slack", "y.airtable", "z.webhook"]);
        assert_eq!(extract(&d), extract(&d));
    }
}
