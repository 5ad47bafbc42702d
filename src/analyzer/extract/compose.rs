//! Docker Compose extraction.
//!
//! A compose document declares many resources at once: one per service and
//! one per top-level network, volume, secret and config. Each resource keeps
//! the sub-tree under its key as its root.

use crate::analyzer::config::EnginePolicy;
use crate::analyzer::extract::{Extraction, Resource, codes, reserved, scalar_field};
use crate::analyzer::parser::{Document, LineIndex, Node, NodeValue};
use crate::analyzer::types::{ManifestFamily, Severity};
use std::collections::BTreeMap;

/// Top-level sections and the resource kind their entries become.
pub const SECTIONS: &[(&str, &str)] = &[
    ("services", "service"),
    ("networks", "network"),
    ("volumes", "volume"),
    ("secrets", "secret"),
    ("configs", "config"),
];

pub(crate) fn extract_compose(
    doc: &Document,
    root: &Node,
    policy: &EnginePolicy,
    index: &LineIndex,
    out: &mut Extraction,
) {
    if !root.get("services").is_some_and(Node::is_mapping) {
        out.findings.push(reserved(
            codes::MISSING_SERVICES,
            Severity::Error,
            "Compose file has no services mapping",
            doc.start,
        ));
        return;
    }

    let project = scalar_field(root, "name").unwrap_or_else(|| policy.default_namespace.clone());

    for (section, kind) in SECTIONS {
        let Some(entries) = root.get(section) else {
            continue;
        };
        for entry in entries.entries() {
            // `networks: {backend: }` declares a network with defaults
            let value = if entry.value.is_null() {
                Node::new(NodeValue::Mapping(Vec::new()), entry.value.start, entry.value.end)
            } else {
                entry.value.clone()
            };
            out.resources.push(Resource {
                family: ManifestFamily::Compose,
                api_version: None,
                kind: kind.to_string(),
                name: entry.key.clone(),
                namespace: project.clone(),
                labels: labels_of(&value),
                annotations: BTreeMap::new(),
                root: value,
                document: doc.index,
                position: entry.key_position(index),
            });
        }
    }
}

/// Compose labels may be a mapping or a list of `key=value` strings.
fn labels_of(node: &Node) -> BTreeMap<String, String> {
    let Some(labels) = node.get("labels") else {
        return Default::default();
    };
    if labels.is_mapping() {
        return labels.string_map();
    }
    labels
        .items()
        .iter()
        .filter_map(Node::as_str)
        .map(|item| match item.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (item.to_string(), String::new()),
        })
        .collect()
}
