//! Resource model extraction.
//!
//! Turns parsed documents into [`Resource`]s. Only identity fields are read
//! here (`apiVersion`, `kind`, `metadata.*`); the rest of the tree is kept
//! as-is for rules and schema validation.

pub mod compose;
pub mod metadata;
pub mod workload;

pub use metadata::*;
pub use workload::*;

use crate::analyzer::config::EnginePolicy;
use crate::analyzer::parser::{Document, LineIndex, Node, ParsedInput};
use crate::analyzer::types::{Finding, ManifestFamily, Position, RuleCategory, Severity};
use std::collections::BTreeMap;

/// Reserved ids for findings produced outside the rule catalog.
pub mod codes {
    pub const YAML_SYNTAX: &str = "yaml-syntax";
    pub const INVALID_DOCUMENT: &str = "invalid-document";
    pub const MISSING_API_VERSION: &str = "missing-api-version";
    pub const MISSING_KIND: &str = "missing-kind";
    pub const MISSING_NAME: &str = "missing-name";
    pub const MISSING_SERVICES: &str = "missing-services";
}

/// A document promoted to registry status.
#[derive(Debug, Clone)]
pub struct Resource {
    pub family: ManifestFamily,
    pub api_version: Option<String>,
    pub kind: String,
    pub name: String,
    /// Resolved namespace. Empty for cluster-scoped kinds.
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// The resource's value tree.
    pub root: Node,
    /// Index of the owning document.
    pub document: usize,
    /// Where the resource is declared.
    pub position: Position,
}

impl Resource {
    /// Stable identifier, `Kind/namespace/name`.
    pub fn id(&self) -> String {
        resource_id(&self.kind, &self.namespace, &self.name)
    }

    pub fn line(&self) -> u32 {
        self.position.line
    }

    /// Position of a pointer inside the resource, or the declaration.
    pub fn position_of(&self, pointer: &str, index: &LineIndex) -> Position {
        self.root
            .pointer(pointer)
            .map(|n| n.position(index))
            .unwrap_or(self.position)
    }

    /// Position of the key holding `pointer`, or the declaration.
    ///
    /// Keys read better than values in reports about a whole block
    /// (`securityContext:` rather than its first child).
    pub fn key_position_of(&self, pointer: &str, index: &LineIndex) -> Position {
        let Some((parent, key)) = pointer.rsplit_once('/') else {
            return self.position;
        };
        let key = crate::analyzer::parser::node::unescape_segment(key);
        self.root
            .pointer(parent)
            .and_then(|p| p.entry(&key))
            .map(|e| e.key_position(index))
            .unwrap_or_else(|| self.position_of(pointer, index))
    }

    /// Whether the resource carries an annotation.
    pub fn has_annotation(&self, key: &str) -> bool {
        self.annotations.contains_key(key)
    }
}

/// Format a resource identifier.
pub fn resource_id(kind: &str, namespace: &str, name: &str) -> String {
    format!("{}/{}/{}", kind, namespace, name)
}

/// Output of [`extract`].
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub resources: Vec<Resource>,
    pub findings: Vec<Finding>,
    /// Non-empty documents seen, including the ones that were skipped.
    pub documents_processed: usize,
}

/// Detect the manifest family from the first non-empty document.
pub fn detect_family(parsed: &ParsedInput) -> ManifestFamily {
    let Some(root) = parsed.non_empty().find_map(|d| d.root.as_ref()) else {
        return ManifestFamily::Kubernetes;
    };
    let has_services = root.get("services").is_some_and(Node::is_mapping);
    if has_services && root.get("kind").is_none() {
        ManifestFamily::Compose
    } else {
        ManifestFamily::Kubernetes
    }
}

/// Extract resources from parsed documents.
pub fn extract(parsed: &ParsedInput, family: ManifestFamily, policy: &EnginePolicy) -> Extraction {
    let mut out = Extraction::default();
    for doc in parsed.non_empty() {
        out.documents_processed += 1;
        let Some(root) = doc.root.as_ref() else {
            continue;
        };
        if !root.is_mapping() {
            out.findings.push(reserved(
                codes::INVALID_DOCUMENT,
                Severity::Error,
                format!(
                    "Document {} is a {}, expected a mapping",
                    doc.index + 1,
                    root.type_name()
                ),
                doc.start,
            ));
            continue;
        }
        match family {
            ManifestFamily::Kubernetes => extract_kubernetes(doc, root, policy, &mut out),
            ManifestFamily::Compose => {
                compose::extract_compose(doc, root, policy, &parsed.line_index, &mut out)
            }
        }
    }
    log::debug!(
        "extracted {} resource(s) from {} document(s)",
        out.resources.len(),
        out.documents_processed
    );
    out
}

fn extract_kubernetes(
    doc: &Document,
    root: &Node,
    policy: &EnginePolicy,
    out: &mut Extraction,
) {
    let api_version = scalar_field(root, "apiVersion");
    if api_version.is_none() {
        out.findings.push(reserved(
            codes::MISSING_API_VERSION,
            Severity::Error,
            "Resource is missing apiVersion",
            doc.start,
        ));
    }

    let Some(kind) = scalar_field(root, "kind") else {
        out.findings.push(reserved(
            codes::MISSING_KIND,
            Severity::Error,
            "Resource is missing kind",
            doc.start,
        ));
        return;
    };

    let Some(name) = metadata_name(root) else {
        out.findings.push(reserved(
            codes::MISSING_NAME,
            Severity::Error,
            format!("{} is missing metadata.name", kind),
            doc.start,
        ));
        return;
    };

    let namespace = policy.resolve_namespace(&kind, metadata_namespace(root).as_deref());
    out.resources.push(Resource {
        family: ManifestFamily::Kubernetes,
        api_version,
        name,
        namespace,
        labels: metadata_labels(root),
        annotations: metadata_annotations(root),
        root: root.clone(),
        document: doc.index,
        position: doc.start,
        kind,
    });
}

pub(crate) fn reserved(
    code: &str,
    severity: Severity,
    message: impl Into<String>,
    position: Position,
) -> Finding {
    Finding::new(code, severity, RuleCategory::Schema, message, position)
}
