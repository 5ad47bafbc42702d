//! Metadata extraction utilities.

use crate::analyzer::parser::Node;
use std::collections::BTreeMap;

/// A scalar field rendered as a non-empty string.
pub fn scalar_field(node: &Node, key: &str) -> Option<String> {
    node.get(key)
        .and_then(Node::scalar_string)
        .filter(|s| !s.is_empty())
}

/// `metadata.name`.
pub fn metadata_name(root: &Node) -> Option<String> {
    root.get("metadata").and_then(|m| scalar_field(m, "name"))
}

/// `metadata.namespace`.
pub fn metadata_namespace(root: &Node) -> Option<String> {
    root.get("metadata").and_then(|m| scalar_field(m, "namespace"))
}

/// `metadata.labels`, empty when absent or not a mapping.
pub fn metadata_labels(root: &Node) -> BTreeMap<String, String> {
    root.path(&["metadata", "labels"])
        .map(Node::string_map)
        .unwrap_or_default()
}

/// `metadata.annotations`, empty when absent or not a mapping.
pub fn metadata_annotations(root: &Node) -> BTreeMap<String, String> {
    root.path(&["metadata", "annotations"])
        .map(Node::string_map)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parser::parse;

    #[test]
    fn test_mistyped_metadata_is_ignored() {
        let parsed = parse("metadata:\n  name: [a]\n  labels: nope\n");
        let root = parsed.documents[0].root.as_ref().unwrap();
        assert_eq!(metadata_name(root), None);
        assert!(metadata_labels(root).is_empty());
        assert!(metadata_annotations(root).is_empty());
    }

    #[test]
    fn test_empty_name_is_missing() {
        let parsed = parse("metadata:\n  name: \"\"\n");
        let root = parsed.documents[0].root.as_ref().unwrap();
        assert_eq!(metadata_name(root), None);
    }
}
