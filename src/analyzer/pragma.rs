//! Annotation-based rule ignoring.
//!
//! Supports `ignore-check.manifest-lint.io/<rule-id>` annotations to disable
//! specific rules for individual resources. Compose services have no
//! annotations, so their `labels` are read instead.

use crate::analyzer::extract::Resource;
use crate::analyzer::types::ManifestFamily;
use std::collections::BTreeMap;

/// Prefix for ignore annotations.
pub const IGNORE_ANNOTATION_PREFIX: &str = "ignore-check.manifest-lint.io/";

fn pragma_source(resource: &Resource) -> &BTreeMap<String, String> {
    match resource.family {
        ManifestFamily::Kubernetes => &resource.annotations,
        ManifestFamily::Compose => &resource.labels,
    }
}

/// Check if a specific rule should be ignored for a resource.
pub fn should_ignore_rule(resource: &Resource, rule: &str) -> bool {
    let key = format!("{}{}", IGNORE_ANNOTATION_PREFIX, rule);
    pragma_source(resource).contains_key(&key)
}
