//! Resource registry.
//!
//! Built once per run from extracted resources and read-only afterwards.
//! Identity is (kind, namespace, name): references in manifests name a
//! kind, never an apiVersion, so two versions of one kind collide.

use crate::analyzer::extract::Resource;
use crate::analyzer::parser::Node;
use std::collections::{BTreeMap, HashMap};

/// How an empty label selector is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptySelector {
    /// `{}` selects nothing (Service `spec.selector`).
    MatchNothing,
    /// `{}` selects every candidate (NetworkPolicy `podSelector`,
    /// PodDisruptionBudget `selector`).
    MatchEverything,
}

type Key = (String, String, String);

/// Index of the resources declared in one input.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Vec<Resource>,
    by_key: HashMap<Key, usize>,
    by_kind: BTreeMap<String, Vec<usize>>,
    by_namespace: BTreeMap<String, Vec<usize>>,
    duplicates: Vec<(usize, usize)>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of resources.
    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        let mut registry = Self::new();
        for resource in resources {
            registry.add(resource);
        }
        registry
    }

    /// Register a resource.
    ///
    /// Returns `false` when the identity was already taken. The resource is
    /// still listed, but lookups by name keep returning the first one.
    pub fn add(&mut self, resource: Resource) -> bool {
        let idx = self.resources.len();
        let key = (
            resource.kind.clone(),
            resource.namespace.clone(),
            resource.name.clone(),
        );
        self.by_kind
            .entry(resource.kind.clone())
            .or_default()
            .push(idx);
        self.by_namespace
            .entry(resource.namespace.clone())
            .or_default()
            .push(idx);
        self.resources.push(resource);

        match self.by_key.get(&key) {
            Some(&original) => {
                log::debug!("duplicate resource {}/{}/{}", key.0, key.1, key.2);
                self.duplicates.push((original, idx));
                false
            }
            None => {
                self.by_key.insert(key, idx);
                true
            }
        }
    }

    /// Every resource in registration order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Resource> {
        self.resources.get(index)
    }

    /// Resources of one kind, in registration order.
    pub fn get_by_type(&self, kind: &str) -> Vec<&Resource> {
        self.indexes(self.by_kind.get(kind))
    }

    pub fn get_by_qualified_name(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Option<&Resource> {
        let key = (kind.to_string(), namespace.to_string(), name.to_string());
        self.by_key.get(&key).map(|&i| &self.resources[i])
    }

    /// Resources in a namespace. `""` is the cluster scope.
    pub fn get_by_namespace(&self, namespace: &str) -> Vec<&Resource> {
        self.indexes(self.by_namespace.get(namespace))
    }

    /// Resources whose labels contain every selector pair.
    pub fn get_by_label_selector(
        &self,
        selector: &BTreeMap<String, String>,
        empty: EmptySelector,
    ) -> Vec<&Resource> {
        self.resources
            .iter()
            .filter(|r| selector_matches(selector, &r.labels, empty))
            .collect()
    }

    /// (original, shadowed) index pairs for colliding identities.
    pub fn duplicates(&self) -> &[(usize, usize)] {
        &self.duplicates
    }

    /// Number of resources per kind.
    pub fn type_counts(&self) -> BTreeMap<String, usize> {
        self.by_kind
            .iter()
            .map(|(kind, idx)| (kind.clone(), idx.len()))
            .collect()
    }

    fn indexes(&self, idx: Option<&Vec<usize>>) -> Vec<&Resource> {
        idx.map(|v| v.iter().map(|&i| &self.resources[i]).collect())
            .unwrap_or_default()
    }
}

/// Subset match of a selector against a label set.
pub fn selector_matches(
    selector: &BTreeMap<String, String>,
    labels: &BTreeMap<String, String>,
    empty: EmptySelector,
) -> bool {
    if selector.is_empty() {
        return empty == EmptySelector::MatchEverything;
    }
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// A Kubernetes label selector: `matchLabels` plus `matchExpressions`.
///
/// A bare string map (Service `spec.selector`) parses as `matchLabels` only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
    pub expressions: Vec<SelectorExpression>,
}

/// One `matchExpressions` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorExpression {
    pub key: String,
    pub operator: String,
    pub values: Vec<String>,
}

impl SelectorExpression {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator.as_str() {
            "In" => value.is_some_and(|v| self.values.contains(v)),
            "NotIn" => value.is_none_or(|v| !self.values.contains(v)),
            "Exists" => value.is_some(),
            "DoesNotExist" => value.is_none(),
            // Unknown operators select nothing
            _ => false,
        }
    }
}

impl LabelSelector {
    /// Selector from a plain label map.
    pub fn from_labels(match_labels: BTreeMap<String, String>) -> Self {
        Self {
            match_labels,
            expressions: Vec::new(),
        }
    }

    /// Parse a `{matchLabels, matchExpressions}` node.
    pub fn from_node(node: &Node) -> Self {
        let match_labels = node
            .get("matchLabels")
            .map(Node::string_map)
            .unwrap_or_default();
        let expressions = node
            .get("matchExpressions")
            .map(Node::items)
            .unwrap_or_default()
            .iter()
            .filter_map(|e| {
                Some(SelectorExpression {
                    key: e.get("key")?.scalar_string()?,
                    operator: e.get("operator")?.scalar_string()?,
                    values: e
                        .get("values")
                        .map(Node::items)
                        .unwrap_or_default()
                        .iter()
                        .filter_map(Node::scalar_string)
                        .collect(),
                })
            })
            .collect();
        Self {
            match_labels,
            expressions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.expressions.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>, empty: EmptySelector) -> bool {
        if self.is_empty() {
            return empty == EmptySelector::MatchEverything;
        }
        self.match_labels.iter().all(|(k, v)| labels.get(k) == Some(v))
            && self.expressions.iter().all(|e| e.matches(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parser::{NodeValue, parse};
    use crate::analyzer::types::{ManifestFamily, Position};

    fn resource(kind: &str, namespace: &str, name: &str, labels: &[(&str, &str)]) -> Resource {
        Resource {
            family: ManifestFamily::Kubernetes,
            api_version: Some("v1".to_string()),
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            annotations: BTreeMap::new(),
            root: Node::new(NodeValue::Mapping(Vec::new()), 0, 0),
            document: 0,
            position: Position::start(),
        }
    }

    fn selector(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_lookups_are_idempotent() {
        let registry = ResourceRegistry::from_resources(vec![
            resource("ConfigMap", "default", "a", &[]),
            resource("ConfigMap", "prod", "a", &[]),
            resource("Secret", "default", "s", &[]),
        ]);

        for _ in 0..2 {
            assert_eq!(registry.get_by_type("ConfigMap").len(), 2);
            assert_eq!(registry.get_by_namespace("default").len(), 2);
            assert_eq!(
                registry
                    .get_by_qualified_name("ConfigMap", "default", "a")
                    .map(|r| r.namespace.as_str()),
                Some("default")
            );
        }
        assert!(registry.get_by_qualified_name("ConfigMap", "dev", "a").is_none());
        assert!(registry.get_by_type("Pod").is_empty());
    }

    #[test]
    fn test_duplicates_shadow_but_stay_listed() {
        let mut registry = ResourceRegistry::new();
        assert!(registry.add(resource("Service", "default", "web", &[("v", "1")])));
        assert!(!registry.add(resource("Service", "default", "web", &[("v", "2")])));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.duplicates(), &[(0, 1)]);
        let found = registry.get_by_qualified_name("Service", "default", "web").unwrap();
        assert_eq!(found.labels.get("v").map(String::as_str), Some("1"));
        assert_eq!(registry.type_counts().get("Service"), Some(&2));
    }

    #[test]
    fn test_label_selector_subset() {
        let registry = ResourceRegistry::from_resources(vec![
            resource("Pod", "default", "a", &[("app", "web"), ("tier", "front")]),
            resource("Pod", "default", "b", &[("app", "web")]),
            resource("Pod", "default", "c", &[("app", "db")]),
        ]);

        let hits = registry
            .get_by_label_selector(&selector(&[("app", "web")]), EmptySelector::MatchNothing);
        assert_eq!(hits.len(), 2);

        let hits = registry.get_by_label_selector(
            &selector(&[("app", "web"), ("tier", "front")]),
            EmptySelector::MatchNothing,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "a");
    }

    #[test]
    fn test_empty_selector_policy() {
        let registry = ResourceRegistry::from_resources(vec![
            resource("Pod", "default", "a", &[("app", "web")]),
            resource("Pod", "default", "b", &[]),
        ]);
        let empty = BTreeMap::new();
        assert!(registry.get_by_label_selector(&empty, EmptySelector::MatchNothing).is_empty());
        assert_eq!(
            registry.get_by_label_selector(&empty, EmptySelector::MatchEverything).len(),
            2
        );
    }

    #[test]
    fn test_label_selector_expressions() {
        let parsed = parse(
            "matchLabels:\n  app: web\nmatchExpressions:\n- key: tier\n  operator: In\n  values: [front, edge]\n- key: canary\n  operator: DoesNotExist\n",
        );
        let sel = LabelSelector::from_node(parsed.documents[0].root.as_ref().unwrap());
        assert_eq!(sel.expressions.len(), 2);

        let hit = selector(&[("app", "web"), ("tier", "edge")]);
        let canary = selector(&[("app", "web"), ("tier", "edge"), ("canary", "1")]);
        let wrong_tier = selector(&[("app", "web"), ("tier", "back")]);
        assert!(sel.matches(&hit, EmptySelector::MatchNothing));
        assert!(!sel.matches(&canary, EmptySelector::MatchNothing));
        assert!(!sel.matches(&wrong_tier, EmptySelector::MatchNothing));
    }
}
