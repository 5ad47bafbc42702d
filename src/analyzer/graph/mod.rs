//! Cross-resource relationship graph.
//!
//! Edges come from independent extractors, one per relationship kind. A
//! reference is resolved when its target is registered or belongs to the
//! policy's implicit objects. Dependency edges (compose `depends_on`) are
//! ordered with Kahn's algorithm; pointer edges are only checked for
//! dangling targets.

pub mod cycles;
pub mod extractors;

pub use cycles::{CycleReport, detect_cycles};

use crate::analyzer::config::EnginePolicy;
use crate::analyzer::extract::resource_id;
use crate::analyzer::parser::LineIndex;
use crate::analyzer::registry::ResourceRegistry;
use crate::analyzer::types::Position;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// The kind of relationship an edge expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    Selects,
    MountsConfig,
    MountsSecret,
    EnvConfig,
    EnvSecret,
    ClaimsStorage,
    UsesServiceAccount,
    Scales,
    BindsRole,
    BindsSubject,
    AppliesPolicy,
    RoutesTo,
    Protects,
    DependsOn,
    UsesNetwork,
    UsesVolume,
    UsesSecret,
    UsesConfig,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selects => "selects",
            Self::MountsConfig => "mounts-config",
            Self::MountsSecret => "mounts-secret",
            Self::EnvConfig => "env-config",
            Self::EnvSecret => "env-secret",
            Self::ClaimsStorage => "claims-storage",
            Self::UsesServiceAccount => "uses-service-account",
            Self::Scales => "scales",
            Self::BindsRole => "binds-role",
            Self::BindsSubject => "binds-subject",
            Self::AppliesPolicy => "applies-policy",
            Self::RoutesTo => "routes-to",
            Self::Protects => "protects",
            Self::DependsOn => "depends-on",
            Self::UsesNetwork => "uses-network",
            Self::UsesVolume => "uses-volume",
            Self::UsesSecret => "uses-secret",
            Self::UsesConfig => "uses-config",
        }
    }

    pub fn style(&self) -> EdgeStyle {
        match self {
            Self::DependsOn => EdgeStyle::Dependency,
            _ => EdgeStyle::Pointer,
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an edge takes part in ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    /// Must be acyclic.
    Dependency,
    /// Only checked for a missing target.
    Pointer,
}

/// The target side of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EdgeTarget {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl EdgeTarget {
    pub fn id(&self) -> String {
        resource_id(&self.kind, &self.namespace, &self.name)
    }
}

/// A relationship between two resources.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: EdgeTarget,
    /// Registered target id. `None` for implicit and unresolved targets.
    pub target_id: Option<String>,
    pub kind: EdgeKind,
    pub resolved: bool,
    /// Where the reference is written.
    #[serde(skip)]
    pub position: Position,
}

impl Edge {
    pub fn style(&self) -> EdgeStyle {
        self.kind.style()
    }
}

/// A graph node: a registered resource or a display-only placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    /// Not declared in the input.
    pub placeholder: bool,
}

/// The relationship graph of one input.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
    /// Topological order over dependency edges.
    pub order: Vec<String>,
    /// Nodes caught in (or behind) a dependency cycle.
    pub cycles: Vec<String>,
    /// Indexes into `edges` of unresolved references.
    pub dangling: Vec<usize>,
}

impl ResourceGraph {
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    pub fn has_dangling(&self) -> bool {
        !self.dangling.is_empty()
    }

    pub fn dangling_edges(&self) -> impl Iterator<Item = &Edge> {
        self.dangling.iter().filter_map(|&i| self.edges.get(i))
    }
}

/// Resolves references against the registry and the policy.
pub struct GraphContext<'a> {
    pub registry: &'a ResourceRegistry,
    pub policy: &'a EnginePolicy,
    pub line_index: &'a LineIndex,
}

impl<'a> GraphContext<'a> {
    /// Build an edge to a named target.
    pub fn reference(
        &self,
        source: &str,
        kind: EdgeKind,
        target: EdgeTarget,
        position: Position,
    ) -> Edge {
        let registered = self
            .registry
            .get_by_qualified_name(&target.kind, &target.namespace, &target.name)
            .map(|r| r.id());
        let resolved = registered.is_some() || self.policy.is_implicit(&target.kind, &target.name);
        Edge {
            source: source.to_string(),
            target_id: registered,
            target,
            kind,
            resolved,
            position,
        }
    }

    /// Namespace a reference to `kind` resolves in, given the referrer's.
    pub fn target_namespace(&self, kind: &str, referrer_namespace: &str) -> String {
        if self.policy.is_cluster_scoped(kind) {
            String::new()
        } else {
            referrer_namespace.to_string()
        }
    }
}

/// Build the graph for a registry.
pub fn build_graph(
    registry: &ResourceRegistry,
    policy: &EnginePolicy,
    line_index: &LineIndex,
) -> ResourceGraph {
    let ctx = GraphContext {
        registry,
        policy,
        line_index,
    };

    let mut edges = Vec::new();
    for resource in registry.resources() {
        for extractor in extractors::EXTRACTORS {
            extractor(&ctx, resource, &mut edges);
        }
    }
    let edges = dedup_edges(edges);

    let mut nodes = Vec::new();
    let mut known = HashSet::new();
    for resource in registry.resources() {
        let id = resource.id();
        if known.insert(id.clone()) {
            nodes.push(GraphNode {
                id,
                kind: resource.kind.clone(),
                namespace: resource.namespace.clone(),
                name: resource.name.clone(),
                placeholder: false,
            });
        }
    }
    let node_ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();

    let mut placeholders = BTreeMap::new();
    for edge in edges.iter().filter(|e| e.target_id.is_none()) {
        placeholders
            .entry(edge.target.id())
            .or_insert_with(|| GraphNode {
                id: edge.target.id(),
                kind: edge.target.kind.clone(),
                namespace: edge.target.namespace.clone(),
                name: edge.target.name.clone(),
                placeholder: true,
            });
    }
    nodes.extend(placeholders.into_values().filter(|n| !known.contains(&n.id)));

    // depends-on points at the prerequisite, which must come first
    let dependency_pairs: Vec<(String, String)> = edges
        .iter()
        .filter(|e| e.style() == EdgeStyle::Dependency)
        .filter_map(|e| Some((e.target_id.clone()?, e.source.clone())))
        .collect();
    let report = detect_cycles(&node_ids, &dependency_pairs);

    let dangling = edges
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.resolved)
        .map(|(i, _)| i)
        .collect();

    log::debug!(
        "graph: {} node(s), {} edge(s), {} cyclic, {} dangling",
        nodes.len(),
        edges.len(),
        report.cyclic.len(),
        edges.iter().filter(|e| !e.resolved).count()
    );

    ResourceGraph {
        nodes,
        edges,
        order: report.order,
        cycles: report.cyclic,
        dangling,
    }
}

/// Drop repeated (source, target, kind) edges, keeping the first.
fn dedup_edges(edges: Vec<Edge>) -> Vec<Edge> {
    let mut seen = HashSet::new();
    edges
        .into_iter()
        .filter(|e| seen.insert((e.source.clone(), e.target.clone(), e.kind)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::extract::{detect_family, extract};
    use crate::analyzer::parser::parse;

    fn graph(yaml: &str) -> ResourceGraph {
        let parsed = parse(yaml);
        let policy = EnginePolicy::default();
        let out = extract(&parsed, detect_family(&parsed), &policy);
        let registry = ResourceRegistry::from_resources(out.resources);
        build_graph(&registry, &policy, &parsed.line_index)
    }

    const APP: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  selector:
    matchLabels: {app: web}
  template:
    metadata:
      labels: {app: web}
    spec:
      serviceAccountName: default
      containers:
      - name: web
        image: web:1.0
        envFrom:
        - configMapRef:
            name: settings
        env:
        - name: A
          valueFrom:
            configMapKeyRef: {name: settings, key: a}
        - name: B
          valueFrom:
            secretKeyRef: {name: creds, key: b}
";

    const SETTINGS: &str = "\
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
";

    #[test]
    fn test_dangling_reference_flips_when_target_added() {
        let before = graph(APP);
        assert_eq!(before.dangling.len(), 2);
        let kinds: Vec<_> = before.dangling_edges().map(|e| e.kind).collect();
        assert!(kinds.contains(&EdgeKind::EnvConfig));
        assert!(kinds.contains(&EdgeKind::EnvSecret));

        let after = graph(&format!("{}{}", APP, SETTINGS));
        assert_eq!(after.dangling.len(), 1);
        let remaining = after.dangling_edges().next().unwrap();
        assert_eq!(remaining.kind, EdgeKind::EnvSecret);
        assert_eq!(remaining.target.name, "creds");

        // other edges are unchanged
        assert_eq!(before.edges.len(), after.edges.len());
        let resolved_sa = after
            .edges
            .iter()
            .find(|e| e.kind == EdgeKind::UsesServiceAccount)
            .unwrap();
        assert!(resolved_sa.resolved);
        assert!(resolved_sa.target_id.is_none());
    }

    #[test]
    fn test_edges_are_deduplicated() {
        let g = graph(APP);
        let env_config: Vec<_> = g
            .edges
            .iter()
            .filter(|e| e.target.name == "settings")
            .collect();
        // envFrom and configMapKeyRef collapse into one env-config edge
        assert_eq!(env_config.len(), 1);
        assert_eq!(env_config[0].kind, EdgeKind::EnvConfig);
    }

    #[test]
    fn test_placeholders_for_unresolved_targets() {
        let g = graph(APP);
        let placeholder = g.nodes.iter().find(|n| n.name == "creds").unwrap();
        assert!(placeholder.placeholder);
        assert_eq!(placeholder.id, "Secret/default/creds");
    }

    #[test]
    fn test_compose_dependency_cycle() {
        let g = graph(
            "\
services:
  a:
    image: a
    depends_on: [b]
  b:
    image: b
    depends_on:
      c:
        condition: service_started
  c:
    image: c
    depends_on: [a]
  d:
    image: d
",
        );
        assert!(g.has_cycles());
        assert_eq!(
            g.cycles,
            vec!["service/default/a", "service/default/b", "service/default/c"]
        );
        assert_eq!(g.order, vec!["service/default/d"]);
    }

    #[test]
    fn test_compose_order_and_implicit_network() {
        let g = graph(
            "\
services:
  web:
    image: web
    depends_on: [db]
    networks: [default, backend]
  db:
    image: db
    networks: [backend]
networks:
  backend: {}
",
        );
        assert!(!g.has_cycles());
        assert!(!g.has_dangling());
        let db = g.order.iter().position(|n| n == "service/default/db").unwrap();
        let web = g.order.iter().position(|n| n == "service/default/web").unwrap();
        assert!(db < web);
    }
}
