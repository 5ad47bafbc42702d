//! Edge extractors, one per relationship family.
//!
//! Each extractor looks at a single resource and appends the edges it
//! declares. Extractors never look at each other's output.

use crate::analyzer::extract::{Resource, containers, is_workload, pod_spec, template_labels};
use crate::analyzer::graph::{Edge, EdgeKind, EdgeTarget, GraphContext};
use crate::analyzer::parser::Node;
use crate::analyzer::registry::{EmptySelector, LabelSelector};
use crate::analyzer::types::{ManifestFamily, Position};

/// An edge extractor.
pub type Extractor = fn(&GraphContext<'_>, &Resource, &mut Vec<Edge>);

/// Every extractor, in the order their edges are emitted.
pub const EXTRACTORS: &[Extractor] = &[
    service_selects,
    pod_volumes,
    pod_env,
    service_account,
    autoscaler_target,
    role_binding,
    network_policy,
    ingress_backends,
    disruption_budget,
    compose_depends_on,
    compose_networks,
    compose_volumes,
    compose_secrets_and_configs,
];

fn items<'a>(node: &'a Node, key: &str) -> &'a [Node] {
    node.get(key).map(Node::items).unwrap_or_default()
}

fn is_optional(node: &Node) -> bool {
    node.get("optional").and_then(Node::as_bool) == Some(true)
}

/// Append a reference to a named object in the referrer's namespace.
///
/// Optional references that do not resolve are dropped; the workload
/// starts without them.
fn push_named(
    ctx: &GraphContext<'_>,
    resource: &Resource,
    kind: EdgeKind,
    target_kind: &str,
    name_node: Option<&Node>,
    optional: bool,
    out: &mut Vec<Edge>,
) {
    let Some(node) = name_node else {
        return;
    };
    let Some(name) = node.scalar_string() else {
        return;
    };
    let target = EdgeTarget {
        kind: target_kind.to_string(),
        namespace: ctx.target_namespace(target_kind, &resource.namespace),
        name,
    };
    let edge = ctx.reference(&resource.id(), kind, target, node.position(ctx.line_index));
    if optional && !edge.resolved {
        return;
    }
    out.push(edge);
}

/// Resolved edge to a registered resource matched by a selector.
fn link(source: &Resource, target: &Resource, kind: EdgeKind, position: Position) -> Edge {
    Edge {
        source: source.id(),
        target: EdgeTarget {
            kind: target.kind.clone(),
            namespace: target.namespace.clone(),
            name: target.name.clone(),
        },
        target_id: Some(target.id()),
        kind,
        resolved: true,
        position,
    }
}

/// Link a selector to the workloads of the same namespace it matches.
fn select_workloads(
    ctx: &GraphContext<'_>,
    resource: &Resource,
    selector: &LabelSelector,
    empty: EmptySelector,
    kind: EdgeKind,
    position: Position,
    out: &mut Vec<Edge>,
) {
    for candidate in ctx.registry.get_by_namespace(&resource.namespace) {
        if candidate.family != ManifestFamily::Kubernetes || !is_workload(&candidate.kind) {
            continue;
        }
        if selector.matches(&template_labels(candidate), empty) {
            out.push(link(resource, candidate, kind, position));
        }
    }
}

fn is_kubernetes(resource: &Resource, kind: &str) -> bool {
    resource.family == ManifestFamily::Kubernetes && resource.kind == kind
}

fn is_compose_service(resource: &Resource) -> bool {
    resource.family == ManifestFamily::Compose && resource.kind == "service"
}

// --- Kubernetes ---

fn service_selects(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if !is_kubernetes(resource, "Service") {
        return;
    }
    let Some(node) = resource.root.path(&["spec", "selector"]) else {
        return;
    };
    let selector = LabelSelector::from_labels(node.string_map());
    let position = resource.key_position_of("/spec/selector", ctx.line_index);
    select_workloads(
        ctx,
        resource,
        &selector,
        EmptySelector::MatchNothing,
        EdgeKind::Selects,
        position,
        out,
    );
}

fn pod_volumes(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if resource.family != ManifestFamily::Kubernetes {
        return;
    }
    let Some(spec) = pod_spec(resource) else {
        return;
    };
    for volume in items(spec, "volumes") {
        if let Some(cm) = volume.get("configMap") {
            push_named(
                ctx,
                resource,
                EdgeKind::MountsConfig,
                "ConfigMap",
                cm.get("name"),
                is_optional(cm),
                out,
            );
        }
        if let Some(secret) = volume.get("secret") {
            push_named(
                ctx,
                resource,
                EdgeKind::MountsSecret,
                "Secret",
                secret.get("secretName"),
                is_optional(secret),
                out,
            );
        }
        if let Some(pvc) = volume.get("persistentVolumeClaim") {
            push_named(
                ctx,
                resource,
                EdgeKind::ClaimsStorage,
                "PersistentVolumeClaim",
                pvc.get("claimName"),
                false,
                out,
            );
        }
        let Some(projected) = volume.get("projected") else {
            continue;
        };
        for source in items(projected, "sources") {
            if let Some(cm) = source.get("configMap") {
                push_named(
                    ctx,
                    resource,
                    EdgeKind::MountsConfig,
                    "ConfigMap",
                    cm.get("name"),
                    is_optional(cm),
                    out,
                );
            }
            if let Some(secret) = source.get("secret") {
                push_named(
                    ctx,
                    resource,
                    EdgeKind::MountsSecret,
                    "Secret",
                    secret.get("name"),
                    is_optional(secret),
                    out,
                );
            }
        }
    }
}

fn pod_env(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if resource.family != ManifestFamily::Kubernetes {
        return;
    }
    for container in containers(resource) {
        for env in items(container.node, "env") {
            let Some(value_from) = env.get("valueFrom") else {
                continue;
            };
            if let Some(r) = value_from.get("configMapKeyRef") {
                push_named(
                    ctx,
                    resource,
                    EdgeKind::EnvConfig,
                    "ConfigMap",
                    r.get("name"),
                    is_optional(r),
                    out,
                );
            }
            if let Some(r) = value_from.get("secretKeyRef") {
                push_named(
                    ctx,
                    resource,
                    EdgeKind::EnvSecret,
                    "Secret",
                    r.get("name"),
                    is_optional(r),
                    out,
                );
            }
        }
        for source in items(container.node, "envFrom") {
            if let Some(r) = source.get("configMapRef") {
                push_named(
                    ctx,
                    resource,
                    EdgeKind::EnvConfig,
                    "ConfigMap",
                    r.get("name"),
                    is_optional(r),
                    out,
                );
            }
            if let Some(r) = source.get("secretRef") {
                push_named(
                    ctx,
                    resource,
                    EdgeKind::EnvSecret,
                    "Secret",
                    r.get("name"),
                    is_optional(r),
                    out,
                );
            }
        }
    }
}

fn service_account(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if resource.family != ManifestFamily::Kubernetes {
        return;
    }
    let Some(spec) = pod_spec(resource) else {
        return;
    };
    // `serviceAccount` is the deprecated spelling
    let name = spec
        .get("serviceAccountName")
        .or_else(|| spec.get("serviceAccount"));
    push_named(
        ctx,
        resource,
        EdgeKind::UsesServiceAccount,
        "ServiceAccount",
        name,
        false,
        out,
    );
}

fn autoscaler_target(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if !is_kubernetes(resource, "HorizontalPodAutoscaler") {
        return;
    }
    let Some(target) = resource.root.path(&["spec", "scaleTargetRef"]) else {
        return;
    };
    let Some(kind) = target.get("kind").and_then(Node::scalar_string) else {
        return;
    };
    push_named(ctx, resource, EdgeKind::Scales, &kind, target.get("name"), false, out);
}

fn role_binding(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if !is_kubernetes(resource, "RoleBinding") && !is_kubernetes(resource, "ClusterRoleBinding") {
        return;
    }
    if let Some(role_ref) = resource.root.get("roleRef")
        && let Some(kind) = role_ref.get("kind").and_then(Node::scalar_string)
    {
        push_named(ctx, resource, EdgeKind::BindsRole, &kind, role_ref.get("name"), false, out);
    }

    for subject in items(&resource.root, "subjects") {
        if subject.get("kind").and_then(Node::as_str) != Some("ServiceAccount") {
            continue;
        }
        let Some(name_node) = subject.get("name") else {
            continue;
        };
        let Some(name) = name_node.scalar_string() else {
            continue;
        };
        let namespace = subject
            .get("namespace")
            .and_then(Node::scalar_string)
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| {
                if resource.namespace.is_empty() {
                    ctx.policy.default_namespace.clone()
                } else {
                    resource.namespace.clone()
                }
            });
        let target = EdgeTarget {
            kind: "ServiceAccount".to_string(),
            namespace,
            name,
        };
        out.push(ctx.reference(
            &resource.id(),
            EdgeKind::BindsSubject,
            target,
            name_node.position(ctx.line_index),
        ));
    }
}

fn network_policy(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if !is_kubernetes(resource, "NetworkPolicy") {
        return;
    }
    let Some(node) = resource.root.path(&["spec", "podSelector"]) else {
        return;
    };
    let selector = LabelSelector::from_node(node);
    let position = resource.key_position_of("/spec/podSelector", ctx.line_index);
    select_workloads(
        ctx,
        resource,
        &selector,
        EmptySelector::MatchEverything,
        EdgeKind::AppliesPolicy,
        position,
        out,
    );
}

fn ingress_backends(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if !is_kubernetes(resource, "Ingress") {
        return;
    }
    let Some(spec) = resource.root.get("spec") else {
        return;
    };

    let mut backends: Vec<&Node> = Vec::new();
    backends.extend(spec.get("defaultBackend"));
    backends.extend(spec.get("backend"));
    for rule in items(spec, "rules") {
        let Some(http) = rule.get("http") else {
            continue;
        };
        backends.extend(items(http, "paths").iter().filter_map(|p| p.get("backend")));
    }

    for backend in backends {
        // networking.k8s.io/v1 nests the service; v1beta1 used serviceName
        let name = backend
            .path(&["service", "name"])
            .or_else(|| backend.get("serviceName"));
        push_named(ctx, resource, EdgeKind::RoutesTo, "Service", name, false, out);
    }
}

fn disruption_budget(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if !is_kubernetes(resource, "PodDisruptionBudget") {
        return;
    }
    let Some(node) = resource.root.path(&["spec", "selector"]) else {
        return;
    };
    let selector = LabelSelector::from_node(node);
    let position = resource.key_position_of("/spec/selector", ctx.line_index);
    select_workloads(
        ctx,
        resource,
        &selector,
        EmptySelector::MatchEverything,
        EdgeKind::Protects,
        position,
        out,
    );
}

// --- Compose ---

/// Names listed either as a sequence or as mapping keys, with positions.
fn listed_names(ctx: &GraphContext<'_>, node: &Node) -> Vec<(String, Position)> {
    if node.is_mapping() {
        return node
            .entries()
            .iter()
            .map(|e| (e.key.clone(), e.key_position(ctx.line_index)))
            .collect();
    }
    node.items()
        .iter()
        .filter_map(|item| Some((item.scalar_string()?, item.position(ctx.line_index))))
        .collect()
}

fn push_compose(
    ctx: &GraphContext<'_>,
    resource: &Resource,
    kind: EdgeKind,
    target_kind: &str,
    name: String,
    position: Position,
    out: &mut Vec<Edge>,
) {
    let target = EdgeTarget {
        kind: target_kind.to_string(),
        namespace: resource.namespace.clone(),
        name,
    };
    out.push(ctx.reference(&resource.id(), kind, target, position));
}

fn compose_depends_on(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if !is_compose_service(resource) {
        return;
    }
    let Some(node) = resource.root.get("depends_on") else {
        return;
    };
    for (name, position) in listed_names(ctx, node) {
        push_compose(ctx, resource, EdgeKind::DependsOn, "service", name, position, out);
    }
}

fn compose_networks(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if !is_compose_service(resource) {
        return;
    }
    let Some(node) = resource.root.get("networks") else {
        return;
    };
    for (name, position) in listed_names(ctx, node) {
        push_compose(ctx, resource, EdgeKind::UsesNetwork, "network", name, position, out);
    }
}

/// Named volume in a short-syntax mount (`data:/var/lib/data:ro`).
///
/// Host paths and anonymous volumes (a bare container path) are not
/// references.
pub fn named_volume_source(spec: &str) -> Option<&str> {
    let (source, _) = spec.split_once(':')?;
    if source.is_empty() || source.starts_with(['/', '.', '~', '$']) {
        return None;
    }
    Some(source)
}

fn compose_volumes(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if !is_compose_service(resource) {
        return;
    }
    for mount in items(&resource.root, "volumes") {
        let position = mount.position(ctx.line_index);
        let name = match mount.as_str() {
            Some(short) => named_volume_source(short).map(str::to_string),
            None => {
                let is_volume = mount.get("type").and_then(Node::as_str) == Some("volume");
                mount
                    .get("source")
                    .and_then(Node::scalar_string)
                    .filter(|_| is_volume)
            }
        };
        if let Some(name) = name {
            push_compose(ctx, resource, EdgeKind::UsesVolume, "volume", name, position, out);
        }
    }
}

fn compose_secrets_and_configs(ctx: &GraphContext<'_>, resource: &Resource, out: &mut Vec<Edge>) {
    if !is_compose_service(resource) {
        return;
    }
    let sections = [
        ("secrets", EdgeKind::UsesSecret, "secret"),
        ("configs", EdgeKind::UsesConfig, "config"),
    ];
    for (key, kind, target_kind) in sections {
        for entry in items(&resource.root, key) {
            let name = match entry.scalar_string() {
                Some(name) => Some(name),
                None => entry.get("source").and_then(Node::scalar_string),
            };
            if let Some(name) = name {
                let position = entry.position(ctx.line_index);
                push_compose(ctx, resource, kind, target_kind, name, position, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::analyzer::config::EnginePolicy;
    use crate::analyzer::extract::{detect_family, extract};
    use crate::analyzer::graph::{EdgeKind, ResourceGraph, build_graph};
    use crate::analyzer::parser::parse;
    use crate::analyzer::registry::ResourceRegistry;

    fn graph(yaml: &str) -> ResourceGraph {
        let parsed = parse(yaml);
        let policy = EnginePolicy::default();
        let out = extract(&parsed, detect_family(&parsed), &policy);
        let registry = ResourceRegistry::from_resources(out.resources);
        build_graph(&registry, &policy, &parsed.line_index)
    }

    fn edges_of(g: &ResourceGraph, kind: EdgeKind) -> Vec<String> {
        g.edges
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| format!("{} -> {}", e.source, e.target.id()))
            .collect()
    }

    const WORKLOADS: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  template:
    metadata:
      labels: {app: web, tier: front}
    spec:
      containers:
      - name: web
        image: web:1.0
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: db
spec:
  template:
    metadata:
      labels: {app: db}
    spec:
      containers:
      - name: db
        image: db:1.0
";

    #[test]
    fn test_service_selects_matching_workloads() {
        let g = graph(&format!(
            "{}---\napiVersion: v1\nkind: Service\nmetadata:\n  name: web\nspec:\n  selector:\n    app: web\n",
            WORKLOADS
        ));
        assert_eq!(
            edges_of(&g, EdgeKind::Selects),
            vec!["Service/default/web -> Deployment/default/web"]
        );
    }

    #[test]
    fn test_empty_selectors() {
        let g = graph(&format!(
            "{}---
apiVersion: v1
kind: Service
metadata:
  name: nothing
spec:
  selector: {{}}
---
apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: deny-all
spec:
  podSelector: {{}}
",
            WORKLOADS
        ));
        assert!(edges_of(&g, EdgeKind::Selects).is_empty());
        assert_eq!(edges_of(&g, EdgeKind::AppliesPolicy).len(), 2);
    }

    #[test]
    fn test_selectors_stay_in_namespace() {
        let g = graph(&format!(
            "{}---\napiVersion: v1\nkind: Service\nmetadata:\n  name: web\n  namespace: other\nspec:\n  selector:\n    app: web\n",
            WORKLOADS
        ));
        assert!(edges_of(&g, EdgeKind::Selects).is_empty());
    }

    #[test]
    fn test_volume_references_and_optional() {
        let g = graph(
            "\
apiVersion: v1
kind: Pod
metadata:
  name: p
spec:
  volumes:
  - name: a
    configMap:
      name: app-config
  - name: b
    secret:
      secretName: tls
      optional: true
  - name: c
    persistentVolumeClaim:
      claimName: data
  - name: d
    projected:
      sources:
      - secret:
          name: token
  containers:
  - name: app
    image: app:1.0
",
        );
        assert_eq!(
            edges_of(&g, EdgeKind::MountsConfig),
            vec!["Pod/default/p -> ConfigMap/default/app-config"]
        );
        // the optional secret is missing and skipped
        assert_eq!(
            edges_of(&g, EdgeKind::MountsSecret),
            vec!["Pod/default/p -> Secret/default/token"]
        );
        assert_eq!(
            edges_of(&g, EdgeKind::ClaimsStorage),
            vec!["Pod/default/p -> PersistentVolumeClaim/default/data"]
        );
        assert_eq!(g.dangling.len(), 3);
    }

    #[test]
    fn test_rbac_and_autoscaler() {
        let g = graph(
            "\
apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: read
  namespace: apps
roleRef:
  kind: ClusterRole
  name: view
subjects:
- kind: ServiceAccount
  name: runner
- kind: User
  name: alice
---
apiVersion: autoscaling/v2
kind: HorizontalPodAutoscaler
metadata:
  name: web
spec:
  scaleTargetRef:
    kind: Deployment
    name: web
",
        );
        let role = g.edges.iter().find(|e| e.kind == EdgeKind::BindsRole).unwrap();
        assert_eq!(role.target.id(), "ClusterRole//view");
        assert!(role.resolved);
        assert_eq!(
            edges_of(&g, EdgeKind::BindsSubject),
            vec!["RoleBinding/apps/read -> ServiceAccount/apps/runner"]
        );
        let scales = g.edges.iter().find(|e| e.kind == EdgeKind::Scales).unwrap();
        assert!(!scales.resolved);
        assert_eq!(scales.position.line, 22);
    }

    #[test]
    fn test_ingress_backends() {
        let g = graph(
            "\
apiVersion: networking.k8s.io/v1
kind: Ingress
metadata:
  name: edge
spec:
  defaultBackend:
    service:
      name: fallback
  rules:
  - http:
      paths:
      - path: /
        backend:
          service:
            name: web
            port: {number: 80}
",
        );
        assert_eq!(
            edges_of(&g, EdgeKind::RoutesTo),
            vec![
                "Ingress/default/edge -> Service/default/fallback",
                "Ingress/default/edge -> Service/default/web",
            ]
        );
    }

    #[test]
    fn test_pdb_protects() {
        let g = graph(&format!(
            "{}---\napiVersion: policy/v1\nkind: PodDisruptionBudget\nmetadata:\n  name: db\nspec:\n  minAvailable: 1\n  selector:\n    matchLabels: {{app: db}}\n",
            WORKLOADS
        ));
        assert_eq!(
            edges_of(&g, EdgeKind::Protects),
            vec!["PodDisruptionBudget/default/db -> Deployment/default/db"]
        );
    }

    #[test]
    fn test_compose_resources() {
        let g = graph(
            "\
services:
  web:
    image: web
    volumes:
      - data:/var/lib/data
      - ./src:/src
      - /tmp
      - type: volume
        source: cache
        target: /cache
    secrets: [api_key]
    configs:
      - source: nginx
        target: /etc/nginx.conf
volumes:
  data:
secrets:
  api_key:
    file: ./key.txt
",
        );
        assert_eq!(
            edges_of(&g, EdgeKind::UsesVolume),
            vec![
                "service/default/web -> volume/default/data",
                "service/default/web -> volume/default/cache",
            ]
        );
        assert_eq!(edges_of(&g, EdgeKind::UsesSecret).len(), 1);
        let dangling: Vec<_> = g.dangling_edges().map(|e| e.target.id()).collect();
        assert_eq!(dangling, vec!["volume/default/cache", "config/default/nginx"]);
    }

    #[test]
    fn test_named_volume_source() {
        use super::named_volume_source;
        assert_eq!(named_volume_source("data:/data"), Some("data"));
        assert_eq!(named_volume_source("./data:/data"), None);
        assert_eq!(named_volume_source("/host:/data:ro"), None);
        assert_eq!(named_volume_source("/anonymous"), None);
        assert_eq!(named_volume_source("${DIR}:/data"), None);
    }
}
