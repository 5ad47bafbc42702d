//! Rules that look across resources.

use crate::analyzer::extract::{Resource, is_workload, template_labels};
use crate::analyzer::graph::build_graph;
use crate::analyzer::registry::{EmptySelector, LabelSelector, ResourceRegistry};
use crate::analyzer::rules::kubernetes::describe;
use crate::analyzer::rules::{
    CheckFn, RegistryContext, ResourceContext, Rule, RuleMeta, SimpleRule,
};
use crate::analyzer::types::{Diagnostic, ManifestFamily, RuleCategory, Severity};

/// Workload kinds whose `spec.selector` must match their own template.
const SELECTOR_KINDS: &[&str] = &["Deployment", "StatefulSet", "DaemonSet", "ReplicaSet"];

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(SimpleRule::new(
            "dangling-reference",
            "Reference to undefined resource",
            Severity::Error,
            RuleCategory::CrossResource,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "A ConfigMap, Secret, ServiceAccount, claim, role or Service is referenced but not defined in the input. The workload will fail to start or the binding does nothing.",
                "envFrom:\n- configMapRef:\n    name: settings   # not defined",
                "---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings",
            ),
            CheckFn::Registry(check_dangling),
        )),
        Box::new(SimpleRule::new(
            "service-selector-no-match",
            "Service selects no workload",
            Severity::Warning,
            RuleCategory::CrossResource,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "No workload in the Service's namespace has pod template labels matching its selector, so the Service has no endpoints.",
                "selector:\n  app: wbe",
                "selector:\n  app: web",
            ),
            CheckFn::Resource(check_service_selector),
        )),
        Box::new(SimpleRule::new(
            "duplicate-resource",
            "Duplicate resource",
            Severity::Error,
            RuleCategory::CrossResource,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "Two documents declare the same kind, namespace and name. Only one of them survives when applied.",
                "kind: Service\nmetadata:\n  name: web\n---\nkind: Service\nmetadata:\n  name: web",
                "kind: Service\nmetadata:\n  name: web\n---\nkind: Service\nmetadata:\n  name: web-internal",
            ),
            CheckFn::Registry(check_duplicates),
        )),
        Box::new(SimpleRule::new(
            "selector-template-mismatch",
            "Selector does not match template",
            Severity::Error,
            RuleCategory::CrossResource,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "A workload's spec.selector must match its own pod template labels; the API server rejects it otherwise.",
                "selector:\n  matchLabels: {app: web}\ntemplate:\n  metadata:\n    labels: {app: api}",
                "selector:\n  matchLabels: {app: web}\ntemplate:\n  metadata:\n    labels: {app: web}",
            ),
            CheckFn::Resource(check_selector_template),
        )),
    ]
}

fn check_dangling(ctx: &RegistryContext<'_>) -> Vec<Diagnostic> {
    let graph = build_graph(ctx.registry, ctx.policy, ctx.line_index);
    graph
        .dangling_edges()
        .map(|edge| {
            let source = ctx
                .registry
                .resources()
                .iter()
                .find(|r| r.id() == edge.source)
                .map(|r| format!("{} \"{}\"", r.kind, r.name))
                .unwrap_or_else(|| edge.source.clone());
            Diagnostic::new(
                format!(
                    "{} references {} \"{}\" ({}), which is not defined",
                    source, edge.target.kind, edge.target.name, edge.kind
                ),
                edge.position,
            )
        })
        .collect()
}

/// Workloads of the resource's namespace matched by a selector.
fn matching_workloads<'r>(
    registry: &'r ResourceRegistry,
    resource: &Resource,
    selector: &LabelSelector,
) -> Vec<&'r Resource> {
    registry
        .get_by_namespace(&resource.namespace)
        .into_iter()
        .filter(|r| is_workload(&r.kind))
        .filter(|r| selector.matches(&template_labels(r), EmptySelector::MatchNothing))
        .collect()
}

fn check_service_selector(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let resource = ctx.resource;
    if resource.kind != "Service" || !ctx.schema_valid {
        return Vec::new();
    }
    // ExternalName services and selector-less services have no pods to find
    if resource.root.path(&["spec", "type"]).and_then(|t| t.as_str()) == Some("ExternalName") {
        return Vec::new();
    }
    let Some(node) = resource.root.path(&["spec", "selector"]) else {
        return Vec::new();
    };
    let selector = LabelSelector::from_labels(node.string_map());
    if selector.is_empty() || !matching_workloads(ctx.registry, resource, &selector).is_empty() {
        return Vec::new();
    }

    let wanted: Vec<String> = selector
        .match_labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    vec![Diagnostic::new(
        format!(
            "{} selects {} but no workload in namespace \"{}\" has matching pod labels",
            describe(ctx),
            wanted.join(","),
            resource.namespace
        ),
        resource.key_position_of("/spec/selector", ctx.line_index),
    )]
}

fn check_duplicates(ctx: &RegistryContext<'_>) -> Vec<Diagnostic> {
    ctx.registry
        .duplicates()
        .iter()
        .filter_map(|&(original, shadowed)| {
            let first = ctx.registry.get(original)?;
            let again = ctx.registry.get(shadowed)?;
            let scope = if again.namespace.is_empty() {
                String::new()
            } else {
                format!(" in namespace \"{}\"", again.namespace)
            };
            Some(Diagnostic::new(
                format!(
                    "{} \"{}\"{} is already defined on line {}",
                    again.kind,
                    again.name,
                    scope,
                    first.line()
                ),
                again.position,
            ))
        })
        .collect()
}

fn check_selector_template(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let resource = ctx.resource;
    // A selector the schema rejected is already reported
    if !SELECTOR_KINDS.contains(&resource.kind.as_str()) || !ctx.schema_valid {
        return Vec::new();
    }
    let Some(node) = resource.root.path(&["spec", "selector"]) else {
        return Vec::new();
    };
    let selector = LabelSelector::from_node(node);
    // An empty selector matches nothing here
    if selector.matches(&template_labels(resource), EmptySelector::MatchNothing) {
        return Vec::new();
    }
    vec![Diagnostic::new(
        format!(
            "The selector of {} does not match its pod template labels",
            describe(ctx)
        ),
        resource.key_position_of("/spec/selector", ctx.line_index),
    )]
}
