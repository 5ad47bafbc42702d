//! Project-wide rules built on the reference graph.

use crate::analyzer::graph::build_graph;
use crate::analyzer::rules::compose::is_service;
use crate::analyzer::rules::{CheckFn, RegistryContext, Rule, RuleMeta, SimpleRule};
use crate::analyzer::types::{Diagnostic, ManifestFamily, RuleCategory, Severity};
use std::collections::HashSet;

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(SimpleRule::new(
            "compose-dependency-cycle",
            "depends_on cycle",
            Severity::Error,
            RuleCategory::Reliability,
            ManifestFamily::Compose,
            RuleMeta::new(
                "Services whose depends_on chains loop back on themselves can never be started in order.",
                "services:\n  a:\n    depends_on: [b]\n  b:\n    depends_on: [a]",
                "services:\n  a:\n    depends_on: [b]\n  b: {}",
            ),
            CheckFn::Registry(check_cycles),
        )),
        Box::new(SimpleRule::new(
            "compose-dangling-reference",
            "Reference to undefined resource",
            Severity::Error,
            RuleCategory::CrossResource,
            ManifestFamily::Compose,
            RuleMeta::new(
                "A service depends on a service, or uses a network, volume, secret or config, that the file does not declare.",
                "services:\n  web:\n    volumes: [\"data:/data\"]",
                "services:\n  web:\n    volumes: [\"data:/data\"]\nvolumes:\n  data: {}",
            ),
            CheckFn::Registry(check_dangling),
        )),
        Box::new(SimpleRule::new(
            "compose-duplicate-resource",
            "Duplicate declaration",
            Severity::Error,
            RuleCategory::CrossResource,
            ManifestFamily::Compose,
            RuleMeta::new(
                "The same service, network, volume, secret or config is declared twice; only the first declaration is used.",
                "services:\n  web:\n    image: a:1\n  web:\n    image: b:1",
                "services:\n  web:\n    image: a:1\n  web-b:\n    image: b:1",
            ),
            CheckFn::Registry(check_duplicates),
        )),
    ]
}

fn check_cycles(ctx: &RegistryContext<'_>) -> Vec<Diagnostic> {
    let graph = build_graph(ctx.registry, ctx.policy, ctx.line_index);
    if !graph.has_cycles() {
        return Vec::new();
    }
    let cyclic: HashSet<&str> = graph.cycles.iter().map(String::as_str).collect();
    let members: Vec<_> = ctx
        .resources
        .iter()
        .filter(|r| is_service(r) && cyclic.contains(r.id().as_str()))
        .collect();
    let names: Vec<&str> = members.iter().map(|r| r.name.as_str()).collect();

    let mut seen = HashSet::new();
    members
        .iter()
        .filter(|r| seen.insert(r.id()))
        .map(|r| {
            Diagnostic::new(
                format!(
                    "Service \"{}\" is part of a depends_on cycle ({})",
                    r.name,
                    names.join(", ")
                ),
                r.position,
            )
        })
        .collect()
}

fn check_dangling(ctx: &RegistryContext<'_>) -> Vec<Diagnostic> {
    let graph = build_graph(ctx.registry, ctx.policy, ctx.line_index);
    graph
        .dangling_edges()
        .map(|edge| {
            let source = edge.source.rsplit('/').next().unwrap_or(&edge.source);
            Diagnostic::new(
                format!(
                    "Service \"{}\" references undefined {} \"{}\"",
                    source, edge.target.kind, edge.target.name
                ),
                edge.position,
            )
        })
        .collect()
}

fn check_duplicates(ctx: &RegistryContext<'_>) -> Vec<Diagnostic> {
    ctx.registry
        .duplicates()
        .iter()
        .filter_map(|&(original, shadowed)| {
            let first = ctx.registry.get(original)?;
            let again = ctx.registry.get(shadowed)?;
            Some(Diagnostic::new(
                format!(
                    "The {} \"{}\" is already declared on line {}",
                    again.kind,
                    again.name,
                    first.line()
                ),
                again.position,
            ))
        })
        .collect()
}
