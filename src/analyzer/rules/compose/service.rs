//! Per-service rules.

use crate::analyzer::parser::Node;
use crate::analyzer::rules::compose::is_service;
use crate::analyzer::rules::{CheckFn, ImageRef, ResourceContext, Rule, RuleMeta, SimpleRule};
use crate::analyzer::types::{Diagnostic, ManifestFamily, RuleCategory, Severity};

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(SimpleRule::new(
            "compose-privileged",
            "Privileged service",
            Severity::Error,
            RuleCategory::Security,
            ManifestFamily::Compose,
            RuleMeta::new(
                "A privileged container has full access to the host's devices and kernel capabilities.",
                "services:\n  web:\n    privileged: true",
                "services:\n  web:\n    cap_add: [NET_BIND_SERVICE]",
            ),
            CheckFn::Resource(check_privileged),
        )),
        Box::new(SimpleRule::new(
            "compose-latest-tag",
            "Floating image tag",
            Severity::Warning,
            RuleCategory::BestPractice,
            ManifestFamily::Compose,
            RuleMeta::new(
                "Images tagged :latest, or not tagged at all, change between pulls. Pin a version or a digest.",
                "services:\n  db:\n    image: postgres",
                "services:\n  db:\n    image: postgres:16.2",
            ),
            CheckFn::Resource(check_latest_tag),
        )),
        Box::new(SimpleRule::new(
            "compose-no-restart-policy",
            "No restart policy",
            Severity::Warning,
            RuleCategory::Reliability,
            ManifestFamily::Compose,
            RuleMeta::new(
                "Without a restart policy a crashed container stays down.",
                "services:\n  web:\n    image: web:1.0",
                "services:\n  web:\n    image: web:1.0\n    restart: unless-stopped",
            ),
            CheckFn::Resource(check_restart),
        )),
        Box::new(SimpleRule::new(
            "compose-container-name",
            "Fixed container name",
            Severity::Warning,
            RuleCategory::Style,
            ManifestFamily::Compose,
            RuleMeta::new(
                "A fixed container_name prevents scaling the service and collides with other projects on the same host.",
                "services:\n  web:\n    container_name: web",
                "services:\n  web:\n    image: web:1.0",
            ),
            CheckFn::Resource(check_container_name),
        )),
    ]
}

fn check_privileged(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let resource = ctx.resource;
    let privileged = resource.root.get("privileged").and_then(Node::as_bool);
    if !is_service(resource) || privileged != Some(true) {
        return Vec::new();
    }
    vec![Diagnostic::new(
        format!("Service \"{}\" runs privileged", resource.name),
        resource.position_of("/privileged", ctx.line_index),
    )]
}

fn check_latest_tag(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let resource = ctx.resource;
    if !is_service(resource) {
        return Vec::new();
    }
    let Some(image) = resource.root.get("image").and_then(Node::as_str) else {
        return Vec::new();
    };
    let parsed = ImageRef::parse(image);
    if !parsed.is_floating() {
        return Vec::new();
    }
    let problem = match parsed.tag {
        Some(_) => "uses the :latest tag",
        None => "has no tag",
    };
    vec![Diagnostic::new(
        format!(
            "Image \"{}\" of service \"{}\" {}",
            image, resource.name, problem
        ),
        resource.position_of("/image", ctx.line_index),
    )]
}

fn check_restart(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let resource = ctx.resource;
    if !is_service(resource) {
        return Vec::new();
    }
    let has_policy = resource.root.get("restart").is_some()
        || resource.root.path(&["deploy", "restart_policy"]).is_some();
    if has_policy {
        return Vec::new();
    }
    vec![Diagnostic::new(
        format!("Service \"{}\" has no restart policy", resource.name),
        resource.position,
    )]
}

fn check_container_name(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let resource = ctx.resource;
    if !is_service(resource) {
        return Vec::new();
    }
    let Some(name) = resource.root.get("container_name").and_then(Node::scalar_string) else {
        return Vec::new();
    };

    let clash = ctx
        .registry
        .get_by_type("service")
        .into_iter()
        .filter(|other| other.namespace == resource.namespace && other.name != resource.name)
        .find(|other| {
            other.root.get("container_name").and_then(Node::scalar_string).as_deref()
                == Some(name.as_str())
        });
    let message = match clash {
        Some(other) => format!(
            "Service \"{}\" uses container_name \"{}\", which service \"{}\" also uses",
            resource.name, name, other.name
        ),
        None => format!(
            "Service \"{}\" sets container_name \"{}\" and cannot be scaled",
            resource.name, name
        ),
    };
    vec![Diagnostic::new(
        message,
        resource.position_of("/container_name", ctx.line_index),
    )]
}
