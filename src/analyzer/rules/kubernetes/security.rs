//! Container and pod security rules.

use crate::analyzer::extract::{containers, pod_spec, pod_spec_pointer};
use crate::analyzer::parser::Node;
use crate::analyzer::rules::kubernetes::{container_position, describe};
use crate::analyzer::rules::{CheckFn, ResourceContext, Rule, RuleMeta, SimpleRule};
use crate::analyzer::types::{Diagnostic, ManifestFamily, RuleCategory, Severity};
use regex::Regex;
use std::sync::LazyLock;

/// Capabilities that hand a container host-level control.
pub const DANGEROUS_CAPABILITIES: &[&str] = &[
    "ALL",
    "SYS_ADMIN",
    "NET_ADMIN",
    "SYS_PTRACE",
    "SYS_MODULE",
    "SYS_RAWIO",
    "DAC_READ_SEARCH",
    "BPF",
];

/// Environment variable names that usually carry credentials.
static SECRET_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(passw(or)?d|secret|token|credential|api[_-]?key|private[_-]?key|access[_-]?key)",
    )
    .expect("Invalid secret name pattern")
});

const HOST_NAMESPACES: &[(&str, &str)] = &[
    ("hostNetwork", "network"),
    ("hostPID", "PID"),
    ("hostIPC", "IPC"),
];

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(SimpleRule::new(
            "privileged-container",
            "Privileged container",
            Severity::Error,
            RuleCategory::Security,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "A privileged container has every capability and full access to the host's devices. A compromise of the container is a compromise of the node.",
                "securityContext:\n  privileged: true",
                "securityContext:\n  privileged: false",
            ),
            CheckFn::Resource(check_privileged),
        )),
        Box::new(SimpleRule::new(
            "privilege-escalation",
            "Privilege escalation allowed",
            Severity::Warning,
            RuleCategory::Security,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "Unless allowPrivilegeEscalation is false, a process can gain more privileges than its parent through setuid binaries.",
                "securityContext: {}",
                "securityContext:\n  allowPrivilegeEscalation: false",
            ),
            CheckFn::Resource(check_privilege_escalation),
        )),
        Box::new(SimpleRule::new(
            "run-as-non-root",
            "Container may run as root",
            Severity::Warning,
            RuleCategory::Security,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "Containers should refuse to start as UID 0. Set runAsNonRoot at pod or container level, or a non-zero runAsUser.",
                "securityContext:\n  runAsUser: 0",
                "securityContext:\n  runAsNonRoot: true\n  runAsUser: 10001",
            ),
            CheckFn::Resource(check_run_as_non_root),
        )),
        Box::new(SimpleRule::new(
            "host-namespace",
            "Host namespace shared",
            Severity::Error,
            RuleCategory::Security,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "Sharing the host's network, PID or IPC namespace lets the pod observe and interfere with every process on the node.",
                "spec:\n  hostNetwork: true",
                "spec:\n  hostNetwork: false",
            ),
            CheckFn::Resource(check_host_namespace),
        )),
        Box::new(SimpleRule::new(
            "host-path-volume",
            "hostPath volume",
            Severity::Warning,
            RuleCategory::Security,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "hostPath volumes expose the node's filesystem to the pod and tie it to one node.",
                "volumes:\n- name: logs\n  hostPath:\n    path: /var/log",
                "volumes:\n- name: logs\n  emptyDir: {}",
            ),
            CheckFn::Resource(check_host_path),
        )),
        Box::new(SimpleRule::new(
            "dangerous-capabilities",
            "Dangerous capability added",
            Severity::Error,
            RuleCategory::Security,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "Capabilities such as SYS_ADMIN or NET_ADMIN are close to full root on the node. Drop ALL and add back only what the process needs.",
                "capabilities:\n  add: [SYS_ADMIN]",
                "capabilities:\n  drop: [ALL]\n  add: [NET_BIND_SERVICE]",
            ),
            CheckFn::Resource(check_capabilities),
        )),
        Box::new(SimpleRule::new(
            "env-var-secret",
            "Secret in plain environment variable",
            Severity::Warning,
            RuleCategory::Security,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "An environment variable whose name looks like a credential is set to a literal value, so the secret lives in the manifest. Reference a Secret instead.",
                "env:\n- name: DB_PASSWORD\n  value: hunter2",
                "env:\n- name: DB_PASSWORD\n  valueFrom:\n    secretKeyRef:\n      name: db\n      key: password",
            ),
            CheckFn::Resource(check_env_secrets),
        )),
    ]
}

fn security_flag(node: &Node, key: &str) -> Option<bool> {
    node.path(&["securityContext", key]).and_then(Node::as_bool)
}

fn check_privileged(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    containers(ctx.resource)
        .into_iter()
        .filter(|c| security_flag(c.node, "privileged") == Some(true))
        .map(|c| {
            Diagnostic::new(
                format!("{} in {} runs privileged", c.describe(), describe(ctx)),
                container_position(ctx, &c, &["securityContext", "privileged"]),
            )
        })
        .collect()
}

fn check_privilege_escalation(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    containers(ctx.resource)
        .into_iter()
        .filter(|c| security_flag(c.node, "allowPrivilegeEscalation") != Some(false))
        .map(|c| {
            let position =
                container_position(ctx, &c, &["securityContext", "allowPrivilegeEscalation"]);
            Diagnostic::new(
                format!(
                    "{} in {} does not set allowPrivilegeEscalation: false",
                    c.describe(),
                    describe(ctx)
                ),
                position,
            )
        })
        .collect()
}

/// Whether a security context keeps the process off UID 0.
///
/// Returns `None` when the context says nothing either way.
fn non_root(context: Option<&Node>) -> Option<bool> {
    let context = context?;
    if let Some(uid) = context.get("runAsUser").and_then(Node::as_i64) {
        if uid == 0 {
            return Some(false);
        }
        return Some(true);
    }
    context.get("runAsNonRoot").and_then(Node::as_bool)
}

fn check_run_as_non_root(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let Some(spec) = pod_spec(ctx.resource) else {
        return Vec::new();
    };
    let pod_level = non_root(spec.get("securityContext"));

    containers(ctx.resource)
        .into_iter()
        .filter(|c| non_root(c.node.get("securityContext")).or(pod_level) != Some(true))
        .map(|c| {
            Diagnostic::new(
                format!(
                    "{} in {} is not configured to run as non-root",
                    c.describe(),
                    describe(ctx)
                ),
                container_position(ctx, &c, &["securityContext"]),
            )
        })
        .collect()
}

fn check_host_namespace(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let (Some(spec), Some(pointer)) = (pod_spec(ctx.resource), pod_spec_pointer(&ctx.resource.kind))
    else {
        return Vec::new();
    };
    HOST_NAMESPACES
        .iter()
        .filter(|(field, _)| spec.get(field).and_then(Node::as_bool) == Some(true))
        .map(|(field, label)| {
            Diagnostic::new(
                format!("{} shares the host {} namespace", describe(ctx), label),
                ctx.resource
                    .position_of(&format!("{}/{}", pointer, field), ctx.line_index),
            )
        })
        .collect()
}

fn check_host_path(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let Some(spec) = pod_spec(ctx.resource) else {
        return Vec::new();
    };
    spec.get("volumes")
        .map(Node::items)
        .unwrap_or_default()
        .iter()
        .filter_map(|volume| {
            let host_path = volume.get("hostPath")?;
            let name = volume
                .get("name")
                .and_then(Node::scalar_string)
                .unwrap_or_default();
            let path = host_path
                .get("path")
                .and_then(Node::scalar_string)
                .unwrap_or_default();
            Some(Diagnostic::new(
                format!(
                    "Volume \"{}\" in {} mounts host path \"{}\"",
                    name,
                    describe(ctx),
                    path
                ),
                host_path.position(ctx.line_index),
            ))
        })
        .collect()
}

fn normalize_capability(cap: &str) -> String {
    let upper = cap.trim().to_ascii_uppercase();
    upper.strip_prefix("CAP_").unwrap_or(&upper).to_string()
}

fn check_capabilities(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for container in containers(ctx.resource) {
        let added = container
            .node
            .path(&["securityContext", "capabilities", "add"])
            .map(Node::items)
            .unwrap_or_default();
        for cap in added {
            let Some(raw) = cap.scalar_string() else {
                continue;
            };
            let name = normalize_capability(&raw);
            if DANGEROUS_CAPABILITIES.contains(&name.as_str()) {
                diagnostics.push(Diagnostic::new(
                    format!(
                        "{} in {} adds capability {}",
                        container.describe(),
                        describe(ctx),
                        name
                    ),
                    cap.position(ctx.line_index),
                ));
            }
        }
    }
    diagnostics
}

fn check_env_secrets(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for container in containers(ctx.resource) {
        let env = container.node.get("env").map(Node::items).unwrap_or_default();
        for var in env {
            let Some(name) = var.get("name").and_then(Node::scalar_string) else {
                continue;
            };
            if !SECRET_NAME_PATTERN.is_match(&name) || var.get("valueFrom").is_some() {
                continue;
            }
            // An empty literal holds nothing
            let Some(value) = var.get("value").filter(|v| {
                v.scalar_string().is_some_and(|s| !s.is_empty())
            }) else {
                continue;
            };
            diagnostics.push(Diagnostic::new(
                format!(
                    "{} in {} sets \"{}\" to a literal value",
                    container.describe(),
                    describe(ctx),
                    name
                ),
                value.position(ctx.line_index),
            ));
        }
    }
    diagnostics
}
