//! Reliability rules: probes, resource limits, replica counts.

use crate::analyzer::extract::{Container, containers, regular_containers};
use crate::analyzer::parser::Node;
use crate::analyzer::rules::kubernetes::{container_position, describe};
use crate::analyzer::rules::{CheckFn, ResourceContext, Rule, RuleMeta, SimpleRule};
use crate::analyzer::types::{Diagnostic, ManifestFamily, RuleCategory, Severity};

/// Kinds whose pods are expected to run to completion.
const BATCH_KINDS: &[&str] = &["Job", "CronJob"];

/// Kinds with a `spec.replicas` field.
const REPLICATED_KINDS: &[&str] = &["Deployment", "StatefulSet", "ReplicaSet"];

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(SimpleRule::new(
            "no-liveness-probe",
            "Missing liveness probe",
            Severity::Warning,
            RuleCategory::Reliability,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "Without a liveness probe a hung process keeps its pod Running and is never restarted.",
                "containers:\n- name: web\n  image: web:1.0",
                "containers:\n- name: web\n  image: web:1.0\n  livenessProbe:\n    httpGet: {path: /healthz, port: 8080}",
            ),
            CheckFn::Resource(check_liveness),
        )),
        Box::new(SimpleRule::new(
            "no-readiness-probe",
            "Missing readiness probe",
            Severity::Warning,
            RuleCategory::Reliability,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "Without a readiness probe traffic is routed to the pod before it can serve, and during rollouts.",
                "containers:\n- name: web\n  image: web:1.0",
                "containers:\n- name: web\n  image: web:1.0\n  readinessProbe:\n    httpGet: {path: /ready, port: 8080}",
            ),
            CheckFn::Resource(check_readiness),
        )),
        Box::new(SimpleRule::new(
            "missing-resource-limits",
            "Missing resource limits",
            Severity::Warning,
            RuleCategory::Reliability,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "A container without CPU and memory limits can starve its neighbours on the node.",
                "resources: {}",
                "resources:\n  limits:\n    cpu: 500m\n    memory: 256Mi",
            ),
            CheckFn::Resource(check_limits),
        )),
        Box::new(SimpleRule::new(
            "single-replica",
            "Single replica",
            Severity::Warning,
            RuleCategory::Reliability,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "A workload with one replica is unavailable during every restart, rollout and node drain. Workloads scaled by a HorizontalPodAutoscaler are exempt.",
                "spec:\n  replicas: 1",
                "spec:\n  replicas: 3",
            ),
            CheckFn::Resource(check_replicas),
        )),
    ]
}

fn probe_diagnostics(ctx: &ResourceContext<'_>, probe: &str, label: &str) -> Vec<Diagnostic> {
    if BATCH_KINDS.contains(&ctx.resource.kind.as_str()) {
        return Vec::new();
    }
    regular_containers(ctx.resource)
        .into_iter()
        .filter(|c| c.node.get(probe).is_none())
        .map(|c| {
            Diagnostic::new(
                format!("{} in {} has no {} probe", c.describe(), describe(ctx), label),
                c.node.position(ctx.line_index),
            )
        })
        .collect()
}

fn check_liveness(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    probe_diagnostics(ctx, "livenessProbe", "liveness")
}

fn check_readiness(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    probe_diagnostics(ctx, "readinessProbe", "readiness")
}

fn missing_limits(container: &Container<'_>) -> Vec<&'static str> {
    let limits = container.node.path(&["resources", "limits"]);
    ["cpu", "memory"]
        .into_iter()
        .filter(|key| limits.and_then(|l| l.get(key)).is_none_or(Node::is_null))
        .collect()
}

fn check_limits(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    containers(ctx.resource)
        .into_iter()
        .filter_map(|c| {
            let missing = missing_limits(&c);
            if missing.is_empty() {
                return None;
            }
            Some(Diagnostic::new(
                format!(
                    "{} in {} has no {} limit",
                    c.describe(),
                    describe(ctx),
                    missing.join(" or ")
                ),
                container_position(ctx, &c, &["resources"]),
            ))
        })
        .collect()
}

/// Whether an autoscaler in the same namespace targets the resource.
fn is_autoscaled(ctx: &ResourceContext<'_>) -> bool {
    ctx.registry
        .get_by_type("HorizontalPodAutoscaler")
        .into_iter()
        .filter(|hpa| hpa.namespace == ctx.resource.namespace)
        .filter_map(|hpa| hpa.root.path(&["spec", "scaleTargetRef"]))
        .any(|target| {
            target.get("kind").and_then(Node::as_str) == Some(ctx.resource.kind.as_str())
                && target.get("name").and_then(Node::scalar_string).as_deref()
                    == Some(ctx.resource.name.as_str())
        })
}

fn check_replicas(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    if !ctx.schema_valid
        || !REPLICATED_KINDS.contains(&ctx.resource.kind.as_str())
        || is_autoscaled(ctx)
    {
        return Vec::new();
    }
    // An unset count defaults to one
    let replicas = ctx.resource.root.path(&["spec", "replicas"]);
    match replicas.map(|r| r.as_i64()) {
        Some(Some(1)) | None => vec![Diagnostic::new(
            format!("{} runs a single replica", describe(ctx)),
            ctx.resource.position_of("/spec/replicas", ctx.line_index),
        )],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use crate::analyzer::rules::testing::{lines, run};

    const DEPLOYMENT: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 1
  template:
    spec:
      initContainers:
      - name: migrate
        image: migrate:1.0
      containers:
      - name: web
        image: web:1.0
        livenessProbe:
          httpGet: {path: /healthz, port: 80}
        resources:
          limits:
            cpu: 100m
      - name: sidecar
        image: proxy:1.0
        readinessProbe:
          tcpSocket: {port: 9000}
        resources:
          limits: {cpu: 50m, memory: 64Mi}
";

    #[test]
    fn test_probes_skip_init_containers() {
        let liveness = run("no-liveness-probe", DEPLOYMENT);
        assert_eq!(lines(&liveness), vec![20]);
        assert!(liveness[0].message.contains("sidecar"));

        let readiness = run("no-readiness-probe", DEPLOYMENT);
        assert_eq!(lines(&readiness), vec![13]);
    }

    #[test]
    fn test_probes_skip_batch_kinds() {
        let job = "apiVersion: batch/v1\nkind: Job\nmetadata:\n  name: j\nspec:\n  template:\n    spec:\n      containers:\n      - name: a\n        image: a:1\n";
        assert!(run("no-liveness-probe", job).is_empty());
        assert!(run("no-readiness-probe", job).is_empty());
    }

    #[test]
    fn test_missing_limits() {
        let d = run("missing-resource-limits", DEPLOYMENT);
        assert_eq!(d.len(), 2);
        assert!(d[0].message.contains("container \"web\""));
        assert!(d[0].message.contains("no memory limit"));
        assert_eq!(d[0].span.start.line, 18);
        assert!(d[1].message.contains("init container \"migrate\""));
        assert!(d[1].message.contains("cpu or memory"));
        assert_eq!(d[1].span.start.line, 10);
    }

    #[test]
    fn test_single_replica() {
        let d = run("single-replica", DEPLOYMENT);
        assert_eq!(lines(&d), vec![6]);

        let three = DEPLOYMENT.replace("replicas: 1", "replicas: 3");
        assert!(run("single-replica", &three).is_empty());
    }

    #[test]
    fn test_unset_replicas_default_to_one() {
        let d = run(
            "single-replica",
            "apiVersion: apps/v1\nkind: StatefulSet\nmetadata:\n  name: db\nspec:\n  serviceName: db\n",
        );
        assert_eq!(lines(&d), vec![1]);
    }

    #[test]
    fn test_autoscaled_workloads_are_exempt() {
        let yaml = format!(
            "{}---\napiVersion: autoscaling/v2\nkind: HorizontalPodAutoscaler\nmetadata:\n  name: web\nspec:\n  scaleTargetRef:\n    apiVersion: apps/v1\n    kind: Deployment\n    name: web\n",
            DEPLOYMENT
        );
        assert!(run("single-replica", &yaml).is_empty());
    }
}
