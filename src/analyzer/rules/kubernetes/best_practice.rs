//! Best-practice rules.

use crate::analyzer::extract::{containers, is_workload};
use crate::analyzer::rules::kubernetes::{container_position, describe};
use crate::analyzer::rules::{CheckFn, ImageRef, ResourceContext, Rule, RuleMeta, SimpleRule};
use crate::analyzer::types::{Diagnostic, ManifestFamily, RuleCategory, Severity};

/// Labels that identify the application a resource belongs to.
pub const NAME_LABELS: &[&str] = &["app.kubernetes.io/name", "app"];

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(SimpleRule::new(
            "latest-tag",
            "Floating image tag",
            Severity::Warning,
            RuleCategory::BestPractice,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "Images tagged :latest, or not tagged at all, change under a running workload. Pin a version or a digest.",
                "image: nginx:latest",
                "image: nginx:1.25.3",
            ),
            CheckFn::Resource(check_latest_tag),
        )),
        Box::new(SimpleRule::new(
            "missing-recommended-labels",
            "Missing app label",
            Severity::Info,
            RuleCategory::BestPractice,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "Workloads and Services should carry app.kubernetes.io/name (or app) so tools can group them.",
                "metadata:\n  name: web",
                "metadata:\n  name: web\n  labels:\n    app.kubernetes.io/name: web",
            ),
            CheckFn::Resource(check_labels),
        )),
        Box::new(SimpleRule::new(
            "default-namespace",
            "Default namespace",
            Severity::Info,
            RuleCategory::BestPractice,
            ManifestFamily::Kubernetes,
            RuleMeta::new(
                "Resources without an explicit namespace land in whatever namespace is current when applied, usually default.",
                "metadata:\n  name: web",
                "metadata:\n  name: web\n  namespace: shop",
            ),
            CheckFn::Resource(check_namespace),
        )),
    ]
}

fn check_latest_tag(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    containers(ctx.resource)
        .into_iter()
        .filter_map(|c| {
            let image = c.image()?;
            let parsed = ImageRef::parse(image);
            if !parsed.is_floating() {
                return None;
            }
            let problem = match parsed.tag {
                Some(_) => "uses the :latest tag",
                None => "has no tag",
            };
            Some(Diagnostic::new(
                format!("Image \"{}\" of {} {}", image, c.describe(), problem),
                container_position(ctx, &c, &["image"]),
            ))
        })
        .collect()
}

fn check_labels(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let resource = ctx.resource;
    if !is_workload(&resource.kind) && resource.kind != "Service" {
        return Vec::new();
    }
    if NAME_LABELS.iter().any(|l| resource.labels.contains_key(*l)) {
        return Vec::new();
    }
    vec![Diagnostic::new(
        format!("{} has no app.kubernetes.io/name label", describe(ctx)),
        resource.key_position_of("/metadata", ctx.line_index),
    )]
}

fn check_namespace(ctx: &ResourceContext<'_>) -> Vec<Diagnostic> {
    let resource = ctx.resource;
    if ctx.policy.is_cluster_scoped(&resource.kind)
        || resource.namespace != ctx.policy.default_namespace
    {
        return Vec::new();
    }
    let explicit = resource.root.path(&["metadata", "namespace"]).is_some();
    let (message, position) = if explicit {
        (
            format!("{} is placed in the default namespace", describe(ctx)),
            resource.position_of("/metadata/namespace", ctx.line_index),
        )
    } else {
        (
            format!("{} does not set a namespace", describe(ctx)),
            resource.key_position_of("/metadata", ctx.line_index),
        )
    };
    vec![Diagnostic::new(message, position)]
}

#[cfg(test)]
mod tests {
    use crate::analyzer::rules::testing::{lines, run};

    #[test]
    fn test_latest_tag_variants() {
        let yaml = "\
apiVersion: v1
kind: Pod
metadata:
  name: p
spec:
  containers:
  - name: a
    image: nginx:latest
  - name: b
    image: registry:5000/team/app
  - name: c
    image: nginx:1.25
  - name: d
    image: nginx@sha256:0123
";
        let d = run("latest-tag", yaml);
        assert_eq!(lines(&d), vec![8, 10]);
        assert!(d[0].message.contains(":latest"));
        assert!(d[1].message.contains("no tag"));
    }

    #[test]
    fn test_recommended_labels() {
        let yaml = "\
apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  selector: {app: web}
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: c
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  labels:
    app.kubernetes.io/name: web
";
        let d = run("missing-recommended-labels", yaml);
        assert_eq!(lines(&d), vec![3]);
        assert!(d[0].message.contains("Service \"web\""));
    }

    #[test]
    fn test_default_namespace() {
        let yaml = "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: implicit
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: explicit
  namespace: default
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: placed
  namespace: shop
---
apiVersion: v1
kind: Namespace
metadata:
  name: shop
";
        let d = run("default-namespace", yaml);
        assert_eq!(lines(&d), vec![3, 10]);
        assert!(d[0].message.contains("does not set a namespace"));
        assert!(d[1].message.contains("default namespace"));
    }
}
