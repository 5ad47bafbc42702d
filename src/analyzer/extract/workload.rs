//! Workload helpers: pod templates and containers.
//!
//! Every function re-derives what it needs from the resource tree. Rules
//! call these independently instead of sharing a cache.

use crate::analyzer::extract::Resource;
use crate::analyzer::parser::Node;
use crate::analyzer::parser::node::join_pointer;
use std::collections::BTreeMap;

/// Kinds that embed a pod template.
pub const WORKLOAD_KINDS: &[&str] = &[
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "ReplicaSet",
    "ReplicationController",
    "Job",
    "CronJob",
    "Pod",
];

/// Pointer to the pod template of a workload kind. Empty for `Pod` itself.
pub fn pod_template_pointer(kind: &str) -> Option<&'static str> {
    match kind {
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "ReplicationController"
        | "Job" => Some("/spec/template"),
        "CronJob" => Some("/spec/jobTemplate/spec/template"),
        "Pod" => Some(""),
        _ => None,
    }
}

/// Pointer to the pod spec of a workload kind.
pub fn pod_spec_pointer(kind: &str) -> Option<String> {
    pod_template_pointer(kind).map(|t| format!("{}/spec", t))
}

/// Check if a resource kind carries a pod spec.
pub fn is_workload(kind: &str) -> bool {
    pod_template_pointer(kind).is_some()
}

/// The pod spec of a workload.
pub fn pod_spec(resource: &Resource) -> Option<&Node> {
    let pointer = pod_spec_pointer(&resource.kind)?;
    resource.root.pointer(&pointer)
}

/// Labels of the pod template (`metadata.labels` for a bare Pod).
pub fn template_labels(resource: &Resource) -> BTreeMap<String, String> {
    let Some(template) = pod_template_pointer(&resource.kind) else {
        return BTreeMap::new();
    };
    resource
        .root
        .pointer(&format!("{}/metadata/labels", template))
        .map(Node::string_map)
        .unwrap_or_default()
}

/// A container inside a pod spec.
#[derive(Debug, Clone)]
pub struct Container<'a> {
    pub node: &'a Node,
    pub pointer: String,
    pub init: bool,
}

impl<'a> Container<'a> {
    pub fn name(&self) -> String {
        self.node
            .get("name")
            .and_then(Node::scalar_string)
            .unwrap_or_else(|| "<unnamed>".to_string())
    }

    pub fn image(&self) -> Option<&'a str> {
        self.node.get("image").and_then(Node::as_str)
    }

    /// Pointer to a field of this container.
    pub fn field(&self, path: &[&str]) -> String {
        format!("{}{}", self.pointer, join_pointer(path))
    }

    pub fn describe(&self) -> String {
        let label = if self.init { "init container" } else { "container" };
        format!("{} \"{}\"", label, self.name())
    }
}

/// All containers of a workload, init containers included.
pub fn containers(resource: &Resource) -> Vec<Container<'_>> {
    let mut out = regular_containers(resource);
    out.extend(init_containers(resource));
    out
}

/// Only regular containers.
pub fn regular_containers(resource: &Resource) -> Vec<Container<'_>> {
    collect(resource, "containers", false)
}

/// Only init containers.
pub fn init_containers(resource: &Resource) -> Vec<Container<'_>> {
    collect(resource, "initContainers", true)
}

fn collect<'a>(resource: &'a Resource, key: &str, init: bool) -> Vec<Container<'a>> {
    let Some(spec_pointer) = pod_spec_pointer(&resource.kind) else {
        return Vec::new();
    };
    let Some(list) = resource.root.pointer(&spec_pointer).and_then(|s| s.get(key)) else {
        return Vec::new();
    };
    list.items()
        .iter()
        .enumerate()
        .filter(|(_, node)| node.is_mapping())
        .map(|(i, node)| Container {
            node,
            pointer: format!("{}/{}/{}", spec_pointer, key, i),
            init,
        })
        .collect()
}
