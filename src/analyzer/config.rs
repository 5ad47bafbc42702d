//! Configuration for the manifest analyzer.
//!
//! Provides:
//! - Rule inclusion/exclusion
//! - Path ignoring for directory runs
//! - Failure thresholds
//! - The engine policy: default namespace, cluster-scoped kinds and
//!   implicit objects that references may target without being declared

use crate::analyzer::types::{ManifestFamily, Severity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File names searched by [`AnalyzerConfig::load_from_default`].
pub const DEFAULT_CONFIG_FILES: &[&str] = &[".manifest-lint.yaml", ".manifest-lint.yml"];

/// Configuration for an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerConfig {
    /// Rule ids to run. When non-empty, every other rule is skipped.
    #[serde(default)]
    pub include: Vec<String>,

    /// Rule ids never to run.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Glob patterns for paths to ignore.
    #[serde(default)]
    pub ignore_paths: Vec<String>,

    /// Minimum severity that makes the run fail.
    #[serde(default)]
    pub failure_threshold: Severity,

    /// If true, never return a non-zero exit code.
    #[serde(default)]
    pub no_fail: bool,

    /// Force a manifest family instead of detecting it.
    #[serde(default)]
    pub family: Option<ManifestFamily>,

    /// Engine policy.
    #[serde(default)]
    pub policy: EnginePolicy,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            ignore_paths: Vec::new(),
            failure_threshold: Severity::Warning,
            no_fail: false,
            family: None,
            policy: EnginePolicy::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule to the include list.
    pub fn include(mut self, rule: impl Into<String>) -> Self {
        self.include.push(rule.into());
        self
    }

    /// Add a rule to the exclude list.
    pub fn exclude(mut self, rule: impl Into<String>) -> Self {
        self.exclude.push(rule.into());
        self
    }

    /// Add a path pattern to ignore.
    pub fn ignore_path(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_paths.push(pattern.into());
        self
    }

    /// Set the failure threshold.
    pub fn with_threshold(mut self, threshold: Severity) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Force a manifest family.
    pub fn with_family(mut self, family: ManifestFamily) -> Self {
        self.family = Some(family);
        self
    }

    /// Replace the engine policy.
    pub fn with_policy(mut self, policy: EnginePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether a rule is allowed to run under the include/exclude lists.
    pub fn is_rule_enabled(&self, rule: &str) -> bool {
        if self.exclude.iter().any(|e| e == rule) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|i| i == rule)
    }

    /// Check if a file path should be ignored based on `ignore_paths`.
    pub fn should_ignore_path(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.ignore_paths.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|glob| glob.matches(&path_str))
                .unwrap_or(false)
                || path_str.contains(pattern.as_str())
        })
    }

    /// Load configuration from a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&content)
    }

    /// Load configuration from a YAML string.
    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Try the default file names in the current directory.
    pub fn load_from_default() -> Option<Self> {
        DEFAULT_CONFIG_FILES.iter().find_map(|name| {
            let path = Path::new(name);
            if !path.exists() {
                return None;
            }
            match Self::load_from_file(path) {
                Ok(config) => Some(config),
                Err(err) => {
                    log::warn!("ignoring {}: {}", name, err);
                    None
                }
            }
        })
    }
}

/// A reference target that is allowed to be missing from the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicitObject {
    pub kind: String,
    /// Exact name, or a prefix when it ends with `*`.
    pub name: String,
}

impl ImplicitObject {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn matches(&self, kind: &str, name: &str) -> bool {
        if self.kind != kind {
            return false;
        }
        match self.name.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => self.name == name,
        }
    }
}

/// Policy values the engine consults instead of hard-coding them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnginePolicy {
    /// Namespace given to namespaced resources that omit one.
    pub default_namespace: String,
    /// Objects every cluster or compose project provides.
    pub implicit_objects: Vec<ImplicitObject>,
    /// Kinds that live outside any namespace.
    pub cluster_scoped_kinds: Vec<String>,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            default_namespace: "default".to_string(),
            implicit_objects: vec![
                ImplicitObject::new("ServiceAccount", "default"),
                ImplicitObject::new("ConfigMap", "kube-root-ca.crt"),
                ImplicitObject::new("ClusterRole", "cluster-admin"),
                ImplicitObject::new("ClusterRole", "admin"),
                ImplicitObject::new("ClusterRole", "edit"),
                ImplicitObject::new("ClusterRole", "view"),
                ImplicitObject::new("ClusterRole", "system:*"),
                ImplicitObject::new("network", "default"),
                ImplicitObject::new("network", "host"),
                ImplicitObject::new("network", "none"),
            ],
            cluster_scoped_kinds: [
                "Namespace",
                "Node",
                "PersistentVolume",
                "StorageClass",
                "ClusterRole",
                "ClusterRoleBinding",
                "CustomResourceDefinition",
                "PriorityClass",
                "IngressClass",
                "ValidatingWebhookConfiguration",
                "MutatingWebhookConfiguration",
                "APIService",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
        }
    }
}

impl EnginePolicy {
    pub fn is_cluster_scoped(&self, kind: &str) -> bool {
        self.cluster_scoped_kinds.iter().any(|k| k == kind)
    }

    pub fn is_implicit(&self, kind: &str, name: &str) -> bool {
        self.implicit_objects.iter().any(|o| o.matches(kind, name))
    }

    /// Namespace a resource of `kind` ends up in.
    pub fn resolve_namespace(&self, kind: &str, declared: Option<&str>) -> String {
        if self.is_cluster_scoped(kind) {
            return String::new();
        }
        match declared {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => self.default_namespace.clone(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}
