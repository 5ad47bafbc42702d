//! Rule system framework.
//!
//! Provides the infrastructure for defining and running manifest rules:
//! - `Rule` trait for all rules
//! - `SimpleRule` for rules backed by a plain check function
//! - `RuleCatalog`, the immutable ordered collection the engine runs
//!
//! A rule is a pure function of its context. Rules never share state and
//! re-derive whatever helper data they need (containers, selectors, the
//! reference graph) on every call.

use crate::analyzer::config::EnginePolicy;
use crate::analyzer::extract::Resource;
use crate::analyzer::parser::LineIndex;
use crate::analyzer::registry::ResourceRegistry;
use crate::analyzer::types::{Diagnostic, ManifestFamily, RuleCategory, RuleCode, Severity};
use serde::Serialize;
use std::sync::OnceLock;

pub mod compose;
pub mod kubernetes;

/// Whether a rule looks at one resource or at all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    /// Called once per resource.
    Resource,
    /// Called once per run with the whole registry.
    Registry,
}

/// Context for a resource-scoped rule.
#[derive(Debug, Clone, Copy)]
pub struct ResourceContext<'a> {
    pub resource: &'a Resource,
    pub registry: &'a ResourceRegistry,
    pub line_index: &'a LineIndex,
    /// False when the resource failed schema validation.
    pub schema_valid: bool,
    pub policy: &'a EnginePolicy,
}

/// Context for a registry-scoped rule.
#[derive(Debug, Clone, Copy)]
pub struct RegistryContext<'a> {
    pub resources: &'a [Resource],
    pub registry: &'a ResourceRegistry,
    pub line_index: &'a LineIndex,
    pub policy: &'a EnginePolicy,
}

/// What a rule's `check` receives.
#[derive(Debug, Clone, Copy)]
pub enum RuleContext<'a> {
    Resource(ResourceContext<'a>),
    Registry(RegistryContext<'a>),
}

/// A before/after remediation example.
#[derive(Debug, Clone, Serialize)]
pub struct FixExample {
    pub before: &'static str,
    pub after: &'static str,
}

/// Human documentation for a rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleMeta {
    pub explanation: &'static str,
    pub fix: FixExample,
}

impl RuleMeta {
    pub const fn new(explanation: &'static str, before: &'static str, after: &'static str) -> Self {
        Self {
            explanation,
            fix: FixExample { before, after },
        }
    }
}

/// A rule that checks manifests.
pub trait Rule: Send + Sync {
    /// Stable rule id (e.g., "privileged-container").
    fn code(&self) -> &RuleCode;

    /// Short human title.
    fn title(&self) -> &str;

    fn severity(&self) -> Severity;

    fn category(&self) -> RuleCategory;

    /// Which manifest family the rule applies to.
    fn family(&self) -> ManifestFamily;

    fn meta(&self) -> &RuleMeta;

    fn scope(&self) -> RuleScope;

    /// Run the check. A context of the wrong scope yields nothing.
    fn check(&self, context: &RuleContext<'_>) -> Vec<Diagnostic>;
}

/// Check function of a [`SimpleRule`].
#[derive(Clone, Copy)]
pub enum CheckFn {
    Resource(fn(&ResourceContext<'_>) -> Vec<Diagnostic>),
    Registry(fn(&RegistryContext<'_>) -> Vec<Diagnostic>),
}

/// Rule implementation backed by a plain function.
pub struct SimpleRule {
    code: RuleCode,
    title: &'static str,
    severity: Severity,
    category: RuleCategory,
    family: ManifestFamily,
    meta: RuleMeta,
    check_fn: CheckFn,
}

impl SimpleRule {
    pub fn new(
        code: impl Into<RuleCode>,
        title: &'static str,
        severity: Severity,
        category: RuleCategory,
        family: ManifestFamily,
        meta: RuleMeta,
        check_fn: CheckFn,
    ) -> Self {
        Self {
            code: code.into(),
            title,
            severity,
            category,
            family,
            meta,
            check_fn,
        }
    }
}

impl Rule for SimpleRule {
    fn code(&self) -> &RuleCode {
        &self.code
    }

    fn title(&self) -> &str {
        self.title
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn category(&self) -> RuleCategory {
        self.category
    }

    fn family(&self) -> ManifestFamily {
        self.family
    }

    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn scope(&self) -> RuleScope {
        match self.check_fn {
            CheckFn::Resource(_) => RuleScope::Resource,
            CheckFn::Registry(_) => RuleScope::Registry,
        }
    }

    fn check(&self, context: &RuleContext<'_>) -> Vec<Diagnostic> {
        match (self.check_fn, context) {
            (CheckFn::Resource(f), RuleContext::Resource(ctx)) => f(ctx),
            (CheckFn::Registry(f), RuleContext::Registry(ctx)) => f(ctx),
            _ => Vec::new(),
        }
    }
}

/// The ordered, immutable set of rules an engine runs.
pub struct RuleCatalog {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleCatalog {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Every built-in rule, in catalog order.
    pub fn builtin_rules() -> Vec<Box<dyn Rule>> {
        let mut rules = kubernetes::rules();
        rules.extend(compose::rules());
        rules
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Rules applying to one family.
    pub fn for_family(&self, family: ManifestFamily) -> impl Iterator<Item = &dyn Rule> {
        self.iter().filter(move |r| r.family() == family)
    }

    pub fn get(&self, code: &str) -> Option<&dyn Rule> {
        self.iter().find(|r| r.code().as_str() == code)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Definitions for documentation and `rules` output.
    pub fn definitions(&self) -> Vec<RuleDefinition> {
        self.iter().map(RuleDefinition::from_rule).collect()
    }
}

static BUILTIN: OnceLock<RuleCatalog> = OnceLock::new();

/// The process-wide built-in catalog.
pub fn builtin_catalog() -> &'static RuleCatalog {
    BUILTIN.get_or_init(|| RuleCatalog::new(RuleCatalog::builtin_rules()))
}

/// Rule definition for documentation/introspection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    pub code: RuleCode,
    pub title: String,
    pub severity: Severity,
    pub category: RuleCategory,
    pub family: ManifestFamily,
    pub scope: RuleScope,
    pub explanation: String,
    pub fix: FixExample,
}

impl RuleDefinition {
    fn from_rule(rule: &dyn Rule) -> Self {
        Self {
            code: rule.code().clone(),
            title: rule.title().to_string(),
            severity: rule.severity(),
            category: rule.category(),
            family: rule.family(),
            scope: rule.scope(),
            explanation: rule.meta().explanation.to_string(),
            fix: rule.meta().fix.clone(),
        }
    }
}

/// Image reference split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef<'a> {
    pub repository: &'a str,
    pub tag: Option<&'a str>,
    pub digest: Option<&'a str>,
}

impl<'a> ImageRef<'a> {
    /// Parse `registry:5000/repo/name:tag@sha256:...`.
    pub fn parse(image: &'a str) -> Self {
        let (rest, digest) = match image.split_once('@') {
            Some((rest, digest)) => (rest, Some(digest)),
            None => (image, None),
        };
        // A colon after the last slash separates the tag; earlier ones are ports.
        let name_start = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
        match rest[name_start..].rfind(':') {
            Some(i) => Self {
                repository: &rest[..name_start + i],
                tag: Some(&rest[name_start + i + 1..]),
                digest,
            },
            None => Self {
                repository: rest,
                tag: None,
                digest,
            },
        }
    }

    /// Unpinned: `:latest` or no tag and no digest.
    pub fn is_floating(&self) -> bool {
        self.digest.is_none() && matches!(self.tag, None | Some("latest"))
    }
}
