//! Analysis orchestration.
//!
//! Ties together parsing, extraction, the registry, schema validation, the
//! rule catalog, the reference graph and scoring into the single
//! [`analyze`] entry point.

use crate::analyzer::config::AnalyzerConfig;
use crate::analyzer::extract::{self, Resource, codes, detect_family};
use crate::analyzer::graph::{ResourceGraph, build_graph};
use crate::analyzer::parser::{ParsedInput, parse};
use crate::analyzer::pragma::should_ignore_rule;
use crate::analyzer::registry::ResourceRegistry;
use crate::analyzer::rules::{
    RegistryContext, ResourceContext, Rule, RuleCatalog, RuleContext, RuleScope,
    builtin_catalog,
};
use crate::analyzer::schema::{ValidatorSet, builtin_validators, validate_resources};
use crate::analyzer::scoring::{self, Score};
use crate::analyzer::types::{Diagnostic, Finding, ManifestFamily, RuleCategory, Severity};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Identity of an analyzed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub line: u32,
}

impl From<&Resource> for ResourceSummary {
    fn from(resource: &Resource) -> Self {
        Self {
            kind: resource.kind.clone(),
            name: resource.name.clone(),
            namespace: resource.namespace.clone(),
            line: resource.line(),
        }
    }
}

/// Result of analyzing one input.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub family: ManifestFamily,
    /// False when any document had a syntax error.
    pub parse_success: bool,
    /// Non-empty documents seen.
    pub documents_processed: usize,
    /// Findings sorted by position.
    pub findings: Vec<Finding>,
    pub resources: Vec<ResourceSummary>,
    pub type_counts: BTreeMap<String, usize>,
    pub graph: ResourceGraph,
    pub score: Score,
    /// Number of catalog rules that were run.
    pub rules_run: usize,
}

impl AnalysisResult {
    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    /// Get the maximum severity in the results.
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    /// Check if the results should cause a non-zero exit.
    pub fn should_fail(&self, config: &AnalyzerConfig) -> bool {
        if config.no_fail {
            return false;
        }
        self.findings_at_least(config.failure_threshold)
            .next()
            .is_some()
    }

    /// Findings at or above a severity.
    pub fn findings_at_least(&self, threshold: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity >= threshold)
    }
}

/// Analyze manifest text with the built-in validators and rules.
pub fn analyze(text: &str, config: &AnalyzerConfig) -> AnalysisResult {
    analyze_with(text, config, builtin_validators(), builtin_catalog())
}

/// Analyze manifest text with explicit validators and rules.
pub fn analyze_with(
    text: &str,
    config: &AnalyzerConfig,
    validators: &dyn ValidatorSet,
    catalog: &RuleCatalog,
) -> AnalysisResult {
    let parsed = parse(text);
    let family = config.family.unwrap_or_else(|| detect_family(&parsed));
    log::debug!(
        "analyzing {} document(s) as {}",
        parsed.documents.len(),
        family
    );

    if !parsed.is_success() {
        return failed_parse(&parsed, family);
    }

    let extraction = extract::extract(&parsed, family, &config.policy);
    let documents_processed = extraction.documents_processed;
    let mut findings = extraction.findings;
    let registry = ResourceRegistry::from_resources(extraction.resources);

    let schema = validate_resources(registry.resources(), validators, &parsed.line_index);
    findings.extend(schema.findings);

    let rules: Vec<&dyn Rule> = catalog
        .for_family(family)
        .filter(|rule| config.is_rule_enabled(rule.code().as_str()))
        .collect();
    for rule in &rules {
        findings.extend(run_rule(*rule, &registry, &parsed, config, &schema.failed));
    }

    let graph = build_graph(&registry, &config.policy, &parsed.line_index);
    let findings = dedup_and_sort(findings);
    let score = scoring::score(&findings, family);

    log::info!(
        "{} resource(s), {} finding(s), score {:.1} ({})",
        registry.len(),
        findings.len(),
        score.overall,
        score.grade
    );

    AnalysisResult {
        family,
        parse_success: true,
        documents_processed,
        findings,
        resources: registry.resources().iter().map(ResourceSummary::from).collect(),
        type_counts: registry.type_counts(),
        graph,
        score,
        rules_run: rules.len(),
    }
}

fn failed_parse(parsed: &ParsedInput, family: ManifestFamily) -> AnalysisResult {
    let findings = parsed
        .errors()
        .map(|err| {
            Finding::new(
                codes::YAML_SYNTAX,
                Severity::Error,
                RuleCategory::Schema,
                err.message.clone(),
                err.position,
            )
        })
        .collect();
    log::warn!("input has syntax errors, skipping analysis");

    AnalysisResult {
        family,
        parse_success: false,
        documents_processed: parsed.non_empty().count(),
        findings: dedup_and_sort(findings),
        resources: Vec::new(),
        type_counts: BTreeMap::new(),
        graph: ResourceGraph::default(),
        score: Score::failed(family),
        rules_run: 0,
    }
}

/// Run one rule and stamp its diagnostics.
fn run_rule(
    rule: &dyn Rule,
    registry: &ResourceRegistry,
    parsed: &ParsedInput,
    config: &AnalyzerConfig,
    schema_failed: &HashSet<usize>,
) -> Vec<Finding> {
    let code = rule.code().as_str();
    let mut diagnostics = Vec::new();

    match rule.scope() {
        RuleScope::Resource => {
            for (i, resource) in registry.resources().iter().enumerate() {
                if should_ignore_rule(resource, code) {
                    log::debug!("{} ignored for {} by annotation", code, resource.id());
                    continue;
                }
                let context = RuleContext::Resource(ResourceContext {
                    resource,
                    registry,
                    line_index: &parsed.line_index,
                    schema_valid: !schema_failed.contains(&i),
                    policy: &config.policy,
                });
                diagnostics.extend(isolated(rule, &context, &resource.id()));
            }
        }
        RuleScope::Registry => {
            let context = RuleContext::Registry(RegistryContext {
                resources: registry.resources(),
                registry,
                line_index: &parsed.line_index,
                policy: &config.policy,
            });
            diagnostics.extend(isolated(rule, &context, "registry"));
        }
    }

    diagnostics
        .into_iter()
        .map(|d| Finding::from_diagnostic(rule.code(), rule.severity(), rule.category(), d))
        .collect()
}

/// Run a check, turning a panic into zero diagnostics.
fn isolated(rule: &dyn Rule, context: &RuleContext<'_>, target: &str) -> Vec<Diagnostic> {
    match catch_unwind(AssertUnwindSafe(|| rule.check(context))) {
        Ok(diagnostics) => diagnostics,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("rule {} failed on {}: {}", rule.code(), target, reason);
            Vec::new()
        }
    }
}

/// Drop repeated (rule, line, column, message) findings and sort.
fn dedup_and_sort(findings: Vec<Finding>) -> Vec<Finding> {
    let mut seen = HashSet::new();
    let mut findings: Vec<Finding> = findings
        .into_iter()
        .filter(|f| seen.insert((f.code.clone(), f.line, f.column, f.message.clone())))
        .collect();
    findings.sort();
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::rules::{CheckFn, RuleMeta, SimpleRule};
    use crate::analyzer::schema::categorize::ids;
    use crate::analyzer::scoring::Grade;

    #[test]
    fn test_empty_input() {
        let result = analyze("", &AnalyzerConfig::default());
        assert!(result.parse_success);
        assert!(result.resources.is_empty());
        assert!(result.findings.is_empty());
        assert_eq!(result.score.overall, 100.0);
        assert_eq!(result.score.grade, Grade::APlus);
    }

    #[test]
    fn test_syntax_error_fails_parse() {
        let result = analyze(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: ok\n---\nkey: [unclosed\n",
            &AnalyzerConfig::default(),
        );
        assert!(!result.parse_success);
        assert!(result.resources.is_empty());
        assert!(!result.findings.is_empty());
        assert!(result.findings.iter().all(|f| f.code.as_str() == codes::YAML_SYNTAX));
        assert_eq!(result.score.grade, Grade::F);
        assert_eq!(result.score.overall, 0.0);
        assert_eq!(result.rules_run, 0);
    }

    #[test]
    fn test_missing_name_skips_schema() {
        let result = analyze(
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  labels: {a: b}\nspec: 7\n",
            &AnalyzerConfig::default(),
        );
        assert!(result.resources.is_empty());
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].code.as_str(), codes::MISSING_NAME);
        assert_eq!(result.findings[0].line, 1);
        assert_eq!(result.documents_processed, 1);
    }

    #[test]
    fn test_findings_are_sorted() {
        let result = analyze(
            "\
apiVersion: v1
kind: Pod
metadata:
  name: p
spec:
  hostNetwork: true
  containers:
  - name: app
    image: app
    securityContext:
      privileged: true
    ports:
    - containerPort: 99999
",
            &AnalyzerConfig::default(),
        );
        assert!(result.parse_success);
        let positions: Vec<_> = result.findings.iter().map(|f| (f.line, f.column)).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
        assert!(result.findings.iter().any(|f| f.code.as_str() == ids::INVALID_PORT));
        assert!(result.findings.iter().any(|f| f.code.as_str() == "privileged-container"));
        assert!(result.score.overall < 100.0);
        assert_eq!(result.type_counts.get("Pod"), Some(&1));
    }

    #[test]
    fn test_pragma_suppresses_resource_rule() {
        let yaml = "\
apiVersion: v1
kind: Pod
metadata:
  name: p
  annotations:
    ignore-check.manifest-lint.io/privileged-container: \"debug pod\"
spec:
  containers:
  - name: app
    image: app:1.0
    securityContext:
      privileged: true
";
        let result = analyze(yaml, &AnalyzerConfig::default());
        assert!(!result.findings.iter().any(|f| f.code.as_str() == "privileged-container"));
    }

    #[test]
    fn test_include_exclude() {
        let yaml = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: p\nspec:\n  containers:\n  - name: a\n    image: a\n";
        let only = analyze(yaml, &AnalyzerConfig::default().include("latest-tag"));
        assert_eq!(only.rules_run, 1);
        assert!(only.findings.iter().all(|f| f.code.as_str() == "latest-tag"));

        let without = analyze(yaml, &AnalyzerConfig::default().exclude("latest-tag"));
        assert!(!without.findings.iter().any(|f| f.code.as_str() == "latest-tag"));
    }

    #[test]
    fn test_schema_invalid_resource_skips_dependent_rules() {
        let yaml = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  selector: nope
  template: 5
";
        let result = analyze(yaml, &AnalyzerConfig::default());
        let codes: Vec<_> = result.findings.iter().map(|f| f.code.as_str()).collect();
        assert!(codes.contains(&ids::INVALID_FIELD_TYPE), "{:?}", codes);
        assert!(!codes.contains(&"selector-template-mismatch"));
        assert!(!codes.contains(&"single-replica"));

        let valid = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  selector:
    matchLabels: {app: web}
  template:
    metadata:
      labels: {app: api}
    spec:
      containers:
      - {name: web, image: web:1.0}
";
        let result = analyze(valid, &AnalyzerConfig::default());
        let codes: Vec<_> = result.findings.iter().map(|f| f.code.as_str()).collect();
        assert!(codes.contains(&"selector-template-mismatch"), "{:?}", codes);
    }

    #[test]
    fn test_threshold_selects_findings() {
        let result = analyze(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: c\n",
            &AnalyzerConfig::default().include("default-namespace"),
        );
        assert!(!result.findings.is_empty());
        assert!(result.findings_at_least(Severity::Error).next().is_none());
        assert_eq!(
            result.findings_at_least(Severity::Info).count(),
            result.findings.len()
        );
        let strict = AnalyzerConfig {
            failure_threshold: Severity::Error,
            ..AnalyzerConfig::default()
        };
        assert!(!result.should_fail(&strict));
    }

    fn explode(_: &ResourceContext<'_>) -> Vec<Diagnostic> {
        panic!("boom")
    }

    #[test]
    fn test_panicking_rule_is_isolated() {
        let catalog = RuleCatalog::new(vec![
            Box::new(SimpleRule::new(
                "explodes",
                "Explodes",
                Severity::Error,
                RuleCategory::Security,
                ManifestFamily::Kubernetes,
                RuleMeta::new("x", "a", "b"),
                CheckFn::Resource(explode),
            )),
            Box::new(SimpleRule::new(
                "always",
                "Always",
                Severity::Info,
                RuleCategory::BestPractice,
                ManifestFamily::Kubernetes,
                RuleMeta::new("x", "a", "b"),
                CheckFn::Resource(|ctx| vec![Diagnostic::new("hit", ctx.resource.position)]),
            )),
        ]);
        let result = analyze_with(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: c\n",
            &AnalyzerConfig::default(),
            builtin_validators(),
            &catalog,
        );
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].code.as_str(), "always");
        assert_eq!(result.rules_run, 2);
    }

    #[test]
    fn test_compose_family_detected() {
        let result = analyze(
            "services:\n  web:\n    image: nginx\n    depends_on: [db]\n  db:\n    image: postgres:16\n    restart: always\n",
            &AnalyzerConfig::default(),
        );
        assert_eq!(result.family, ManifestFamily::Compose);
        assert_eq!(result.resources.len(), 2);
        assert_eq!(result.graph.order, vec!["service/default/db", "service/default/web"]);
        let codes: Vec<_> = result.findings.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["compose-no-restart-policy", "compose-latest-tag"]);
    }

    #[test]
    fn test_determinism() {
        let yaml = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  selector:
    matchLabels: {app: web}
  template:
    metadata:
      labels: {app: web}
    spec:
      containers:
      - name: web
        image: web
        envFrom:
        - configMapRef: {name: missing}
";
        let first = analyze(yaml, &AnalyzerConfig::default());
        let second = analyze(yaml, &AnalyzerConfig::default());
        assert_eq!(first.findings, second.findings);
        assert_eq!(first.score, second.score);
    }
}
