use manifest_lint::analyzer::scoring::score;
use manifest_lint::{
    AnalysisResult, AnalyzerConfig, Finding, Grade, ManifestFamily, Severity, analyze,
};
use manifest_lint::analyzer::types::{Position, RuleCategory};
use proptest::prelude::*;
use proptest::test_runner::Config;

fn deployment(name: &str, replicas: u8, tag: &str, privileged: bool, host_network: bool) -> String {
    format!(
        "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}
spec:
  replicas: {replicas}
  selector:
    matchLabels:
      app: {name}
  template:
    metadata:
      labels:
        app: {name}
    spec:
      hostNetwork: {host_network}
      containers:
        - name: main
          image: registry.example.com/{name}:{tag}
          securityContext:
            privileged: {privileged}
"
    )
}

fn manifest() -> impl Strategy<Value = String> {
    prop::collection::vec(
        (
            "svc-[a-z0-9]{1,8}",
            0_u8..4,
            prop::sample::select(vec!["latest", "1.2.3", "stable"]),
            any::<bool>(),
            any::<bool>(),
        ),
        0..4,
    )
    .prop_map(|docs| {
        docs.into_iter()
            .map(|(name, replicas, tag, privileged, host)| {
                deployment(&name, replicas, tag, privileged, host)
            })
            .collect::<Vec<_>>()
            .join("---\n")
    })
}

/// Fragments that exercise YAML structure rather than plain text.
fn yaml_noise() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![
            "---\n", "- ", ": ", "[", "]", "{", "}", ",", "&a ", "*a ", "&b ", "*b ", "!!str ",
            "? ", "|\n", ">\n", "'", "\"", "#", "\n", "  ", "\t", "kind: Pod\n",
            "apiVersion: v1\n", "metadata:\n  name: x\n", "services:\n", "%YAML 1.2\n", "~",
            "\u{0}", "\u{feff}", "é",
        ]),
        0..40,
    )
    .prop_map(|parts| parts.concat())
}

fn assert_well_formed(result: &AnalysisResult) -> Result<(), TestCaseError> {
    prop_assert!((0.0..=100.0).contains(&result.score.overall));
    if !result.parse_success {
        prop_assert!(result.resources.is_empty());
        prop_assert_eq!(result.score.overall, 0.0);
        prop_assert_eq!(result.score.grade, Grade::F);
    }
    Ok(())
}

fn category() -> impl Strategy<Value = RuleCategory> {
    prop::sample::select(vec![
        RuleCategory::Schema,
        RuleCategory::Security,
        RuleCategory::Reliability,
        RuleCategory::BestPractice,
        RuleCategory::CrossResource,
        RuleCategory::Style,
        RuleCategory::Semantic,
    ])
}

fn severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(vec![Severity::Error, Severity::Warning, Severity::Info])
}

fn finding(severity: Severity, category: RuleCategory) -> Finding {
    Finding::new("generated", severity, category, "generated", Position::start())
}

proptest! {
    #![proptest_config(Config::with_cases(64))]

    #[test]
    fn arbitrary_text_yields_a_result(text in any::<String>()) {
        assert_well_formed(&analyze(&text, &AnalyzerConfig::default()))?;
    }

    #[test]
    fn yaml_punctuation_yields_a_result(text in yaml_noise()) {
        assert_well_formed(&analyze(&text, &AnalyzerConfig::default()))?;
    }

    #[test]
    fn analysis_is_deterministic(text in manifest()) {
        let config = AnalyzerConfig::default();
        let first = serde_json::to_string(&analyze(&text, &config)).unwrap();
        let second = serde_json::to_string(&analyze(&text, &config)).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn findings_are_sorted(text in manifest()) {
        let result = analyze(&text, &AnalyzerConfig::default());
        let positions: Vec<_> = result.findings.iter().map(|f| (f.line, f.column)).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        prop_assert_eq!(positions, sorted);
        prop_assert!((0.0..=100.0).contains(&result.score.overall));
    }

    #[test]
    fn privileged_containers_are_always_found(
        name in "svc-[a-z0-9]{1,8}",
        tag in prop::sample::select(vec!["latest", "1.2.3"]),
    ) {
        let text = deployment(&name, 2, tag, true, false);
        let result = analyze(&text, &AnalyzerConfig::default());
        let hits = result
            .findings
            .iter()
            .filter(|f| f.code.as_str() == "privileged-container")
            .count();
        prop_assert_eq!(hits, 1);
    }

    #[test]
    fn another_finding_never_raises_the_score(
        existing in prop::collection::vec((severity(), category()), 0..20),
        extra in (severity(), category()),
        compose in any::<bool>(),
    ) {
        let family = if compose { ManifestFamily::Compose } else { ManifestFamily::Kubernetes };
        let mut findings: Vec<Finding> =
            existing.iter().map(|&(s, c)| finding(s, c)).collect();
        let before = score(&findings, family);
        findings.push(finding(extra.0, extra.1));
        let after = score(&findings, family);

        prop_assert!(after.overall <= before.overall);
        for category in &after.categories {
            prop_assert!(category.score >= 0.0);
        }
    }
}

#[test]
fn deep_nesting_is_a_syntax_finding() {
    let text = format!("data: {}1{}\n", "[".repeat(5_000), "]".repeat(5_000));
    let result = analyze(&text, &AnalyzerConfig::default());
    assert!(!result.parse_success);
    assert!(result.resources.is_empty());
    assert_eq!(result.score.grade, Grade::F);
}

#[test]
fn chained_aliases_cannot_exceed_nesting() {
    let mut text =
        String::from("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: deep\ndata:\n");
    let wrap = |inner: &str| format!("{}{} {}", "[".repeat(200), inner, "]".repeat(200));
    text.push_str(&format!("  a0: &a0 {}\n", wrap("1")));
    for i in 1..60 {
        let inner = wrap(&format!("*a{}", i - 1));
        text.push_str(&format!("  a{}: &a{} {}\n", i, i, inner));
    }
    let result = analyze(&text, &AnalyzerConfig::default());
    assert!(!result.parse_success);
    assert!(result.resources.is_empty());
    assert!(
        result
            .findings
            .iter()
            .any(|f| f.message.contains("nesting exceeds 256 levels"))
    );
}

#[test]
fn alias_bomb_is_bounded() {
    let mut text = String::from("a0: &a0 [x, x, x, x, x, x, x, x, x, x]\n");
    for i in 1..12 {
        let refs = vec![format!("*a{}", i - 1); 10].join(", ");
        text.push_str(&format!("a{}: &a{} [{}]\n", i, i, refs));
    }
    let result = analyze(&text, &AnalyzerConfig::default());
    assert!(!result.parse_success);
    assert_eq!(result.score.overall, 0.0);
}
