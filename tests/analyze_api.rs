//! End-to-end tests of the library entry point.

use manifest_lint::analyzer::extract::codes;
use manifest_lint::analyzer::graph::EdgeKind;
use manifest_lint::{AnalyzerConfig, Grade, ManifestFamily, Severity, analyze};

fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/manifests/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path, e))
}

fn codes_of(result: &manifest_lint::AnalysisResult) -> Vec<&str> {
    result.findings.iter().map(|f| f.code.as_str()).collect()
}

#[test]
fn empty_input_is_a_clean_pass() {
    for text in ["", "\n\n", "---\n---\n", "# only a comment\n"] {
        let result = analyze(text, &AnalyzerConfig::default());
        assert!(result.parse_success);
        assert!(result.resources.is_empty());
        assert!(result.findings.is_empty());
        assert_eq!(result.score.overall, 100.0);
        assert_eq!(result.score.grade, Grade::APlus);
    }
}

#[test]
fn well_formed_application_has_no_errors() {
    let result = analyze(&fixture("k8s/app.yaml"), &AnalyzerConfig::default());
    assert!(result.parse_success);
    assert_eq!(result.documents_processed, 3);
    assert_eq!(result.resources.len(), 3);
    assert_eq!(result.type_counts.get("Deployment"), Some(&1));
    assert!(!result.has_errors(), "{:?}", result.findings);
    assert!(!result.graph.has_dangling());

    let selects = result
        .graph
        .edges
        .iter()
        .find(|e| e.kind == EdgeKind::Selects)
        .expect("service selects the deployment");
    assert_eq!(selects.source, "Service/shop/web");
    assert_eq!(selects.target_id.as_deref(), Some("Deployment/shop/web"));
}

#[test]
fn risky_pod_is_reported() {
    let result = analyze(&fixture("k8s/risky.yaml"), &AnalyzerConfig::default());
    let codes = codes_of(&result);
    for expected in [
        "host-namespace",
        "privileged-container",
        "dangling-reference",
        "latest-tag",
    ] {
        assert!(codes.contains(&expected), "missing {}", expected);
    }
    assert_eq!(result.max_severity(), Some(Severity::Error));
    assert!(result.score.overall < 100.0);
    assert!(result.should_fail(&AnalyzerConfig::default()));
}

#[test]
fn findings_are_sorted_by_position() {
    let result = analyze(&fixture("k8s/risky.yaml"), &AnalyzerConfig::default());
    let positions: Vec<_> = result.findings.iter().map(|f| (f.line, f.column)).collect();
    let mut sorted = positions.clone();
    sorted.sort();
    assert_eq!(positions, sorted);
}

#[test]
fn dangling_reference_resolves_once_target_exists() {
    let pod = "\
apiVersion: v1
kind: Pod
metadata:
  name: web
spec:
  containers:
    - name: app
      image: app:1.0
      envFrom:
        - configMapRef:
            name: settings
      volumeMounts:
        - name: data
          mountPath: /data
  volumes:
    - name: data
      persistentVolumeClaim:
        claimName: data
---
apiVersion: v1
kind: PersistentVolumeClaim
metadata:
  name: data
";
    let before = analyze(pod, &AnalyzerConfig::default());
    let dangling: Vec<_> = before.graph.dangling_edges().collect();
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].target.kind, "ConfigMap");
    assert_eq!(dangling[0].target.name, "settings");
    assert!(codes_of(&before).contains(&"dangling-reference"));

    let with_config = format!(
        "{}---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\n",
        pod
    );
    let after = analyze(&with_config, &AnalyzerConfig::default());
    assert!(!after.graph.has_dangling());
    assert!(!codes_of(&after).contains(&"dangling-reference"));

    let claims = |r: &manifest_lint::AnalysisResult| {
        r.graph
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::ClaimsStorage)
            .map(|e| (e.source.clone(), e.resolved))
            .collect::<Vec<_>>()
    };
    assert_eq!(claims(&before), claims(&after));
}

#[test]
fn missing_name_stops_the_document() {
    let result = analyze(
        "apiVersion: v1\nkind: Service\nmetadata:\n  labels: {a: b}\nspec: {ports: 3}\n",
        &AnalyzerConfig::default(),
    );
    assert_eq!(codes_of(&result), vec![codes::MISSING_NAME]);
    assert_eq!(result.findings[0].line, 1);
    assert!(result.resources.is_empty());
    assert_eq!(result.documents_processed, 1);
}

#[test]
fn syntax_error_fails_the_parse() {
    let result = analyze(&fixture("broken.yaml"), &AnalyzerConfig::default());
    assert!(!result.parse_success);
    assert!(result.resources.is_empty());
    assert!(codes_of(&result).iter().all(|c| *c == codes::YAML_SYNTAX));
    assert!(!result.findings.is_empty());
    assert_eq!(result.score.overall, 0.0);
    assert_eq!(result.score.grade, Grade::F);
}

#[test]
fn compose_project_cycles_and_ports() {
    let result = analyze(
        &fixture("compose/docker-compose.yml"),
        &AnalyzerConfig::default(),
    );
    assert_eq!(result.family, ManifestFamily::Compose);
    let codes = codes_of(&result);
    assert!(codes.contains(&"compose-dependency-cycle"));
    assert!(codes.contains(&"compose-duplicate-host-port"));

    let mut cyclic = result.graph.cycles.clone();
    cyclic.sort();
    assert_eq!(cyclic, vec!["service/default/api", "service/default/web"]);

    let port = result
        .findings
        .iter()
        .find(|f| f.code.as_str() == "compose-duplicate-host-port")
        .unwrap();
    assert_eq!(port.line, 12);
}

#[test]
fn compose_cycle_excludes_independent_services() {
    let text = "\
services:
  a:
    image: a:1
    depends_on: [b]
  b:
    image: b:1
    depends_on: [c]
  c:
    image: c:1
    depends_on: [a]
  d:
    image: d:1
";
    let result = analyze(text, &AnalyzerConfig::default());
    let mut cyclic = result.graph.cycles.clone();
    cyclic.sort();
    assert_eq!(cyclic, vec!["service/default/a", "service/default/b", "service/default/c"]);
    assert!(result.graph.order.contains(&"service/default/d".to_string()));
}

#[test]
fn rule_filters_apply() {
    let text = fixture("k8s/risky.yaml");
    let only = analyze(&text, &AnalyzerConfig::default().include("latest-tag"));
    assert_eq!(codes_of(&only), vec!["latest-tag"]);

    let without = analyze(&text, &AnalyzerConfig::default().exclude("latest-tag"));
    assert!(!codes_of(&without).contains(&"latest-tag"));
}

#[test]
fn forced_family_overrides_detection() {
    let text = fixture("compose/docker-compose.yml");
    let result = analyze(
        &text,
        &AnalyzerConfig::default().with_family(ManifestFamily::Kubernetes),
    );
    assert_eq!(result.family, ManifestFamily::Kubernetes);
    assert!(codes_of(&result).contains(&codes::MISSING_KIND));
}

#[test]
fn result_serializes_to_json() {
    let result = analyze(&fixture("k8s/app.yaml"), &AnalyzerConfig::default());
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["family"], "kubernetes");
    assert_eq!(value["parseSuccess"], true);
    assert!(value["graph"]["edges"].as_array().is_some());
    assert!(value["score"]["grade"].is_string());
}
