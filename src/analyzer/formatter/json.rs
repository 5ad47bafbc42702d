//! JSON formatter.

use crate::analyzer::engine::AnalysisResult;
use crate::analyzer::formatter::FileReport;
use crate::analyzer::types::Severity;
use serde::Serialize;

/// Format reports as JSON.
pub fn format(reports: &[FileReport]) -> String {
    let output = JsonOutput::from(reports);
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    files: Vec<JsonFile<'a>>,
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    path: &'a str,
    #[serde(flatten)]
    result: &'a AnalysisResult,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSummary {
    files_analyzed: usize,
    total_findings: usize,
    errors: usize,
    warnings: usize,
    infos: usize,
}

impl<'a> From<&'a [FileReport]> for JsonOutput<'a> {
    fn from(reports: &'a [FileReport]) -> Self {
        let count = |severity: Severity| {
            reports
                .iter()
                .flat_map(|r| &r.result.findings)
                .filter(|f| f.severity == severity)
                .count()
        };
        Self {
            files: reports
                .iter()
                .map(|r| JsonFile {
                    path: &r.path,
                    result: &r.result,
                })
                .collect(),
            summary: JsonSummary {
                files_analyzed: reports.len(),
                total_findings: reports.iter().map(|r| r.result.findings.len()).sum(),
                errors: count(Severity::Error),
                warnings: count(Severity::Warning),
                infos: count(Severity::Info),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::formatter::tests::{PRIVILEGED_POD, report};

    #[test]
    fn test_json_format() {
        let out = format(&[report("pod.yaml", PRIVILEGED_POD)]);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        let file = &value["files"][0];
        assert_eq!(file["path"], "pod.yaml");
        assert_eq!(file["family"], "kubernetes");
        assert_eq!(file["parseSuccess"], true);
        assert_eq!(file["resources"][0]["kind"], "Pod");
        assert!(file["score"]["overall"].as_f64().unwrap() < 100.0);

        let codes: Vec<&str> = file["findings"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|f| f["code"].as_str())
            .collect();
        assert!(codes.contains(&"privileged-container"));

        assert_eq!(value["summary"]["filesAnalyzed"], 1);
        assert!(value["summary"]["errors"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn test_json_empty() {
        let out = format(&[]);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["summary"]["totalFindings"], 0);
        assert!(value["files"].as_array().unwrap().is_empty());
    }
}
