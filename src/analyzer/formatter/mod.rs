//! Output formatters for analysis results.
//!
//! - Plain - human-readable text with colored severities (default)
//! - JSON - machine-readable result, graph and score included
//! - SARIF - for code scanning integrations
//! - GitHub - GitHub Actions workflow annotations

pub mod github;
pub mod json;
pub mod plain;
pub mod sarif;

use crate::analyzer::engine::AnalysisResult;

/// Output format for analysis results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Plain,
    /// JSON format for machine processing
    Json,
    /// SARIF 2.1.0
    Sarif,
    /// GitHub Actions annotations
    GitHub,
}

impl OutputFormat {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "plain" | "text" => Some(Self::Plain),
            "json" => Some(Self::Json),
            "sarif" => Some(Self::Sarif),
            "github" | "github-actions" => Some(Self::GitHub),
            _ => None,
        }
    }
}

/// The result of analyzing one input, with the path it was read from.
#[derive(Debug, Clone)]
pub struct FileReport {
    /// Display path; `<stdin>` for standard input.
    pub path: String,
    pub result: AnalysisResult,
}

impl FileReport {
    pub fn new(path: impl Into<String>, result: AnalysisResult) -> Self {
        Self {
            path: path.into(),
            result,
        }
    }
}

/// Format reports according to the specified format.
pub fn format_reports(reports: &[FileReport], format: OutputFormat) -> String {
    match format {
        OutputFormat::Plain => plain::format(reports),
        OutputFormat::Json => json::format(reports),
        OutputFormat::Sarif => sarif::format(reports),
        OutputFormat::GitHub => github::format(reports),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analyzer::config::AnalyzerConfig;
    use crate::analyzer::engine::analyze;

    pub(crate) fn report(path: &str, yaml: &str) -> FileReport {
        FileReport::new(path, analyze(yaml, &AnalyzerConfig::default()))
    }

    pub(crate) const PRIVILEGED_POD: &str = "\
apiVersion: v1
kind: Pod
metadata:
  name: web
  labels:
    app: web
spec:
  containers:
    - name: app
      image: nginx:1.27
      securityContext:
        privileged: true
";

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("plain"), Some(OutputFormat::Plain));
        assert_eq!(OutputFormat::parse("TEXT"), Some(OutputFormat::Plain));
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("sarif"), Some(OutputFormat::Sarif));
        assert_eq!(
            OutputFormat::parse("github-actions"),
            Some(OutputFormat::GitHub)
        );
        assert_eq!(OutputFormat::parse("xml"), None);
    }

    #[test]
    fn test_every_format_mentions_finding() {
        let reports = vec![report("pod.yaml", PRIVILEGED_POD)];
        for format in [
            OutputFormat::Plain,
            OutputFormat::Json,
            OutputFormat::Sarif,
            OutputFormat::GitHub,
        ] {
            let out = format_reports(&reports, format);
            assert!(out.contains("privileged-container"), "{:?}", format);
        }
    }
}
