//! GitHub Actions output formatter.
//!
//! Produces output in GitHub Actions workflow command format:
//! ::error file={name},line={line},col={col}::{message}

use crate::analyzer::formatter::FileReport;
use crate::analyzer::types::Severity;

/// Format reports for GitHub Actions.
pub fn format(reports: &[FileReport]) -> String {
    let mut output = String::new();

    for report in reports {
        for finding in &report.result.findings {
            let level = match finding.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Info => "notice",
            };

            output.push_str(&format!(
                "::{} file={},line={},col={},title={}::{}\n",
                level,
                escape_property(&report.path),
                finding.line,
                finding.column,
                escape_property(finding.code.as_str()),
                escape_github(&finding.message)
            ));
        }
    }

    output
}

/// Escape special characters for GitHub Actions.
fn escape_github(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Property values also reserve `:` and `,`.
fn escape_property(s: &str) -> String {
    escape_github(s).replace(':', "%3A").replace(',', "%2C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::formatter::tests::{PRIVILEGED_POD, report};

    #[test]
    fn test_github_format() {
        let out = format(&[report("pod.yaml", PRIVILEGED_POD)]);
        let line = out
            .lines()
            .find(|l| l.contains("title=privileged-container"))
            .unwrap();
        assert!(line.starts_with("::error file=pod.yaml,line=12,col="));
        assert!(line.ends_with("::container \"app\" in Pod \"web\" runs privileged"));
    }

    #[test]
    fn test_github_levels() {
        let out = format(&[report("pod.yaml", PRIVILEGED_POD)]);
        assert!(out.contains("::warning file=pod.yaml"));
        assert!(out.lines().all(|l| l.starts_with("::")));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_github("50%\nnext"), "50%25%0Anext");
        assert_eq!(escape_property("C:\\a,b"), "C%3A\\a%2Cb");
    }

    #[test]
    fn test_clean_input_is_empty() {
        assert!(format(&[report("empty.yaml", "")]).is_empty());
    }
}
