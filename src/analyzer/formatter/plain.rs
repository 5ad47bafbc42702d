//! Plain text formatter.

use crate::analyzer::formatter::FileReport;
use crate::analyzer::types::Severity;
use colored::*;

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow(),
        Severity::Info => "info".blue(),
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

/// Format reports as plain text.
pub fn format(reports: &[FileReport]) -> String {
    let mut output = String::new();
    let mut errors = 0;
    let mut warnings = 0;
    let mut infos = 0;

    for report in reports {
        let result = &report.result;
        output.push_str(&format!("{}\n", report.path.bold()));

        for finding in &result.findings {
            output.push_str(&format!(
                "  {}:{}  {}  {}  {}\n",
                finding.line,
                finding.column,
                severity_label(finding.severity),
                finding.message,
                finding.code.as_str().dimmed(),
            ));
            match finding.severity {
                Severity::Error => errors += 1,
                Severity::Warning => warnings += 1,
                Severity::Info => infos += 1,
            }
        }

        if result.parse_success {
            output.push_str(&format!(
                "  {} {} resource(s), score {:.1}/100 ({})\n",
                result.family,
                result.resources.len(),
                result.score.overall,
                result.score.grade,
            ));
        } else {
            output.push_str(&format!("  {}\n", "could not be parsed".red()));
        }
        output.push('\n');
    }

    if errors + warnings + infos == 0 {
        output.push_str("No issues found.\n");
    } else {
        output.push_str(&format!(
            "Found {}, {}, {} in {}.\n",
            plural(errors, "error"),
            plural(warnings, "warning"),
            plural(infos, "info"),
            plural(reports.len(), "file"),
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::formatter::tests::{PRIVILEGED_POD, report};

    #[test]
    fn test_plain_format() {
        colored::control::set_override(false);
        let out = format(&[report("pod.yaml", PRIVILEGED_POD)]);
        assert!(out.starts_with("pod.yaml\n"));
        assert!(out.contains("  error  container \"app\" in Pod \"web\" runs privileged"));
        assert!(out.contains("privileged-container"));
        assert!(out.contains("kubernetes 1 resource(s), score"));
        assert!(out.contains("in 1 file."));
    }

    #[test]
    fn test_clean_input() {
        colored::control::set_override(false);
        let out = format(&[report("empty.yaml", "")]);
        assert!(out.contains("score 100.0/100 (A+)"));
        assert!(out.ends_with("No issues found.\n"));
    }

    #[test]
    fn test_parse_failure() {
        colored::control::set_override(false);
        let out = format(&[report("broken.yaml", "a: [1, 2\n")]);
        assert!(out.contains("yaml-syntax"));
        assert!(out.contains("could not be parsed"));
    }
}
