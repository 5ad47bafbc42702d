//! Core types shared by every stage of the analysis engine.
//!
//! - `Severity` - Finding severity levels
//! - `RuleCode` - Stable rule identifiers (e.g., "privileged-container")
//! - `RuleCategory` - Scoring bucket a rule reports into
//! - `ManifestFamily` - Kubernetes manifests or Docker Compose files
//! - `Position` / `Span` - 1-indexed source locations
//! - `Diagnostic` - Raw output of a check function
//! - `Finding` - A diagnostic stamped with the rule that produced it

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Severity levels for findings.
///
/// Ordered from most severe to least severe:
/// `Error > Warning > Info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Issues that break the manifest or expose the workload
    Error,
    /// Issues that should be addressed
    #[default]
    Warning,
    /// Informational suggestions
    Info,
}

impl Severity {
    /// Parse a severity from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warning" | "warn" => Some(Self::Warning),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Error => 2,
            Self::Warning => 1,
            Self::Info => 0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Category of a rule. Each category is scored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleCategory {
    /// Structural problems: syntax, missing identity, schema violations
    Schema,
    /// Security-related misconfigurations
    Security,
    /// Availability and operability gaps
    Reliability,
    /// Conventions that make manifests easier to operate
    BestPractice,
    /// Broken or suspicious references between resources
    CrossResource,
    /// Formatting and naming
    Style,
    /// Settings that are valid but contradict each other
    Semantic,
}

impl RuleCategory {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Security => "security",
            Self::Reliability => "reliability",
            Self::BestPractice => "best-practice",
            Self::CrossResource => "cross-resource",
            Self::Style => "style",
            Self::Semantic => "semantic",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which kind of manifest set is being analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFamily {
    /// Kubernetes resource manifests (`apiVersion` + `kind` documents)
    #[default]
    Kubernetes,
    /// Docker Compose files (`services` mapping)
    Compose,
}

impl ManifestFamily {
    /// Parse from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "kubernetes" | "k8s" => Some(Self::Kubernetes),
            "compose" | "docker-compose" => Some(Self::Compose),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kubernetes => "kubernetes",
            Self::Compose => "compose",
        }
    }
}

impl fmt::Display for ManifestFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rule identifier (e.g., "privileged-container", "yaml-syntax").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleCode(pub String);

impl RuleCode {
    /// Create a new rule code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RuleCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RuleCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for RuleCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Position in the source text (1-indexed line and column).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// The first character of the input.
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A start position with an optional end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<Position>,
}

impl Span {
    pub fn at(start: Position) -> Self {
        Self { start, end: None }
    }

    pub fn new(start: Position, end: Position) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }
}

impl From<Position> for Span {
    fn from(start: Position) -> Self {
        Self::at(start)
    }
}

/// A diagnostic produced by a check function.
///
/// This is the raw output of a rule before the engine stamps it
/// with the rule's code, severity and category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The message describing the issue.
    pub message: String,
    /// Where the issue is.
    pub span: Span,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, span: impl Into<Span>) -> Self {
        Self {
            message: message.into(),
            span: span.into(),
        }
    }
}

/// A finding (rule violation) reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// The rule that produced this finding.
    pub code: RuleCode,
    /// Severity of the producing rule.
    pub severity: Severity,
    /// Category of the producing rule.
    pub category: RuleCategory,
    /// Human-readable message.
    pub message: String,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub column: u32,
    /// Optional end line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    /// Optional end column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
}

impl Finding {
    /// Create a new finding at a position.
    pub fn new(
        code: impl Into<RuleCode>,
        severity: Severity,
        category: RuleCategory,
        message: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            category,
            message: message.into(),
            line: position.line,
            column: position.column,
            end_line: None,
            end_column: None,
        }
    }

    /// Build a finding from a diagnostic.
    pub fn from_diagnostic(
        code: &RuleCode,
        severity: Severity,
        category: RuleCategory,
        diagnostic: Diagnostic,
    ) -> Self {
        let mut finding = Self::new(
            code.clone(),
            severity,
            category,
            diagnostic.message,
            diagnostic.span.start,
        );
        if let Some(end) = diagnostic.span.end {
            finding = finding.with_end(end);
        }
        finding
    }

    /// Set the end position.
    pub fn with_end(mut self, end: Position) -> Self {
        self.end_line = Some(end.line);
        self.end_column = Some(end.column);
        self
    }

    /// Start position of the finding.
    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

impl Ord for Finding {
    fn cmp(&self, other: &Self) -> Ordering {
        // Document order first; the remaining keys only make the order total.
        self.line
            .cmp(&other.line)
            .then(self.column.cmp(&other.column))
            .then_with(|| self.code.cmp(&other.code))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| other.severity.cmp(&self.severity))
            .then_with(|| self.end_line.cmp(&other.end_line))
            .then_with(|| self.end_column.cmp(&other.end_column))
            .then_with(|| self.category.cmp(&other.category))
    }
}

impl PartialOrd for Finding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("error"), Some(Severity::Error));
        assert_eq!(Severity::parse("WARNING"), Some(Severity::Warning));
        assert_eq!(Severity::parse("Info"), Some(Severity::Info));
        assert_eq!(Severity::parse("invalid"), None);
    }

    #[test]
    fn test_family_parse() {
        assert_eq!(ManifestFamily::parse("k8s"), Some(ManifestFamily::Kubernetes));
        assert_eq!(ManifestFamily::parse("Compose"), Some(ManifestFamily::Compose));
        assert_eq!(ManifestFamily::parse("helm"), None);
    }

    #[test]
    fn test_finding_ordering() {
        let at = |line, column, code: &str| {
            Finding::new(
                code,
                Severity::Warning,
                RuleCategory::Security,
                "msg",
                Position::new(line, column),
            )
        };

        let mut findings = vec![at(10, 1, "a"), at(3, 5, "b"), at(3, 1, "c"), at(3, 1, "a")];
        findings.sort();

        assert_eq!(findings[0].position(), Position::new(3, 1));
        assert_eq!(findings[0].code.as_str(), "a");
        assert_eq!(findings[1].code.as_str(), "c");
        assert_eq!(findings[2].position(), Position::new(3, 5));
        assert_eq!(findings[3].line, 10);
    }

    #[test]
    fn test_finding_from_diagnostic_keeps_span() {
        let diag = Diagnostic::new(
            "bad",
            Span::new(Position::new(2, 3), Position::new(2, 9)),
        );
        let finding = Finding::from_diagnostic(
            &RuleCode::new("x"),
            Severity::Error,
            RuleCategory::Schema,
            diag,
        );
        assert_eq!(finding.line, 2);
        assert_eq!(finding.column, 3);
        assert_eq!(finding.end_line, Some(2));
        assert_eq!(finding.end_column, Some(9));
    }
}
