//! # Analyzer Module
//!
//! Static analysis of Kubernetes manifests and Docker Compose files:
//! - Position-tracked YAML parsing of multi-document input
//! - Resource extraction and an identity registry
//! - Schema validation per resource kind
//! - Security, reliability and best-practice rules
//! - A cross-resource reference graph with cycle and dangling detection
//! - Weighted scoring with letter grades
//!
//! # Example
//!
//! ```rust,ignore
//! use manifest_lint::analyzer::{AnalyzerConfig, analyze};
//!
//! let yaml = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: web\n";
//! let result = analyze(yaml, &AnalyzerConfig::default());
//! println!("{} ({})", result.score.overall, result.score.grade);
//! ```

pub mod config;
pub mod engine;
pub mod extract;
pub mod formatter;
pub mod graph;
pub mod parser;
pub mod pragma;
pub mod registry;
pub mod rules;
pub mod schema;
pub mod scoring;
pub mod types;

pub use config::{AnalyzerConfig, ConfigError, EnginePolicy, ImplicitObject};
pub use engine::{AnalysisResult, ResourceSummary, analyze, analyze_with};
pub use formatter::{FileReport, OutputFormat, format_reports};
pub use graph::{Edge, EdgeKind, ResourceGraph, build_graph};
pub use registry::{EmptySelector, ResourceRegistry};
pub use rules::{Rule, RuleCatalog, RuleDefinition, builtin_catalog};
pub use schema::{SchemaValidator, ValidatorSet, builtin_validators};
pub use scoring::{Grade, Score};
pub use types::{Finding, ManifestFamily, Position, RuleCategory, RuleCode, Severity};
