//! # manifest-lint
//!
//! An analysis engine for Kubernetes manifests and Docker Compose files.
//!
//! ## Features
//!
//! - **Position tracking**: every finding points at a 1-based line and column
//! - **Schema checks**: structural validation per resource kind
//! - **Rules**: security, reliability and best-practice checks
//! - **Cross-resource graph**: selectors, mounts, bindings and `depends_on`,
//!   with dangling-reference and cycle detection
//! - **Scoring**: weighted category scores and a letter grade
//!
//! ## Example
//!
//! ```rust,no_run
//! use manifest_lint::{AnalyzerConfig, analyze};
//!
//! let text = std::fs::read_to_string("deploy.yaml").unwrap();
//! let result = analyze(&text, &AnalyzerConfig::default());
//! for finding in &result.findings {
//!     println!("{}:{} {} {}", finding.line, finding.column, finding.code, finding.message);
//! }
//! println!("score {:.1} ({})", result.score.overall, result.score.grade);
//! ```

pub mod analyzer;
pub mod cli;
pub mod handlers;

// Re-export commonly used types and functions
pub use analyzer::{
    AnalysisResult, AnalyzerConfig, Finding, Grade, ManifestFamily, Score, Severity, analyze,
    analyze_with,
};
use cli::{Cli, Commands};
pub use handlers::CommandOutput;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a parsed command line.
pub fn run_command(cli: Cli) -> anyhow::Result<CommandOutput> {
    match cli.command {
        Commands::Lint {
            path,
            format,
            family,
            threshold,
            include,
            exclude,
            no_fail,
        } => handlers::handle_lint(
            handlers::LintOptions {
                path,
                format: format.into(),
                family: family.family(),
                threshold: threshold.map(Into::into),
                include,
                exclude,
                no_fail,
            },
            cli.config.as_deref(),
        ),
        Commands::Rules { json, family } => {
            handlers::handle_rules(json, family.and_then(|f| f.family()))
        }
    }
}
