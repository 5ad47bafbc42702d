// Handler modules
pub mod lint;
pub mod rules;

// Re-export all handler functions
pub use lint::{LintOptions, handle_lint, load_config};
pub use rules::handle_rules;

/// Rendered output of a command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub text: String,
    /// True when the findings reached the failure threshold.
    pub failed: bool,
}
