use crate::analyzer::{ManifestFamily, RuleDefinition, builtin_catalog};
use crate::handlers::CommandOutput;
use anyhow::{Context, Result};

fn definitions(family: Option<ManifestFamily>) -> Vec<RuleDefinition> {
    builtin_catalog()
        .definitions()
        .into_iter()
        .filter(|d| family.is_none_or(|f| d.family == f))
        .collect()
}

/// List the built-in rules as a table or as JSON.
pub fn handle_rules(json: bool, family: Option<ManifestFamily>) -> Result<CommandOutput> {
    let rules = definitions(family);

    let text = if json {
        serde_json::to_string_pretty(&rules).context("failed to serialize rule definitions")?
    } else {
        let width = rules.iter().map(|r| r.code.as_str().len()).max().unwrap_or(0);
        let mut out = String::new();
        for rule in &rules {
            out.push_str(&format!(
                "{:<width$}  {:<7}  {:<10}  {:<14}  {}\n",
                rule.code.as_str(),
                rule.severity.as_str(),
                rule.family.as_str(),
                rule.category.as_str(),
                rule.title,
                width = width,
            ));
        }
        out.push_str(&format!("\n{} rule(s)\n", rules.len()));
        out
    };

    Ok(CommandOutput {
        text,
        failed: false,
    })
}
