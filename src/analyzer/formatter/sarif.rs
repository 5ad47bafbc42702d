//! SARIF (Static Analysis Results Interchange Format) formatter.
//!
//! SARIF is a standard format for static analysis tool output,
//! supported by GitHub, VS Code, and other tools.

use crate::analyzer::formatter::FileReport;
use crate::analyzer::rules::builtin_catalog;
use crate::analyzer::types::{Finding, Severity};
use serde::Serialize;
use std::collections::HashSet;

const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";

/// Format reports as SARIF.
pub fn format(reports: &[FileReport]) -> String {
    let output = SarifOutput::from(reports);
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

#[derive(Serialize)]
struct SarifOutput {
    #[serde(rename = "$schema")]
    schema: String,
    version: String,
    runs: Vec<SarifRun>,
}

#[derive(Serialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifDriver {
    name: String,
    version: String,
    rules: Vec<SarifRule>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifRule {
    id: String,
    name: String,
    short_description: SarifMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_description: Option<SarifMessage>,
    default_configuration: SarifConfiguration,
}

#[derive(Serialize)]
struct SarifConfiguration {
    level: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifResult {
    rule_id: String,
    level: String,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifLocation {
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifPhysicalLocation {
    artifact_location: SarifArtifactLocation,
    region: SarifRegion,
}

#[derive(Serialize)]
struct SarifArtifactLocation {
    uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifRegion {
    start_line: u32,
    start_column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_column: Option<u32>,
}

fn rule_for(finding: &Finding) -> SarifRule {
    let id = finding.code.to_string();
    match builtin_catalog().get(&id) {
        Some(rule) => SarifRule {
            name: rule.title().to_string(),
            short_description: SarifMessage {
                text: rule.title().to_string(),
            },
            full_description: Some(SarifMessage {
                text: rule.meta().explanation.to_string(),
            }),
            default_configuration: SarifConfiguration {
                level: severity_to_sarif_level(rule.severity()),
            },
            id,
        },
        // Reserved structural and schema ids have no catalog entry
        None => SarifRule {
            name: id.clone(),
            short_description: SarifMessage {
                text: finding.category.to_string(),
            },
            full_description: None,
            default_configuration: SarifConfiguration {
                level: severity_to_sarif_level(finding.severity),
            },
            id,
        },
    }
}

impl From<&[FileReport]> for SarifOutput {
    fn from(reports: &[FileReport]) -> Self {
        let mut rules = Vec::new();
        let mut seen_rules = HashSet::new();
        let mut results = Vec::new();

        for report in reports {
            for f in &report.result.findings {
                if seen_rules.insert(f.code.clone()) {
                    rules.push(rule_for(f));
                }
                results.push(SarifResult {
                    rule_id: f.code.to_string(),
                    level: severity_to_sarif_level(f.severity),
                    message: SarifMessage {
                        text: f.message.clone(),
                    },
                    locations: vec![SarifLocation {
                        physical_location: SarifPhysicalLocation {
                            artifact_location: SarifArtifactLocation {
                                uri: report.path.clone(),
                            },
                            region: SarifRegion {
                                start_line: f.line,
                                start_column: f.column,
                                end_line: f.end_line,
                                end_column: f.end_column,
                            },
                        },
                    }],
                });
            }
        }

        Self {
            schema: SARIF_SCHEMA.to_string(),
            version: "2.1.0".to_string(),
            runs: vec![SarifRun {
                tool: SarifTool {
                    driver: SarifDriver {
                        name: env!("CARGO_PKG_NAME").to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                        rules,
                    },
                },
                results,
            }],
        }
    }
}

fn severity_to_sarif_level(severity: Severity) -> String {
    match severity {
        Severity::Error => "error".to_string(),
        Severity::Warning => "warning".to_string(),
        Severity::Info => "note".to_string(),
    }
}
