//! Schema validation integration.
//!
//! Resources are validated against structural JSON Schemas and the
//! validator's errors are normalized into the same `Finding` shape rules
//! produce: positioned through the node tree, categorized into specific
//! ids and deduplicated.

pub mod categorize;
pub mod compose;
pub mod kubernetes;

use crate::analyzer::extract::Resource;
use crate::analyzer::parser::LineIndex;
use crate::analyzer::types::{Finding, ManifestFamily, Position, RuleCategory, Severity};
use jsonschema::Draft;
use rayon::prelude::*;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;
use thiserror::Error;

/// One raw validator error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Schema keyword that failed (`required`, `type`, `enum`, ...).
    pub keyword: String,
    /// Pointer to the offending value within the resource.
    pub instance_path: String,
    pub message: String,
}

/// Validates one resource tree.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, instance: &Value) -> Result<(), Vec<SchemaError>>;
}

/// Looks up the validator for a resource type.
pub trait ValidatorSet: Send + Sync {
    fn validator_for(&self, family: ManifestFamily, kind: &str) -> Option<&dyn SchemaValidator>;
}

/// Errors building a validator from a schema document.
#[derive(Debug, Error)]
pub enum SchemaBuildError {
    #[error("invalid schema for {kind}: {message}")]
    InvalidSchema { kind: String, message: String },
}

/// A compiled JSON Schema.
pub struct JsonSchemaValidator {
    validator: jsonschema::Validator,
}

impl JsonSchemaValidator {
    pub fn new(kind: &str, schema: &Value) -> Result<Self, SchemaBuildError> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(schema)
            .map_err(|e| SchemaBuildError::InvalidSchema {
                kind: kind.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { validator })
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, instance: &Value) -> Result<(), Vec<SchemaError>> {
        let errors: Vec<SchemaError> = self
            .validator
            .iter_errors(instance)
            .map(|err| SchemaError {
                keyword: categorize::keyword_of(&err.schema_path.to_string()),
                instance_path: err.instance_path.to_string(),
                message: err.to_string(),
            })
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// The built-in validators, keyed by family and kind.
#[derive(Default)]
pub struct BuiltinValidators {
    validators: HashMap<(ManifestFamily, String), JsonSchemaValidator>,
}

impl BuiltinValidators {
    /// Compile every built-in schema. Schemas that fail to compile are
    /// logged and left out.
    pub fn compile() -> Self {
        let mut validators = HashMap::new();
        let families = [
            (ManifestFamily::Kubernetes, kubernetes::schemas()),
            (ManifestFamily::Compose, compose::schemas()),
        ];
        for (family, schemas) in families {
            for (kind, schema) in schemas {
                match JsonSchemaValidator::new(kind, &schema) {
                    Ok(v) => {
                        validators.insert((family, kind.to_string()), v);
                    }
                    Err(err) => log::error!("{}", err),
                }
            }
        }
        log::debug!("compiled {} schema validator(s)", validators.len());
        Self { validators }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl ValidatorSet for BuiltinValidators {
    fn validator_for(&self, family: ManifestFamily, kind: &str) -> Option<&dyn SchemaValidator> {
        self.validators
            .get(&(family, kind.to_string()))
            .map(|v| v as &dyn SchemaValidator)
    }
}

static BUILTIN: OnceLock<BuiltinValidators> = OnceLock::new();

/// The process-wide built-in validator set, compiled on first use.
pub fn builtin_validators() -> &'static BuiltinValidators {
    BUILTIN.get_or_init(BuiltinValidators::compile)
}

/// Output of [`validate_resources`].
#[derive(Debug, Default)]
pub struct SchemaOutcome {
    pub findings: Vec<Finding>,
    /// Indexes of resources with at least one schema error.
    pub failed: HashSet<usize>,
}

/// Validate every resource that has a validator.
pub fn validate_resources(
    resources: &[Resource],
    validators: &dyn ValidatorSet,
    index: &LineIndex,
) -> SchemaOutcome {
    let per_resource: Vec<(usize, Vec<Finding>)> = resources
        .par_iter()
        .enumerate()
        .map(|(i, resource)| (i, validate_resource(resource, validators, index)))
        .collect();

    let mut outcome = SchemaOutcome::default();
    let mut seen = BTreeSet::new();
    for (i, findings) in per_resource {
        if !findings.is_empty() {
            outcome.failed.insert(i);
        }
        for finding in findings {
            let key = (finding.code.clone(), finding.line, finding.message.clone());
            if seen.insert(key) {
                outcome.findings.push(finding);
            }
        }
    }
    outcome.findings.sort();
    outcome
}

/// Validate one resource and translate its errors.
pub fn validate_resource(
    resource: &Resource,
    validators: &dyn ValidatorSet,
    index: &LineIndex,
) -> Vec<Finding> {
    let Some(validator) = validators.validator_for(resource.family, &resource.kind) else {
        log::debug!("no schema for {} {}, skipping", resource.family, resource.kind);
        return Vec::new();
    };

    match validator.validate(&resource.root.to_json()) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .into_iter()
            .map(|err| to_finding(resource, &err, index))
            .collect(),
    }
}

fn to_finding(resource: &Resource, err: &SchemaError, index: &LineIndex) -> Finding {
    let code = categorize::categorize(&err.keyword, &err.instance_path);
    let message = categorize::message(&err.keyword, &err.instance_path, &err.message);
    Finding::new(
        code,
        Severity::Error,
        RuleCategory::Schema,
        message,
        error_position(resource, err, index),
    )
}

/// Where to report an error.
///
/// `required` errors point at the object missing the field, so they are
/// reported at that object's key. Everything else is reported at the value.
fn error_position(resource: &Resource, err: &SchemaError, index: &LineIndex) -> Position {
    if err.instance_path.is_empty() {
        return resource.position;
    }
    if err.keyword == "required" {
        return resource.key_position_of(&err.instance_path, index);
    }
    resource.position_of(&err.instance_path, index)
}
