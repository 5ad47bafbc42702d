//! Map raw validator errors onto specific rule ids.
//!
//! Field-shape patterns (ports, volumes, restart and pull policies) win over
//! the generic keyword buckets so one defect reads the same whichever
//! alternative of an `anyOf` reported it.

/// Ids the schema layer can emit.
pub mod ids {
    pub const INVALID_PORT: &str = "invalid-port";
    pub const INVALID_VOLUME: &str = "invalid-volume";
    pub const INVALID_RESTART_POLICY: &str = "invalid-restart-policy";
    pub const INVALID_IMAGE_PULL_POLICY: &str = "invalid-image-pull-policy";
    pub const MISSING_REQUIRED_FIELD: &str = "missing-required-field";
    pub const INVALID_FIELD_TYPE: &str = "invalid-field-type";
    pub const INVALID_ENUM_VALUE: &str = "invalid-enum-value";
    pub const INVALID_VALUE: &str = "invalid-value";
    pub const SCHEMA_VIOLATION: &str = "schema-violation";

    pub const ALL: &[&str] = &[
        INVALID_PORT,
        INVALID_VOLUME,
        INVALID_RESTART_POLICY,
        INVALID_IMAGE_PULL_POLICY,
        MISSING_REQUIRED_FIELD,
        INVALID_FIELD_TYPE,
        INVALID_ENUM_VALUE,
        INVALID_VALUE,
        SCHEMA_VIOLATION,
    ];
}

const MAX_DETAIL: usize = 160;

/// Pick the rule id for an error.
pub fn categorize(keyword: &str, instance_path: &str) -> &'static str {
    let segments: Vec<&str> = instance_path.split('/').filter(|s| !s.is_empty()).collect();
    let last = segments
        .iter()
        .rev()
        .find(|s| s.parse::<usize>().is_err())
        .copied()
        .unwrap_or("");

    if matches!(last, "restartPolicy" | "restart") {
        return ids::INVALID_RESTART_POLICY;
    }
    if matches!(last, "imagePullPolicy" | "pull_policy") {
        return ids::INVALID_IMAGE_PULL_POLICY;
    }
    if segments.iter().any(|s| is_port_segment(s)) {
        return ids::INVALID_PORT;
    }
    if segments
        .iter()
        .any(|s| matches!(*s, "volumes" | "volumeMounts"))
    {
        return ids::INVALID_VOLUME;
    }

    match keyword {
        "required" => ids::MISSING_REQUIRED_FIELD,
        "type" => ids::INVALID_FIELD_TYPE,
        "enum" | "const" => ids::INVALID_ENUM_VALUE,
        "minimum" | "maximum" | "exclusiveMinimum" | "exclusiveMaximum" | "minLength"
        | "maxLength" | "minItems" | "maxItems" | "pattern" | "format" | "multipleOf"
        | "uniqueItems" => ids::INVALID_VALUE,
        _ => ids::SCHEMA_VIOLATION,
    }
}

fn is_port_segment(segment: &str) -> bool {
    matches!(segment, "ports" | "port") || segment.ends_with("Port")
}

/// The keyword of a schema path: its last non-numeric segment.
pub fn keyword_of(schema_path: &str) -> String {
    schema_path
        .rsplit('/')
        .find(|s| !s.is_empty() && s.parse::<usize>().is_err())
        .unwrap_or("")
        .to_string()
}

/// Dotted field path for messages: `/spec/ports/0/port` -> `spec.ports[0].port`.
pub fn field_path(instance_path: &str) -> String {
    let mut out = String::new();
    for segment in instance_path.split('/').filter(|s| !s.is_empty()) {
        let segment = crate::analyzer::parser::node::unescape_segment(segment);
        if segment.parse::<usize>().is_ok() {
            out.push('[');
            out.push_str(&segment);
            out.push(']');
        } else {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(&segment);
        }
    }
    out
}

/// Build the finding message for an error.
pub fn message(keyword: &str, instance_path: &str, detail: &str) -> String {
    let field = field_path(instance_path);
    if keyword == "required" {
        let missing = quoted(detail).unwrap_or(detail);
        return if field.is_empty() {
            format!("Missing required field '{}'", missing)
        } else {
            format!("Missing required field '{}' in {}", missing, field)
        };
    }

    let detail = truncate(detail);
    if field.is_empty() {
        detail
    } else {
        format!("Invalid {}: {}", field, detail)
    }
}

/// First double-quoted token of a validator message.
fn quoted(detail: &str) -> Option<&str> {
    let start = detail.find('"')? + 1;
    let len = detail[start..].find('"')?;
    Some(&detail[start..start + len])
}

fn truncate(detail: &str) -> String {
    if detail.chars().count() <= MAX_DETAIL {
        return detail.to_string();
    }
    let mut out: String = detail.chars().take(MAX_DETAIL).collect();
    out.push_str("...");
    out
}
