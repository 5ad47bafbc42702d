//! Structural schemas for Docker Compose resources.

use serde_json::{Value, json};

const PORT_PATTERN: &str =
    r"^(\$\{[^}]+\}|((\d{1,3}\.){3}\d{1,3}:)?((\d+(-\d+)?)?:)?\d+(-\d+)?(/(tcp|udp|sctp))?)$";

const RESTART_PATTERN: &str = r"^(no|always|unless-stopped|on-failure(:\d+)?)$";

fn string_or_list() -> Value {
    json!({
        "anyOf": [
            { "type": "string" },
            { "type": "array", "items": { "type": "string" } }
        ]
    })
}

fn dict_or_list() -> Value {
    json!({
        "anyOf": [
            {
                "type": "object",
                "additionalProperties": { "type": ["string", "number", "boolean", "null"] }
            },
            { "type": "array", "items": { "type": "string" } }
        ]
    })
}

fn port() -> Value {
    json!({
        "anyOf": [
            { "type": "integer", "minimum": 1, "maximum": 65535 },
            { "type": "string", "pattern": PORT_PATTERN },
            {
                "type": "object",
                "required": ["target"],
                "properties": {
                    "target": { "type": "integer", "minimum": 1, "maximum": 65535 },
                    "published": { "type": ["string", "integer"] },
                    "protocol": { "enum": ["tcp", "udp", "sctp"] },
                    "mode": { "enum": ["host", "ingress"] }
                }
            }
        ]
    })
}

fn volume_mount() -> Value {
    json!({
        "anyOf": [
            { "type": "string", "minLength": 1 },
            {
                "type": "object",
                "required": ["type", "target"],
                "properties": {
                    "type": { "enum": ["bind", "volume", "tmpfs", "npipe", "cluster", "image"] },
                    "source": { "type": "string" },
                    "target": { "type": "string" },
                    "read_only": { "type": "boolean" }
                }
            }
        ]
    })
}

fn service() -> Value {
    json!({
        "type": "object",
        "anyOf": [
            { "required": ["image"] },
            { "required": ["build"] },
            { "required": ["extends"] }
        ],
        "properties": {
            "image": { "type": "string", "minLength": 1 },
            "build": {
                "anyOf": [{ "type": "string" }, { "type": "object" }]
            },
            "container_name": { "type": "string" },
            "restart": { "type": "string", "pattern": RESTART_PATTERN },
            "pull_policy": { "enum": ["always", "never", "missing", "build", "if_not_present", "daily", "weekly"] },
            "privileged": { "type": "boolean" },
            "read_only": { "type": "boolean" },
            "network_mode": { "type": "string" },
            "command": string_or_list(),
            "entrypoint": string_or_list(),
            "environment": dict_or_list(),
            "labels": dict_or_list(),
            "env_file": string_or_list(),
            "ports": { "type": "array", "items": port() },
            "expose": { "type": "array", "items": { "type": ["string", "integer"] } },
            "volumes": { "type": "array", "items": volume_mount() },
            "depends_on": {
                "anyOf": [
                    { "type": "array", "items": { "type": "string" } },
                    {
                        "type": "object",
                        "additionalProperties": {
                            "type": "object",
                            "properties": {
                                "condition": {
                                    "enum": [
                                        "service_started",
                                        "service_healthy",
                                        "service_completed_successfully"
                                    ]
                                },
                                "restart": { "type": "boolean" },
                                "required": { "type": "boolean" }
                            }
                        }
                    }
                ]
            },
            "networks": {
                "anyOf": [
                    { "type": "array", "items": { "type": "string" } },
                    { "type": "object" }
                ]
            },
            "secrets": { "type": "array" },
            "configs": { "type": "array" },
            "cap_add": { "type": "array", "items": { "type": "string" } },
            "cap_drop": { "type": "array", "items": { "type": "string" } },
            "healthcheck": {
                "type": "object",
                "properties": {
                    "test": string_or_list(),
                    "interval": { "type": "string" },
                    "timeout": { "type": "string" },
                    "retries": { "type": "integer", "minimum": 0 },
                    "disable": { "type": "boolean" }
                }
            },
            "deploy": {
                "type": "object",
                "properties": {
                    "replicas": { "type": "integer", "minimum": 0 },
                    "resources": { "type": "object" }
                }
            }
        }
    })
}

fn top_level_object() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "external": { "type": "boolean" },
            "driver": { "type": "string" },
            "labels": dict_or_list()
        }
    })
}

/// `(kind, schema)` pairs for every built-in Compose validator.
pub fn schemas() -> Vec<(&'static str, Value)> {
    let mut file_backed = top_level_object();
    file_backed["properties"]["file"] = json!({ "type": "string" });
    file_backed["properties"]["environment"] = json!({ "type": "string" });

    vec![
        ("service", service()),
        ("network", top_level_object()),
        ("volume", top_level_object()),
        ("secret", file_backed.clone()),
        ("config", file_backed),
    ]
}
