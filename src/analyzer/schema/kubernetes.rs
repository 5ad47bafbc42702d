//! Structural schemas for common Kubernetes kinds.
//!
//! These cover the fields rules and users get wrong most often. Unknown
//! properties are allowed everywhere; the cluster's own admission checks
//! remain the authority.

use serde_json::{Value, json};

fn string_map() -> Value {
    json!({ "type": "object", "additionalProperties": { "type": "string" } })
}

fn metadata() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": { "type": "string", "minLength": 1, "maxLength": 253 },
            "namespace": { "type": "string" },
            "labels": string_map(),
            "annotations": string_map()
        }
    })
}

/// `metadata` of an embedded template, where `name` is optional.
fn template_metadata() -> Value {
    json!({
        "type": "object",
        "properties": {
            "labels": string_map(),
            "annotations": string_map()
        }
    })
}

fn port_number() -> Value {
    json!({ "type": "integer", "minimum": 1, "maximum": 65535 })
}

fn int_or_string() -> Value {
    json!({ "type": ["integer", "string"] })
}

fn label_selector() -> Value {
    json!({
        "type": "object",
        "properties": {
            "matchLabels": string_map(),
            "matchExpressions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["key", "operator"],
                    "properties": {
                        "key": { "type": "string" },
                        "operator": { "enum": ["In", "NotIn", "Exists", "DoesNotExist"] },
                        "values": { "type": "array", "items": { "type": "string" } }
                    }
                }
            }
        }
    })
}

fn probe() -> Value {
    json!({
        "type": "object",
        "properties": {
            "initialDelaySeconds": { "type": "integer", "minimum": 0 },
            "periodSeconds": { "type": "integer", "minimum": 1 },
            "timeoutSeconds": { "type": "integer", "minimum": 1 },
            "failureThreshold": { "type": "integer", "minimum": 1 },
            "successThreshold": { "type": "integer", "minimum": 1 },
            "httpGet": {
                "type": "object",
                "required": ["port"],
                "properties": { "path": { "type": "string" }, "port": int_or_string() }
            },
            "tcpSocket": {
                "type": "object",
                "required": ["port"],
                "properties": { "port": int_or_string() }
            },
            "exec": {
                "type": "object",
                "properties": { "command": { "type": "array", "items": { "type": "string" } } }
            }
        }
    })
}

fn quantities() -> Value {
    json!({ "type": "object", "additionalProperties": { "type": ["string", "number"] } })
}

fn container() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "image": { "type": "string" },
            "imagePullPolicy": { "enum": ["Always", "IfNotPresent", "Never"] },
            "command": { "type": "array", "items": { "type": "string" } },
            "args": { "type": "array", "items": { "type": "string" } },
            "ports": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["containerPort"],
                    "properties": {
                        "name": { "type": "string", "maxLength": 15 },
                        "containerPort": port_number(),
                        "hostPort": port_number(),
                        "protocol": { "enum": ["TCP", "UDP", "SCTP"] }
                    }
                }
            },
            "env": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": { "type": "string", "minLength": 1 },
                        "value": { "type": "string" },
                        "valueFrom": { "type": "object" }
                    }
                }
            },
            "envFrom": { "type": "array", "items": { "type": "object" } },
            "resources": {
                "type": "object",
                "properties": { "limits": quantities(), "requests": quantities() }
            },
            "volumeMounts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "mountPath"],
                    "properties": {
                        "name": { "type": "string" },
                        "mountPath": { "type": "string" },
                        "readOnly": { "type": "boolean" }
                    }
                }
            },
            "livenessProbe": probe(),
            "readinessProbe": probe(),
            "startupProbe": probe(),
            "securityContext": {
                "type": "object",
                "properties": {
                    "privileged": { "type": "boolean" },
                    "allowPrivilegeEscalation": { "type": "boolean" },
                    "runAsNonRoot": { "type": "boolean" },
                    "runAsUser": { "type": "integer", "minimum": 0 },
                    "readOnlyRootFilesystem": { "type": "boolean" },
                    "capabilities": {
                        "type": "object",
                        "properties": {
                            "add": { "type": "array", "items": { "type": "string" } },
                            "drop": { "type": "array", "items": { "type": "string" } }
                        }
                    }
                }
            }
        }
    })
}

fn pod_spec() -> Value {
    json!({
        "type": "object",
        "required": ["containers"],
        "properties": {
            "containers": { "type": "array", "minItems": 1, "items": container() },
            "initContainers": { "type": "array", "items": container() },
            "restartPolicy": { "enum": ["Always", "OnFailure", "Never"] },
            "serviceAccountName": { "type": "string" },
            "hostNetwork": { "type": "boolean" },
            "hostPID": { "type": "boolean" },
            "hostIPC": { "type": "boolean" },
            "nodeSelector": string_map(),
            "volumes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": { "type": "string", "minLength": 1 },
                        "configMap": { "type": "object", "required": ["name"] },
                        "secret": { "type": "object", "required": ["secretName"] },
                        "persistentVolumeClaim": { "type": "object", "required": ["claimName"] },
                        "hostPath": { "type": "object", "required": ["path"] }
                    }
                }
            },
            "securityContext": {
                "type": "object",
                "properties": {
                    "runAsNonRoot": { "type": "boolean" },
                    "runAsUser": { "type": "integer", "minimum": 0 },
                    "fsGroup": { "type": "integer", "minimum": 0 }
                }
            }
        }
    })
}

fn pod_template() -> Value {
    json!({
        "type": "object",
        "required": ["spec"],
        "properties": { "metadata": template_metadata(), "spec": pod_spec() }
    })
}

/// Top-level envelope shared by every kind.
fn resource(spec: Option<Value>, required_spec: bool) -> Value {
    let mut schema = json!({
        "type": "object",
        "required": ["apiVersion", "kind", "metadata"],
        "properties": {
            "apiVersion": { "type": "string" },
            "kind": { "type": "string" },
            "metadata": metadata()
        }
    });
    if let Some(spec) = spec {
        schema["properties"]["spec"] = spec;
        if required_spec {
            if let Some(required) = schema["required"].as_array_mut() {
                required.push(json!("spec"));
            }
        }
    }
    schema
}

fn replicated(extra_required: &[&str]) -> Value {
    let mut required = vec!["selector", "template"];
    required.extend_from_slice(extra_required);
    json!({
        "type": "object",
        "required": required,
        "properties": {
            "replicas": { "type": "integer", "minimum": 0 },
            "selector": label_selector(),
            "template": pod_template(),
            "minReadySeconds": { "type": "integer", "minimum": 0 },
            "revisionHistoryLimit": { "type": "integer", "minimum": 0 },
            "strategy": {
                "type": "object",
                "properties": { "type": { "enum": ["RollingUpdate", "Recreate"] } }
            }
        }
    })
}

fn job_spec() -> Value {
    json!({
        "type": "object",
        "required": ["template"],
        "properties": {
            "template": pod_template(),
            "backoffLimit": { "type": "integer", "minimum": 0 },
            "completions": { "type": "integer", "minimum": 0 },
            "parallelism": { "type": "integer", "minimum": 0 },
            "activeDeadlineSeconds": { "type": "integer", "minimum": 1 }
        }
    })
}

fn service_spec() -> Value {
    json!({
        "type": "object",
        "properties": {
            "type": { "enum": ["ClusterIP", "NodePort", "LoadBalancer", "ExternalName"] },
            "selector": string_map(),
            "ports": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["port"],
                    "properties": {
                        "name": { "type": "string" },
                        "port": port_number(),
                        "targetPort": {
                            "anyOf": [port_number(), { "type": "string", "minLength": 1 }]
                        },
                        "nodePort": port_number(),
                        "protocol": { "enum": ["TCP", "UDP", "SCTP"] }
                    }
                }
            }
        }
    })
}

fn ingress_spec() -> Value {
    let backend = json!({
        "type": "object",
        "properties": {
            "service": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": { "type": "string" },
                    "port": {
                        "type": "object",
                        "properties": { "number": port_number(), "name": { "type": "string" } }
                    }
                }
            }
        }
    });
    json!({
        "type": "object",
        "properties": {
            "ingressClassName": { "type": "string" },
            "defaultBackend": backend.clone(),
            "rules": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "host": { "type": "string" },
                        "http": {
                            "type": "object",
                            "required": ["paths"],
                            "properties": {
                                "paths": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "required": ["backend"],
                                        "properties": {
                                            "path": { "type": "string" },
                                            "pathType": {
                                                "enum": ["Exact", "Prefix", "ImplementationSpecific"]
                                            },
                                            "backend": backend
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

fn policy_rules() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "required": ["verbs"],
            "properties": {
                "apiGroups": { "type": "array", "items": { "type": "string" } },
                "resources": { "type": "array", "items": { "type": "string" } },
                "verbs": { "type": "array", "items": { "type": "string" } }
            }
        }
    })
}

fn binding(role_kinds: &[&str]) -> Value {
    let mut schema = resource(None, false);
    schema["required"] = json!(["apiVersion", "kind", "metadata", "roleRef"]);
    schema["properties"]["roleRef"] = json!({
        "type": "object",
        "required": ["kind", "name"],
        "properties": {
            "kind": { "enum": role_kinds },
            "name": { "type": "string" },
            "apiGroup": { "type": "string" }
        }
    });
    schema["properties"]["subjects"] = json!({
        "type": "array",
        "items": {
            "type": "object",
            "required": ["kind", "name"],
            "properties": {
                "kind": { "enum": ["ServiceAccount", "User", "Group"] },
                "name": { "type": "string" },
                "namespace": { "type": "string" }
            }
        }
    });
    schema
}

fn with_property(mut schema: Value, key: &str, value: Value) -> Value {
    schema["properties"][key] = value;
    schema
}

/// `(kind, schema)` pairs for every built-in Kubernetes validator.
pub fn schemas() -> Vec<(&'static str, Value)> {
    vec![
        ("Pod", resource(Some(pod_spec()), true)),
        ("Deployment", resource(Some(replicated(&[])), true)),
        ("ReplicaSet", resource(Some(replicated(&[])), true)),
        ("StatefulSet", resource(Some(replicated(&["serviceName"])), true)),
        (
            "DaemonSet",
            resource(
                Some(json!({
                    "type": "object",
                    "required": ["selector", "template"],
                    "properties": {
                        "selector": label_selector(),
                        "template": pod_template()
                    }
                })),
                true,
            ),
        ),
        ("Job", resource(Some(job_spec()), true)),
        (
            "CronJob",
            resource(
                Some(json!({
                    "type": "object",
                    "required": ["schedule", "jobTemplate"],
                    "properties": {
                        "schedule": { "type": "string", "minLength": 1 },
                        "suspend": { "type": "boolean" },
                        "concurrencyPolicy": { "enum": ["Allow", "Forbid", "Replace"] },
                        "jobTemplate": {
                            "type": "object",
                            "required": ["spec"],
                            "properties": { "spec": job_spec() }
                        }
                    }
                })),
                true,
            ),
        ),
        ("Service", resource(Some(service_spec()), false)),
        ("Ingress", resource(Some(ingress_spec()), false)),
        (
            "ConfigMap",
            with_property(
                with_property(resource(None, false), "data", string_map()),
                "binaryData",
                string_map(),
            ),
        ),
        (
            "Secret",
            with_property(
                with_property(
                    with_property(resource(None, false), "data", string_map()),
                    "stringData",
                    string_map(),
                ),
                "type",
                json!({ "type": "string" }),
            ),
        ),
        ("ServiceAccount", resource(None, false)),
        ("Namespace", resource(None, false)),
        (
            "PersistentVolumeClaim",
            resource(
                Some(json!({
                    "type": "object",
                    "properties": {
                        "accessModes": {
                            "type": "array",
                            "items": {
                                "enum": ["ReadWriteOnce", "ReadOnlyMany", "ReadWriteMany", "ReadWriteOncePod"]
                            }
                        },
                        "storageClassName": { "type": "string" },
                        "resources": {
                            "type": "object",
                            "properties": { "requests": quantities(), "limits": quantities() }
                        }
                    }
                })),
                false,
            ),
        ),
        (
            "HorizontalPodAutoscaler",
            resource(
                Some(json!({
                    "type": "object",
                    "required": ["scaleTargetRef", "maxReplicas"],
                    "properties": {
                        "scaleTargetRef": {
                            "type": "object",
                            "required": ["kind", "name"],
                            "properties": {
                                "kind": { "type": "string" },
                                "name": { "type": "string" },
                                "apiVersion": { "type": "string" }
                            }
                        },
                        "minReplicas": { "type": "integer", "minimum": 1 },
                        "maxReplicas": { "type": "integer", "minimum": 1 }
                    }
                })),
                true,
            ),
        ),
        (
            "NetworkPolicy",
            resource(
                Some(json!({
                    "type": "object",
                    "required": ["podSelector"],
                    "properties": {
                        "podSelector": label_selector(),
                        "policyTypes": {
                            "type": "array",
                            "items": { "enum": ["Ingress", "Egress"] }
                        }
                    }
                })),
                true,
            ),
        ),
        (
            "PodDisruptionBudget",
            resource(
                Some(json!({
                    "type": "object",
                    "properties": {
                        "selector": label_selector(),
                        "minAvailable": int_or_string(),
                        "maxUnavailable": int_or_string()
                    }
                })),
                true,
            ),
        ),
        ("Role", with_property(resource(None, false), "rules", policy_rules())),
        ("ClusterRole", with_property(resource(None, false), "rules", policy_rules())),
        ("RoleBinding", binding(&["Role", "ClusterRole"])),
        ("ClusterRoleBinding", binding(&["ClusterRole"])),
    ]
}
