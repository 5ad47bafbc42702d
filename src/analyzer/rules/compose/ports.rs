//! Host port conflicts between services.

use crate::analyzer::parser::Node;
use crate::analyzer::rules::compose::is_service;
use crate::analyzer::rules::{CheckFn, RegistryContext, Rule, RuleMeta, SimpleRule};
use crate::analyzer::types::{Diagnostic, ManifestFamily, RuleCategory, Severity};
use std::ops::RangeInclusive;

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![Box::new(SimpleRule::new(
        "compose-duplicate-host-port",
        "Host port published twice",
        Severity::Error,
        RuleCategory::Semantic,
        ManifestFamily::Compose,
        RuleMeta::new(
            "Two port mappings bind the same host port and protocol; the second container fails to start.",
            "services:\n  a:\n    ports: [\"8080:80\"]\n  b:\n    ports: [\"8080:8080\"]",
            "services:\n  a:\n    ports: [\"8080:80\"]\n  b:\n    ports: [\"8081:8080\"]",
        ),
        CheckFn::Registry(check_duplicate_ports),
    ))]
}

/// Host side of one port mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBinding {
    /// Bound address. `None` is every interface.
    pub ip: Option<String>,
    pub ports: RangeInclusive<u32>,
    pub protocol: String,
}

impl HostBinding {
    /// First port both bindings would claim.
    fn conflict(&self, other: &HostBinding) -> Option<u32> {
        if self.protocol != other.protocol {
            return None;
        }
        let same_interface = match (&self.ip, &other.ip) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        if !same_interface {
            return None;
        }
        let start = (*self.ports.start()).max(*other.ports.start());
        let end = (*self.ports.end()).min(*other.ports.end());
        (start <= end).then_some(start)
    }
}

fn parse_port_range(spec: &str) -> Option<RangeInclusive<u32>> {
    let (start, end) = match spec.split_once('-') {
        Some((a, b)) => (a.trim().parse().ok()?, b.trim().parse().ok()?),
        None => {
            let port = spec.trim().parse().ok()?;
            (port, port)
        }
    };
    (1 <= start && start <= end && end <= 65535).then_some(start..=end)
}

fn normalize_ip(ip: &str) -> Option<String> {
    let ip = ip.trim_start_matches('[').trim_end_matches(']');
    match ip {
        "" | "0.0.0.0" | "::" => None,
        other => Some(other.to_string()),
    }
}

/// Parse the short syntax, `[HOST_IP:][HOST:]CONTAINER[/PROTOCOL]`.
///
/// Mappings without a host port publish on an ephemeral one and yield
/// `None`.
pub fn parse_short(spec: &str) -> Option<HostBinding> {
    let (body, protocol) = match spec.rsplit_once('/') {
        Some((body, proto)) => (body, proto.to_ascii_lowercase()),
        None => (spec, "tcp".to_string()),
    };
    let (host_part, _container) = body.rsplit_once(':')?;

    let (ip, host) = if let Some(rest) = host_part.strip_prefix('[') {
        let (ip, host) = rest.split_once("]:")?;
        (normalize_ip(ip), host)
    } else {
        match host_part.rsplit_once(':') {
            Some((ip, host)) => (normalize_ip(ip), host),
            None => (None, host_part),
        }
    };
    if host.is_empty() {
        return None;
    }
    Some(HostBinding {
        ip,
        ports: parse_port_range(host)?,
        protocol,
    })
}

/// Parse the long syntax, `{target, published, host_ip, protocol}`.
pub fn parse_long(node: &Node) -> Option<HostBinding> {
    let published = node.get("published")?.scalar_string()?;
    Some(HostBinding {
        ip: node
            .get("host_ip")
            .and_then(Node::scalar_string)
            .and_then(|ip| normalize_ip(&ip)),
        ports: parse_port_range(&published)?,
        protocol: node
            .get("protocol")
            .and_then(Node::scalar_string)
            .map(|p| p.to_ascii_lowercase())
            .unwrap_or_else(|| "tcp".to_string()),
    })
}

fn binding_of(item: &Node) -> Option<HostBinding> {
    if item.is_mapping() {
        return parse_long(item);
    }
    // A bare number only names the container port
    item.as_str().and_then(parse_short)
}

fn check_duplicate_ports(ctx: &RegistryContext<'_>) -> Vec<Diagnostic> {
    let mut claimed: Vec<(String, HostBinding)> = Vec::new();
    let mut diagnostics = Vec::new();

    for service in ctx.resources.iter().filter(|r| is_service(r)) {
        let ports = service.root.get("ports").map(Node::items).unwrap_or_default();
        for item in ports {
            let Some(binding) = binding_of(item) else {
                continue;
            };
            let clash = claimed
                .iter()
                .find_map(|(owner, other)| Some((owner.clone(), binding.conflict(other)?)));
            match clash {
                Some((owner, port)) => diagnostics.push(Diagnostic::new(
                    format!(
                        "Host port {}/{} of service \"{}\" is already published by service \"{}\"",
                        port, binding.protocol, service.name, owner
                    ),
                    item.position(ctx.line_index),
                )),
                None => claimed.push((service.name.clone(), binding)),
            }
        }
    }
    diagnostics
}
