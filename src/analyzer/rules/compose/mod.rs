//! Built-in Docker Compose rules.

pub mod ports;
pub mod service;
pub mod topology;

use crate::analyzer::extract::Resource;
use crate::analyzer::rules::Rule;

/// Every Compose rule, in catalog order.
pub fn rules() -> Vec<Box<dyn Rule>> {
    let mut rules = service::rules();
    rules.extend(ports::rules());
    rules.extend(topology::rules());
    rules
}

pub(crate) fn is_service(resource: &Resource) -> bool {
    resource.kind == "service"
}
