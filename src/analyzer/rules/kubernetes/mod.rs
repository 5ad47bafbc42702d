//! Built-in Kubernetes rules.

pub mod best_practice;
pub mod cross_resource;
pub mod reliability;
pub mod security;

use crate::analyzer::extract::Container;
use crate::analyzer::rules::{ResourceContext, Rule};
use crate::analyzer::types::Position;

/// Every Kubernetes rule, in catalog order.
pub fn rules() -> Vec<Box<dyn Rule>> {
    let mut rules = security::rules();
    rules.extend(reliability::rules());
    rules.extend(best_practice::rules());
    rules.extend(cross_resource::rules());
    rules
}

/// Position of a container field, falling back to the container itself.
pub(crate) fn container_position(
    ctx: &ResourceContext<'_>,
    container: &Container<'_>,
    path: &[&str],
) -> Position {
    let pointer = container.field(path);
    if ctx.resource.root.pointer(&pointer).is_some() {
        ctx.resource.position_of(&pointer, ctx.line_index)
    } else {
        container.node.position(ctx.line_index)
    }
}

/// A resource described for messages: `Deployment "web"`.
pub(crate) fn describe(ctx: &ResourceContext<'_>) -> String {
    format!("{} \"{}\"", ctx.resource.kind, ctx.resource.name)
}
