//! Topological ordering and cycle detection (Kahn's algorithm).

use std::collections::{BTreeMap, BTreeSet};

/// Result of [`detect_cycles`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Nodes in topological order. Ties are broken by id.
    pub order: Vec<String>,
    /// Nodes that never reached in-degree zero, sorted.
    pub cyclic: Vec<String>,
}

impl CycleReport {
    pub fn has_cycles(&self) -> bool {
        !self.cyclic.is_empty()
    }
}

/// Run Kahn's algorithm over `edges` (`from` must precede `to`).
///
/// Edges touching a node outside `nodes` are ignored. Every node left out
/// of the order sits on a cycle or downstream of one; self-loops count.
pub fn detect_cycles<S: AsRef<str>>(nodes: &[S], edges: &[(S, S)]) -> CycleReport {
    let mut in_degree: BTreeMap<&str, usize> =
        nodes.iter().map(|n| (n.as_ref(), 0)).collect();
    let mut successors: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for (from, to) in edges {
        let (from, to) = (from.as_ref(), to.as_ref());
        if !in_degree.contains_key(from) || !in_degree.contains_key(to) {
            continue;
        }
        if successors.entry(from).or_default().insert(to) {
            if let Some(d) = in_degree.get_mut(to) {
                *d += 1;
            }
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|&(_, &d)| d == 0)
        .map(|(&n, _)| n)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());
        let Some(next) = successors.get(node) else {
            continue;
        };
        for &succ in next {
            if let Some(d) = in_degree.get_mut(succ) {
                *d -= 1;
                if *d == 0 {
                    ready.insert(succ);
                }
            }
        }
    }

    let placed: BTreeSet<&str> = order.iter().map(String::as_str).collect();
    let cyclic = in_degree
        .keys()
        .filter(|n| !placed.contains(*n))
        .map(|n| n.to_string())
        .collect();

    CycleReport { order, cyclic }
}
