//! Scope forest over a trace.
//!
//! The three `Begin…`/`End…` pairs delimit nested scopes (sync periods
//! contain blocks contain transactions). A single walk builds a forest of
//! matched scopes; the minimizer uses it to find scopes whose enabled
//! content has shrunk to nothing.

use whittle_trace::{Operation, kind};

use crate::guard::GuardVec;

const SCOPE_PAIRS: [(&str, &str); 3] = [
    (kind::BEGIN_SYNC_PERIOD, kind::END_SYNC_PERIOD),
    (kind::BEGIN_BLOCK, kind::END_BLOCK),
    (kind::BEGIN_TRANSACTION, kind::END_TRANSACTION),
];

fn as_begin(k: &str) -> Option<&'static str> {
    SCOPE_PAIRS
        .iter()
        .find(|(begin, _)| *begin == k)
        .map(|(begin, _)| *begin)
}

/// The begin-kind a given end-kind closes, if `k` is an end-kind.
fn begin_kind_for(k: &str) -> Option<&'static str> {
    SCOPE_PAIRS
        .iter()
        .find(|(_, end)| *end == k)
        .map(|(begin, _)| *begin)
}

/// The end-kind that closes a given begin-kind.
pub fn end_kind_for(begin: &str) -> Option<&'static str> {
    SCOPE_PAIRS
        .iter()
        .find(|(b, _)| *b == begin)
        .map(|(_, end)| *end)
}

/// One matched scope: `start`/`end` are the indices of the begin and end
/// operations, `leaves` the non-structural operations directly inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeNode {
    pub kind: String,
    pub start: usize,
    pub end: usize,
    pub children: Vec<ScopeNode>,
    pub leaves: Vec<usize>,
}

struct RawNode {
    kind: &'static str,
    start: usize,
    end: Option<usize>,
    children: Vec<usize>,
    leaves: Vec<usize>,
}

/// Builds the scope forest in one pass over the trace.
///
/// Stray end operations with no matching open scope are ignored; an
/// unmatched begin never closes, and the whole subtree under it is dropped
/// from the result. The walk never rejects a trace.
pub fn build_scope_forest(ops: &[Operation]) -> Vec<ScopeNode> {
    let mut nodes: Vec<RawNode> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    for (index, op) in ops.iter().enumerate() {
        let k = op.kind.as_str();
        if let Some(begin) = as_begin(k) {
            let id = nodes.len();
            nodes.push(RawNode {
                kind: begin,
                start: index,
                end: None,
                children: Vec::new(),
                leaves: Vec::new(),
            });
            match stack.last() {
                Some(&parent) => nodes[parent].children.push(id),
                None => roots.push(id),
            }
            stack.push(id);
        } else if let Some(expected_begin) = begin_kind_for(k) {
            if let Some(position) = stack
                .iter()
                .rposition(|&id| nodes[id].kind == expected_begin)
            {
                nodes[stack[position]].end = Some(index);
                // Anything opened above the matched scope stays unmatched.
                stack.truncate(position);
            }
        } else if let Some(&top) = stack.last() {
            nodes[top].leaves.push(index);
        }
    }

    roots
        .iter()
        .filter_map(|&root| materialize(&nodes, root))
        .collect()
}

fn materialize(nodes: &[RawNode], id: usize) -> Option<ScopeNode> {
    let raw = &nodes[id];
    let end = raw.end?;
    Some(ScopeNode {
        kind: raw.kind.to_string(),
        start: raw.start,
        end,
        children: raw
            .children
            .iter()
            .filter_map(|&child| materialize(nodes, child))
            .collect(),
        leaves: raw.leaves.clone(),
    })
}

/// Number of enabled leaf operations in this scope and all its descendants.
/// A scope with zero active leaves is empty and a candidate for pruning.
pub fn active_leaf_count(node: &ScopeNode, guards: &GuardVec) -> usize {
    node.leaves
        .iter()
        .filter(|&&leaf| guards.is_enabled(leaf))
        .count()
        + node
            .children
            .iter()
            .map(|child| active_leaf_count(child, guards))
            .sum::<usize>()
}
