//! Per-operation properties derived from the current guard vector.

use ethereum_types::Address;
use rustc_hash::FxHashSet;
use whittle_trace::Operation;

use crate::guard::GuardVec;

/// Kinds that carry no explicit address but operate on the most recently
/// addressed contract. Traces record them in a compressed form; the address
/// is recovered here by inheritance.
pub const INHERIT_KINDS: [&str; 11] = [
    "SetStateLcls",
    "SetTransientStateLcls",
    "GetTransientStateLccs",
    "GetTransientStateLc",
    "GetTransientStateLcls",
    "GetStateAndCommittedStateLcls",
    "GetStateLcls",
    "GetStateLccs",
    "GetStateLc",
    "GetCommittedStateLcls",
    "GetCodeHashLc",
];

/// Properties of one enabled operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpMetadata<'a> {
    /// Index into the original operation sequence.
    pub index: usize,
    pub kind: &'a str,
    pub mandatory: bool,
    /// Direct or inherited contract address.
    pub contract: Option<Address>,
}

/// Walks the enabled operations in order, resolving inherited contract
/// addresses against the most recent directly-addressed operation.
pub fn collect_metadata<'a>(
    ops: &'a [Operation],
    guards: &GuardVec,
    mandatory: &FxHashSet<String>,
) -> Vec<OpMetadata<'a>> {
    let mut out = Vec::with_capacity(guards.enabled_count());
    let mut prev_contract: Option<Address> = None;
    for index in guards.iter_enabled() {
        let op = &ops[index];
        let kind = op.kind.as_str();
        let contract = if let Some(address) = op.contract {
            prev_contract = Some(address);
            Some(address)
        } else if INHERIT_KINDS.contains(&kind) {
            prev_contract
        } else {
            None
        };
        out.push(OpMetadata {
            index,
            kind,
            mandatory: mandatory.contains(kind),
            contract,
        });
    }
    out
}
