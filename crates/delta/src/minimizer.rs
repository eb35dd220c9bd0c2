//! Multi-strategy trace minimization.
//!
//! The minimizer never edits the operation list; it shrinks a guard vector
//! over it. Three strategies run to a fixed point: structural halvening
//! binary-searches away long removable prefixes, address elimination drops
//! random samples of contract addresses, and empty-scope elimination prunes
//! `Begin…`/`End…` pairs whose content is gone. Every candidate is a subset
//! of the current baseline and is only accepted if it still fails, so the
//! enabled count strictly decreases and termination is guaranteed.

use std::time::{SystemTime, UNIX_EPOCH};

use ethereum_types::Address;
use rand::rngs::StdRng;
use rand::{SeedableRng, seq::index};
use rustc_hash::FxHashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use whittle_trace::{Operation, is_structural, kind};

use crate::error::DeltaError;
use crate::guard::GuardVec;
use crate::metadata::collect_metadata;
use crate::scope::{ScopeNode, active_leaf_count, build_scope_forest, end_kind_for};
use crate::tester::{TestFunc, TestOutcome};

/// Kinds the minimizer must never remove: the structural scaffolding and
/// the snapshot pairing that keep a candidate replayable.
pub fn default_mandatory_kinds() -> Vec<String> {
    [
        kind::BEGIN_BLOCK,
        kind::END_BLOCK,
        kind::BEGIN_TRANSACTION,
        kind::END_TRANSACTION,
        kind::SNAPSHOT,
        kind::REVERT_TO_SNAPSHOT,
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

#[derive(Clone, Debug)]
pub struct MinimizerConfig {
    /// Random samples drawn per sample size during address elimination.
    pub address_sample_runs: usize,
    /// RNG seed; values <= 0 seed from the wall clock. The effective seed is
    /// logged so a run can be reproduced exactly.
    pub rand_seed: i64,
    /// Optional ceiling for the initial address sample size.
    pub max_factor: Option<usize>,
    pub mandatory_kinds: Vec<String>,
}

impl Default for MinimizerConfig {
    fn default() -> Self {
        Self {
            address_sample_runs: 5,
            rand_seed: 0,
            max_factor: None,
            mandatory_kinds: default_mandatory_kinds(),
        }
    }
}

/// Reduces `ops` to a smaller subsequence that still fails under `test`.
///
/// Fails with [`DeltaError::InputDoesNotFail`] when the unreduced input does
/// not reproduce the failure, and with [`DeltaError::Cancelled`] when the
/// token fires; a cancelled run never returns a partial result.
pub fn minimize(
    ctx: &CancellationToken,
    ops: &[Operation],
    test: TestFunc<'_>,
    config: MinimizerConfig,
) -> Result<Vec<Operation>, DeltaError> {
    Minimizer::new(ops, test, config).run(ctx)
}

struct Minimizer<'a> {
    ops: &'a [Operation],
    test: TestFunc<'a>,
    mandatory: FxHashSet<String>,
    sample_runs: usize,
    max_factor: Option<usize>,
    rng: StdRng,
    scopes: Vec<ScopeNode>,
    guards: GuardVec,
}

impl<'a> Minimizer<'a> {
    fn new(ops: &'a [Operation], test: TestFunc<'a>, config: MinimizerConfig) -> Self {
        let seed = if config.rand_seed <= 0 {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
        } else {
            config.rand_seed as u64
        };
        info!(seed, "minimizer random seed");
        Self {
            ops,
            test,
            mandatory: config.mandatory_kinds.into_iter().collect(),
            sample_runs: config.address_sample_runs.max(1),
            max_factor: config.max_factor,
            rng: StdRng::seed_from_u64(seed),
            scopes: Vec::new(),
            guards: GuardVec::all_enabled(ops.len()),
        }
    }

    fn run(mut self, ctx: &CancellationToken) -> Result<Vec<Operation>, DeltaError> {
        info!(
            operations = self.ops.len(),
            "verifying the input trace reproduces the failure"
        );
        match self.run_candidate(ctx, &self.guards.clone())? {
            TestOutcome::Fail => {}
            TestOutcome::Pass => return Err(DeltaError::InputDoesNotFail),
            TestOutcome::Unresolved => return Err(DeltaError::Cancelled),
        }

        self.scopes = build_scope_forest(self.ops);

        loop {
            let mut removed = self.structural_halvening(ctx)?;
            removed |= self.eliminate_addresses(ctx)?;
            removed |= self.eliminate_empty_scopes(ctx)?;
            if !removed {
                break;
            }
        }

        info!(
            enabled = self.guards.enabled_count(),
            total = self.ops.len(),
            "minimization finished"
        );
        Ok(self
            .guards
            .iter_enabled()
            .map(|index| self.ops[index].clone())
            .collect())
    }

    /// Runs one candidate through the test function. The candidate must be a
    /// subset of the current baseline; anything else is a bug in a strategy.
    fn run_candidate(
        &mut self,
        ctx: &CancellationToken,
        candidate: &GuardVec,
    ) -> Result<TestOutcome, DeltaError> {
        assert!(
            candidate.is_subset_of(&self.guards),
            "candidate guard vector must be a subset of the current baseline"
        );
        if ctx.is_cancelled() {
            return Err(DeltaError::Cancelled);
        }
        let selected: Vec<Operation> = candidate
            .iter_enabled()
            .map(|index| self.ops[index].clone())
            .collect();
        let outcome = (self.test)(ctx, &selected)?;
        if outcome == TestOutcome::Unresolved || ctx.is_cancelled() {
            return Err(DeltaError::Cancelled);
        }
        Ok(outcome)
    }

    /// Whether index `i` may be disabled by the prefix strategy.
    fn is_removable_leaf(&self, i: usize) -> bool {
        let k = self.ops[i].kind.as_str();
        !is_structural(k) && !self.mandatory.contains(k)
    }

    /// Binary-searches for the largest removable prefix of enabled
    /// non-structural operations, repeating until nothing more comes off.
    fn structural_halvening(
        &mut self,
        ctx: &CancellationToken,
    ) -> Result<bool, DeltaError> {
        let mut removed = false;
        loop {
            let removable: Vec<usize> = self
                .guards
                .iter_enabled()
                .filter(|&i| self.is_removable_leaf(i))
                .collect();
            if removable.is_empty() {
                break;
            }

            // Largest k in [0, |removable|] such that disabling the first k
            // still fails. k = 0 is the current baseline, known to fail.
            let mut lo = 0usize;
            let mut hi = removable.len();
            while lo < hi {
                let mid = lo + (hi - lo + 1) / 2;
                let mut candidate = self.guards.clone();
                for &i in &removable[..mid] {
                    candidate.disable(i);
                }
                if self.run_candidate(ctx, &candidate)? == TestOutcome::Fail {
                    lo = mid;
                } else {
                    hi = mid - 1;
                }
            }
            if lo == 0 {
                break;
            }
            for &i in &removable[..lo] {
                self.guards.disable(i);
            }
            debug!(
                removed = lo,
                remaining = self.guards.enabled_count(),
                "structural halvening accepted a prefix removal"
            );
            removed = true;
        }
        Ok(removed)
    }

    /// Disables every operation addressing a randomly sampled set of
    /// contracts; keeps the sample if the candidate still fails, otherwise
    /// halves the sample size until it cannot shrink further.
    fn eliminate_addresses(&mut self, ctx: &CancellationToken) -> Result<bool, DeltaError> {
        let mut removed = false;
        'rebuild: loop {
            let meta = collect_metadata(self.ops, &self.guards, &self.mandatory);
            let mut addresses: Vec<Address> = meta.iter().filter_map(|m| m.contract).collect();
            addresses.sort();
            addresses.dedup();
            if addresses.len() <= 1 {
                break;
            }

            let mut sample_size = (addresses.len() / 2).max(1);
            if let Some(max_factor) = self.max_factor {
                sample_size = sample_size.min(max_factor);
            }
            sample_size = sample_size.min(addresses.len() - 1).max(1);

            loop {
                for _ in 0..self.sample_runs {
                    let picks = index::sample(&mut self.rng, addresses.len(), sample_size);
                    let sample: FxHashSet<Address> =
                        picks.iter().map(|i| addresses[i]).collect();

                    let mut candidate = self.guards.clone();
                    let mut changed = false;
                    for m in &meta {
                        if m.mandatory {
                            continue;
                        }
                        if let Some(contract) = m.contract
                            && sample.contains(&contract)
                        {
                            candidate.disable(m.index);
                            changed = true;
                        }
                    }
                    if !changed {
                        continue;
                    }
                    if self.run_candidate(ctx, &candidate)? == TestOutcome::Fail {
                        debug!(
                            sampled_addresses = sample_size,
                            remaining = candidate.enabled_count(),
                            "address elimination accepted a sample"
                        );
                        self.guards = candidate;
                        removed = true;
                        continue 'rebuild;
                    }
                }
                if sample_size == 1 {
                    break 'rebuild;
                }
                sample_size = sample_size.div_ceil(2);
            }
        }
        Ok(removed)
    }

    /// Clears the begin/end pair of every scope whose enabled leaf count has
    /// dropped to zero, then accepts or rejects all clearings with a single
    /// test. Scopes whose begin or end kind is mandatory are left alone.
    fn eliminate_empty_scopes(&mut self, ctx: &CancellationToken) -> Result<bool, DeltaError> {
        let mut pairs = Vec::new();
        collect_empty_scopes(&self.scopes, &self.guards, &self.mandatory, &mut pairs);

        let mut candidate = self.guards.clone();
        let mut changed = false;
        for (start, end) in pairs {
            if candidate.is_enabled(start) || candidate.is_enabled(end) {
                candidate.disable(start);
                candidate.disable(end);
                changed = true;
            }
        }
        if !changed {
            return Ok(false);
        }
        if self.run_candidate(ctx, &candidate)? == TestOutcome::Fail {
            debug!(
                remaining = candidate.enabled_count(),
                "empty-scope elimination accepted"
            );
            self.guards = candidate;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

fn collect_empty_scopes(
    forest: &[ScopeNode],
    guards: &GuardVec,
    mandatory: &FxHashSet<String>,
    out: &mut Vec<(usize, usize)>,
) {
    for node in forest {
        if active_leaf_count(node, guards) == 0 {
            let removable = !mandatory.contains(node.kind.as_str())
                && end_kind_for(&node.kind).is_some_and(|end| !mandatory.contains(end));
            if removable {
                out.push((node.start, node.end));
            }
        }
        collect_empty_scopes(&node.children, guards, mandatory, out);
    }
}
