//! Delta-debugging core: trace replay and minimization.
//!
//! Given a recorded operation trace that makes a state-database backend
//! fail, the minimizer searches for a much smaller subsequence that still
//! reproduces the failure. Candidates are expressed as guard vectors over
//! the immutable original sequence and re-executed against a freshly
//! prepared backend per attempt; three reduction strategies (structural
//! halvening, random address elimination, empty-scope pruning) run to a
//! fixed point under strict subset monotonicity.

pub mod error;
pub mod guard;
pub mod metadata;
pub mod minimizer;
pub mod replayer;
pub mod scope;
pub mod tester;

pub use error::DeltaError;
pub use guard::GuardVec;
pub use metadata::{INHERIT_KINDS, OpMetadata, collect_metadata};
pub use minimizer::{MinimizerConfig, default_mandatory_kinds, minimize};
pub use replayer::{ReplayError, StateReplayer};
pub use scope::{ScopeNode, active_leaf_count, build_scope_forest};
pub use tester::{TestFunc, TestOutcome, TesterConfig, make_test_func};

#[cfg(test)]
mod tests;
