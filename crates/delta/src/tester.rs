//! Candidate testing against an ephemeral backend.
//!
//! Every test call prepares a fresh state database in its own scratch
//! directory, replays the candidate, and tears everything down before
//! classifying the result. A crash in the backend is the object under
//! study, not a reason to stop minimizing, so panics and replay errors are
//! both absorbed into [`TestOutcome::Fail`].

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::error;
use whittle_statedb::{BackendOptions, open_state_db};
use whittle_trace::Operation;

use crate::error::DeltaError;
use crate::replayer::{ReplayError, StateReplayer};

pub const DEFAULT_CHAIN_ID: u64 = 250;

/// Classification of one candidate replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestOutcome {
    /// The replay completed cleanly; the candidate does not reproduce the
    /// failure.
    Pass,
    /// The replay crashed or errored; the candidate still reproduces it.
    Fail,
    /// The run was cancelled before a verdict was reached.
    Unresolved,
}

/// Backend and environment parameters for candidate replays.
#[derive(Clone, Debug)]
pub struct TesterConfig {
    pub db_impl: String,
    pub variant: Option<String>,
    /// Scratch directories are created under here; defaults to the OS temp
    /// directory.
    pub tmp_dir: Option<PathBuf>,
    /// Backend-specific schema version.
    pub schema: Option<u32>,
    pub log_level: String,
    pub chain_id: u64,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            db_impl: whittle_statedb::MEMORY_IMPL.to_string(),
            variant: None,
            tmp_dir: None,
            schema: None,
            log_level: "INFO".to_string(),
            chain_id: DEFAULT_CHAIN_ID,
        }
    }
}

/// A candidate test: replays the given operations and classifies the result.
pub type TestFunc<'a> =
    Box<dyn FnMut(&CancellationToken, &[Operation]) -> Result<TestOutcome, DeltaError> + 'a>;

/// Builds a test function that replays candidates against freshly prepared
/// instances of the configured backend.
pub fn make_test_func(config: TesterConfig) -> TestFunc<'static> {
    Box::new(move |ctx, ops| run_candidate(&config, ctx, ops))
}

fn run_candidate(
    config: &TesterConfig,
    ctx: &CancellationToken,
    ops: &[Operation],
) -> Result<TestOutcome, DeltaError> {
    if ctx.is_cancelled() {
        return Ok(TestOutcome::Unresolved);
    }

    let tmp_root = config
        .tmp_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    let dir = tempfile::Builder::new()
        .prefix("whittle-db-")
        .tempdir_in(&tmp_root)
        .map_err(|e| {
            DeltaError::BackendPrepare(format!(
                "cannot create backend directory under {}: {e}",
                tmp_root.display()
            ))
        })?;

    let options = BackendOptions {
        impl_name: config.db_impl.clone(),
        variant: config.variant.clone(),
        schema: config.schema,
        chain_id: config.chain_id,
    };
    let mut db = open_state_db(&options, dir.path())
        .map_err(|e| DeltaError::BackendPrepare(e.to_string()))?;

    let replay = catch_unwind(AssertUnwindSafe(|| {
        let mut replayer = StateReplayer::new(db.as_mut());
        replayer.execute(ctx, ops)
    }));

    // Teardown runs on every path, and its failures are reported rather
    // than masked by the replay verdict.
    let mut cleanup_failure: Option<String> = None;
    if let Err(e) = db.close() {
        cleanup_failure = Some(format!("closing backend: {e}"));
    }
    drop(db);
    if let Err(e) = dir.close() {
        let removal = format!("removing backend directory: {e}");
        cleanup_failure = Some(match cleanup_failure {
            Some(earlier) => format!("{earlier}; {removal}"),
            None => removal,
        });
    }

    let outcome = match replay {
        Err(payload) => {
            error!("candidate replay panicked: {}", panic_message(payload.as_ref()));
            TestOutcome::Fail
        }
        Ok(Err(ReplayError::Cancelled)) => TestOutcome::Unresolved,
        Ok(Err(e)) => {
            error!("candidate replay failed: {e}");
            TestOutcome::Fail
        }
        Ok(Ok(())) => TestOutcome::Pass,
    };

    match cleanup_failure {
        Some(reason) => Err(DeltaError::Cleanup(reason)),
        None => Ok(outcome),
    }
}

fn panic_message(payload: &dyn Any) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
