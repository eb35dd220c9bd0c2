//! Errors surfaced by the tester and the minimizer.

#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    /// The unreduced input already passes; there is nothing to minimize.
    #[error("input trace does not reproduce a failure")]
    InputDoesNotFail,

    #[error("minimization cancelled")]
    Cancelled,

    #[error("failed to prepare state database backend: {0}")]
    BackendPrepare(String),

    #[error("backend cleanup failed: {0}")]
    Cleanup(String),

    /// Error raised by a user-supplied test function.
    #[error("test function error: {0}")]
    TestFunction(String),
}
