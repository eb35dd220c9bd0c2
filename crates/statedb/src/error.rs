//! Error type shared by all state-database backends.

#[derive(Debug, thiserror::Error)]
pub enum StateDbError {
    #[error("unknown state database implementation {0:?}")]
    UnknownImpl(String),

    #[error("unknown variant {variant:?} for state database implementation {impl_name:?}")]
    UnknownVariant { impl_name: String, variant: String },

    #[error("state database is closed")]
    Closed,

    #[error("unknown snapshot id {0}")]
    UnknownSnapshot(i64),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure; this is what a backend under test reports
    /// when it hits the defect being minimized.
    #[error("{0}")]
    Backend(String),
}
