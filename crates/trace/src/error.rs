//! Error types for trace loading and writing.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("no trace files were given")]
    NoInputFiles,

    #[error("block filtering of trace files is not supported (got first={first}, last={last})")]
    BlockFilterUnsupported { first: u64, last: u64 },

    #[error("trace files contained no operations")]
    EmptyTrace,

    #[error("cannot write an empty trace")]
    EmptyWrite,

    /// Malformed trace line. `line` is 1-based.
    #[error("{}:{line}: {reason}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl TraceError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TraceError::Io {
            context: context.into(),
            source,
        }
    }
}
