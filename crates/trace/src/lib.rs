//! Trace model and on-disk format.
//!
//! A trace is an ordered sequence of recorded state-database operations,
//! stored as line-oriented UTF-8 (`Kind, Arg1, Arg2, …`). This crate holds
//! the in-memory [`Operation`] representation and the loader/writer for the
//! textual format. Everything downstream (replay, minimization) consumes the
//! operation sequence produced here.

pub mod error;
pub mod file;
pub mod operation;

pub use error::TraceError;
pub use file::{first_block, load_trace, write_trace};
pub use operation::{Operation, is_structural, kind, parse_address};
