//! Backend selection by name.

use std::path::Path;

use crate::error::StateDbError;
use crate::in_memory::InMemoryDb;
use crate::StateDb;

pub const MEMORY_IMPL: &str = "memory";

/// Backend-selection parameters, as they arrive from configuration.
#[derive(Clone, Debug)]
pub struct BackendOptions {
    pub impl_name: String,
    pub variant: Option<String>,
    /// Backend-specific schema version; the in-memory backend ignores it.
    pub schema: Option<u32>,
    pub chain_id: u64,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            impl_name: MEMORY_IMPL.to_string(),
            variant: None,
            schema: None,
            chain_id: 250,
        }
    }
}

/// Opens the configured state-database implementation anchored to `dir`.
pub fn open_state_db(
    options: &BackendOptions,
    dir: &Path,
) -> Result<Box<dyn StateDb>, StateDbError> {
    match options.impl_name.as_str() {
        "" | MEMORY_IMPL => {
            if let Some(variant) = options.variant.as_deref()
                && variant != "default"
            {
                return Err(StateDbError::UnknownVariant {
                    impl_name: MEMORY_IMPL.to_string(),
                    variant: variant.to_string(),
                });
            }
            Ok(Box::new(InMemoryDb::open(dir, options.chain_id)?))
        }
        other => Err(StateDbError::UnknownImpl(other.to_string())),
    }
}
