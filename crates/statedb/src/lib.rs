//! State-database capability and reference backend.
//!
//! The replay engine is polymorphic over anything implementing [`StateDb`]:
//! the full balance/nonce/code/storage/transient-storage/refund/access-list/
//! snapshot/lifecycle surface a recorded trace can drive. The crate ships a
//! reference in-memory implementation and a factory that selects a backend by
//! name, so traces can be replayed without wiring a production database in.

pub mod error;
pub mod factory;
pub mod in_memory;
pub mod reason;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

pub use error::StateDbError;
pub use factory::{BackendOptions, MEMORY_IMPL, open_state_db};
pub use in_memory::InMemoryDb;
pub use reason::{BalanceChangeReason, NonceChangeReason};

/// One emitted log record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

/// The state-database surface a replayed trace is dispatched onto.
///
/// Implementations only need to tolerate being driven through this surface in
/// recorded order; `close` is the terminal signal, after which no further
/// calls are made. Every method may fail, and a failure is how a backend
/// under test reports the defect the minimizer is hunting.
pub trait StateDb {
    fn create_account(&mut self, address: Address) -> Result<(), StateDbError>;
    fn create_contract(&mut self, address: Address) -> Result<(), StateDbError>;
    fn self_destruct(&mut self, address: Address) -> Result<(), StateDbError>;
    fn self_destruct_6780(&mut self, address: Address) -> Result<(), StateDbError>;
    fn has_self_destructed(&mut self, address: Address) -> Result<bool, StateDbError>;
    fn exist(&mut self, address: Address) -> Result<bool, StateDbError>;
    fn empty(&mut self, address: Address) -> Result<bool, StateDbError>;

    fn get_balance(&mut self, address: Address) -> Result<U256, StateDbError>;
    fn add_balance(
        &mut self,
        address: Address,
        amount: U256,
        reason: BalanceChangeReason,
    ) -> Result<(), StateDbError>;
    fn sub_balance(
        &mut self,
        address: Address,
        amount: U256,
        reason: BalanceChangeReason,
    ) -> Result<(), StateDbError>;

    fn get_nonce(&mut self, address: Address) -> Result<u64, StateDbError>;
    fn set_nonce(
        &mut self,
        address: Address,
        nonce: u64,
        reason: NonceChangeReason,
    ) -> Result<(), StateDbError>;

    fn get_code(&mut self, address: Address) -> Result<Bytes, StateDbError>;
    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), StateDbError>;
    fn get_code_size(&mut self, address: Address) -> Result<usize, StateDbError>;
    fn get_code_hash(&mut self, address: Address) -> Result<H256, StateDbError>;
    fn get_storage_root(&mut self, address: Address) -> Result<H256, StateDbError>;

    fn get_state(&mut self, address: Address, key: H256) -> Result<H256, StateDbError>;
    fn set_state(
        &mut self,
        address: Address,
        key: H256,
        value: H256,
    ) -> Result<(), StateDbError>;
    fn get_committed_state(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<H256, StateDbError>;
    fn get_state_and_committed_state(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<(H256, H256), StateDbError>;
    fn get_transient_state(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<H256, StateDbError>;
    fn set_transient_state(
        &mut self,
        address: Address,
        key: H256,
        value: H256,
    ) -> Result<(), StateDbError>;

    fn add_refund(&mut self, gas: u64) -> Result<(), StateDbError>;
    fn sub_refund(&mut self, gas: u64) -> Result<(), StateDbError>;
    fn get_refund(&mut self) -> Result<u64, StateDbError>;

    fn add_address_to_access_list(&mut self, address: Address) -> Result<(), StateDbError>;
    fn address_in_access_list(&mut self, address: Address) -> Result<bool, StateDbError>;
    fn add_slot_to_access_list(
        &mut self,
        address: Address,
        slot: H256,
    ) -> Result<(), StateDbError>;
    /// Returns `(address_present, slot_present)`.
    fn slot_in_access_list(
        &mut self,
        address: Address,
        slot: H256,
    ) -> Result<(bool, bool), StateDbError>;

    fn add_preimage(&mut self, hash: H256, preimage: Bytes) -> Result<(), StateDbError>;
    fn get_logs(
        &mut self,
        tx_hash: H256,
        tx_index: u64,
        block_hash: H256,
        block_number: u64,
    ) -> Result<Vec<Log>, StateDbError>;
    fn set_tx_context(&mut self, tx_hash: H256, tx_index: i64) -> Result<(), StateDbError>;

    fn snapshot(&mut self) -> Result<i64, StateDbError>;
    fn revert_to_snapshot(&mut self, id: i64) -> Result<(), StateDbError>;

    fn begin_transaction(&mut self, number: u32) -> Result<(), StateDbError>;
    fn end_transaction(&mut self) -> Result<(), StateDbError>;
    fn begin_block(&mut self, number: u64) -> Result<(), StateDbError>;
    fn end_block(&mut self) -> Result<(), StateDbError>;
    fn begin_sync_period(&mut self, number: u64) -> Result<(), StateDbError>;
    fn end_sync_period(&mut self) -> Result<(), StateDbError>;

    fn intermediate_root(&mut self, delete_empty: bool) -> Result<H256, StateDbError>;
    fn finalise(&mut self, delete_empty: bool) -> Result<(), StateDbError>;
    fn commit(&mut self, block: u64, delete_empty: bool) -> Result<H256, StateDbError>;
    fn get_hash(&mut self) -> Result<H256, StateDbError>;
    fn get_archive_block_height(&mut self) -> Result<Option<u64>, StateDbError>;

    fn close(&mut self) -> Result<(), StateDbError>;
}
