//! Shared fixtures: trace builders and a recording state-database double.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use whittle_statedb::{
    BalanceChangeReason, Log, NonceChangeReason, StateDb, StateDbError,
};
use whittle_trace::Operation;

/// Parses a multi-line trace text into operations, skipping blank lines.
/// Block stamping is not applied; the loader's own tests cover it.
pub fn parse_ops(text: &str) -> Vec<Operation> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Operation::from_line(line).expect("valid trace line"))
        .collect()
}

pub fn addr(n: u8) -> Address {
    let mut raw = [0u8; 20];
    raw[19] = n;
    Address::from(raw)
}

/// The 42-character textual form of [`addr`].
pub fn addr_hex(n: u8) -> String {
    format!("0x{:040x}", n)
}

/// Records every backend call as a readable string, optionally failing a
/// chosen method. Lets replay tests assert exact dispatch.
#[derive(Debug)]
pub struct RecordingDb {
    pub calls: Vec<String>,
    fail_on: Option<&'static str>,
    snapshot_count: i64,
}

impl RecordingDb {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            fail_on: None,
            snapshot_count: 0,
        }
    }

    pub fn failing_on(method: &'static str) -> Self {
        Self {
            fail_on: Some(method),
            ..Self::new()
        }
    }

    fn record(&mut self, method: &'static str, call: String) -> Result<(), StateDbError> {
        self.calls.push(call);
        if self.fail_on == Some(method) {
            return Err(StateDbError::Backend(format!("injected failure in {method}")));
        }
        Ok(())
    }
}

impl StateDb for RecordingDb {
    fn create_account(&mut self, address: Address) -> Result<(), StateDbError> {
        self.record("create_account", format!("create_account({address:?})"))
    }

    fn create_contract(&mut self, address: Address) -> Result<(), StateDbError> {
        self.record("create_contract", format!("create_contract({address:?})"))
    }

    fn self_destruct(&mut self, address: Address) -> Result<(), StateDbError> {
        self.record("self_destruct", format!("self_destruct({address:?})"))
    }

    fn self_destruct_6780(&mut self, address: Address) -> Result<(), StateDbError> {
        self.record("self_destruct_6780", format!("self_destruct_6780({address:?})"))
    }

    fn has_self_destructed(&mut self, address: Address) -> Result<bool, StateDbError> {
        self.record(
            "has_self_destructed",
            format!("has_self_destructed({address:?})"),
        )?;
        Ok(false)
    }

    fn exist(&mut self, address: Address) -> Result<bool, StateDbError> {
        self.record("exist", format!("exist({address:?})"))?;
        Ok(false)
    }

    fn empty(&mut self, address: Address) -> Result<bool, StateDbError> {
        self.record("empty", format!("empty({address:?})"))?;
        Ok(true)
    }

    fn get_balance(&mut self, address: Address) -> Result<U256, StateDbError> {
        self.record("get_balance", format!("get_balance({address:?})"))?;
        Ok(U256::zero())
    }

    fn add_balance(
        &mut self,
        address: Address,
        amount: U256,
        reason: BalanceChangeReason,
    ) -> Result<(), StateDbError> {
        self.record(
            "add_balance",
            format!("add_balance({address:?}, {amount}, {reason})"),
        )
    }

    fn sub_balance(
        &mut self,
        address: Address,
        amount: U256,
        reason: BalanceChangeReason,
    ) -> Result<(), StateDbError> {
        self.record(
            "sub_balance",
            format!("sub_balance({address:?}, {amount}, {reason})"),
        )
    }

    fn get_nonce(&mut self, address: Address) -> Result<u64, StateDbError> {
        self.record("get_nonce", format!("get_nonce({address:?})"))?;
        Ok(0)
    }

    fn set_nonce(
        &mut self,
        address: Address,
        nonce: u64,
        reason: NonceChangeReason,
    ) -> Result<(), StateDbError> {
        self.record(
            "set_nonce",
            format!("set_nonce({address:?}, {nonce}, {reason})"),
        )
    }

    fn get_code(&mut self, address: Address) -> Result<Bytes, StateDbError> {
        self.record("get_code", format!("get_code({address:?})"))?;
        Ok(Bytes::new())
    }

    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), StateDbError> {
        self.record(
            "set_code",
            format!("set_code({address:?}, {} bytes)", code.len()),
        )
    }

    fn get_code_size(&mut self, address: Address) -> Result<usize, StateDbError> {
        self.record("get_code_size", format!("get_code_size({address:?})"))?;
        Ok(0)
    }

    fn get_code_hash(&mut self, address: Address) -> Result<H256, StateDbError> {
        self.record("get_code_hash", format!("get_code_hash({address:?})"))?;
        Ok(H256::zero())
    }

    fn get_storage_root(&mut self, address: Address) -> Result<H256, StateDbError> {
        self.record("get_storage_root", format!("get_storage_root({address:?})"))?;
        Ok(H256::zero())
    }

    fn get_state(&mut self, address: Address, key: H256) -> Result<H256, StateDbError> {
        self.record("get_state", format!("get_state({address:?}, {key:?})"))?;
        Ok(H256::zero())
    }

    fn set_state(
        &mut self,
        address: Address,
        key: H256,
        value: H256,
    ) -> Result<(), StateDbError> {
        self.record(
            "set_state",
            format!("set_state({address:?}, {key:?}, {value:?})"),
        )
    }

    fn get_committed_state(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<H256, StateDbError> {
        self.record(
            "get_committed_state",
            format!("get_committed_state({address:?}, {key:?})"),
        )?;
        Ok(H256::zero())
    }

    fn get_state_and_committed_state(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<(H256, H256), StateDbError> {
        self.record(
            "get_state_and_committed_state",
            format!("get_state_and_committed_state({address:?}, {key:?})"),
        )?;
        Ok((H256::zero(), H256::zero()))
    }

    fn get_transient_state(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<H256, StateDbError> {
        self.record(
            "get_transient_state",
            format!("get_transient_state({address:?}, {key:?})"),
        )?;
        Ok(H256::zero())
    }

    fn set_transient_state(
        &mut self,
        address: Address,
        key: H256,
        value: H256,
    ) -> Result<(), StateDbError> {
        self.record(
            "set_transient_state",
            format!("set_transient_state({address:?}, {key:?}, {value:?})"),
        )
    }

    fn add_refund(&mut self, gas: u64) -> Result<(), StateDbError> {
        self.record("add_refund", format!("add_refund({gas})"))
    }

    fn sub_refund(&mut self, gas: u64) -> Result<(), StateDbError> {
        self.record("sub_refund", format!("sub_refund({gas})"))
    }

    fn get_refund(&mut self) -> Result<u64, StateDbError> {
        self.record("get_refund", "get_refund()".to_string())?;
        Ok(0)
    }

    fn add_address_to_access_list(&mut self, address: Address) -> Result<(), StateDbError> {
        self.record(
            "add_address_to_access_list",
            format!("add_address_to_access_list({address:?})"),
        )
    }

    fn address_in_access_list(&mut self, address: Address) -> Result<bool, StateDbError> {
        self.record(
            "address_in_access_list",
            format!("address_in_access_list({address:?})"),
        )?;
        Ok(false)
    }

    fn add_slot_to_access_list(
        &mut self,
        address: Address,
        slot: H256,
    ) -> Result<(), StateDbError> {
        self.record(
            "add_slot_to_access_list",
            format!("add_slot_to_access_list({address:?}, {slot:?})"),
        )
    }

    fn slot_in_access_list(
        &mut self,
        address: Address,
        slot: H256,
    ) -> Result<(bool, bool), StateDbError> {
        self.record(
            "slot_in_access_list",
            format!("slot_in_access_list({address:?}, {slot:?})"),
        )?;
        Ok((false, false))
    }

    fn add_preimage(&mut self, hash: H256, preimage: Bytes) -> Result<(), StateDbError> {
        self.record(
            "add_preimage",
            format!("add_preimage({hash:?}, {} bytes)", preimage.len()),
        )
    }

    fn get_logs(
        &mut self,
        tx_hash: H256,
        tx_index: u64,
        block_hash: H256,
        block_number: u64,
    ) -> Result<Vec<Log>, StateDbError> {
        self.record(
            "get_logs",
            format!("get_logs({tx_hash:?}, {tx_index}, {block_hash:?}, {block_number})"),
        )?;
        Ok(Vec::new())
    }

    fn set_tx_context(&mut self, tx_hash: H256, tx_index: i64) -> Result<(), StateDbError> {
        self.record(
            "set_tx_context",
            format!("set_tx_context({tx_hash:?}, {tx_index})"),
        )
    }

    fn snapshot(&mut self) -> Result<i64, StateDbError> {
        let id = self.snapshot_count;
        self.snapshot_count += 1;
        self.record("snapshot", format!("snapshot() -> {id}"))?;
        Ok(id)
    }

    fn revert_to_snapshot(&mut self, id: i64) -> Result<(), StateDbError> {
        self.record("revert_to_snapshot", format!("revert_to_snapshot({id})"))
    }

    fn begin_transaction(&mut self, number: u32) -> Result<(), StateDbError> {
        self.record("begin_transaction", format!("begin_transaction({number})"))
    }

    fn end_transaction(&mut self) -> Result<(), StateDbError> {
        self.record("end_transaction", "end_transaction()".to_string())
    }

    fn begin_block(&mut self, number: u64) -> Result<(), StateDbError> {
        self.record("begin_block", format!("begin_block({number})"))
    }

    fn end_block(&mut self) -> Result<(), StateDbError> {
        self.record("end_block", "end_block()".to_string())
    }

    fn begin_sync_period(&mut self, number: u64) -> Result<(), StateDbError> {
        self.record("begin_sync_period", format!("begin_sync_period({number})"))
    }

    fn end_sync_period(&mut self) -> Result<(), StateDbError> {
        self.record("end_sync_period", "end_sync_period()".to_string())
    }

    fn intermediate_root(&mut self, delete_empty: bool) -> Result<H256, StateDbError> {
        self.record(
            "intermediate_root",
            format!("intermediate_root({delete_empty})"),
        )?;
        Ok(H256::zero())
    }

    fn finalise(&mut self, delete_empty: bool) -> Result<(), StateDbError> {
        self.record("finalise", format!("finalise({delete_empty})"))
    }

    fn commit(&mut self, block: u64, delete_empty: bool) -> Result<H256, StateDbError> {
        self.record(
            "commit",
            format!("commit(block={block}, delete_empty={delete_empty})"),
        )?;
        Ok(H256::zero())
    }

    fn get_hash(&mut self) -> Result<H256, StateDbError> {
        self.record("get_hash", "get_hash()".to_string())?;
        Ok(H256::zero())
    }

    fn get_archive_block_height(&mut self) -> Result<Option<u64>, StateDbError> {
        self.record(
            "get_archive_block_height",
            "get_archive_block_height()".to_string(),
        )?;
        Ok(None)
    }

    fn close(&mut self) -> Result<(), StateDbError> {
        self.record("close", "close()".to_string())
    }
}
