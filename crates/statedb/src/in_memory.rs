//! Reference in-memory state database.
//!
//! Backs every [`StateDb`] operation with plain hash maps. Snapshots are
//! clone-based: cheap enough for the short candidate traces the minimizer
//! replays, and trivially correct to revert. The instance is anchored to a
//! directory so it has the same open/close lifecycle as a persistent
//! backend, but nothing is ever written there.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use rustc_hash::{FxHashMap, FxHashSet};
use sha3::{Digest, Keccak256};
use tracing::debug;

use crate::error::StateDbError;
use crate::reason::{BalanceChangeReason, NonceChangeReason};
use crate::{Log, StateDb};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Account {
    balance: U256,
    nonce: u64,
    code: Bytes,
    destructed: bool,
}

impl Account {
    fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && self.code.is_empty()
    }
}

/// Mutable world state; snapshots capture and restore it wholesale.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct World {
    accounts: FxHashMap<Address, Account>,
    storage: FxHashMap<(Address, H256), H256>,
    transient: FxHashMap<(Address, H256), H256>,
    refund: u64,
    accessed_addresses: FxHashSet<Address>,
    accessed_slots: FxHashSet<(Address, H256)>,
    /// Accounts created in the current transaction; consulted by
    /// `self_destruct_6780`, cleared at transaction begin.
    created_this_tx: FxHashSet<Address>,
}

pub struct InMemoryDb {
    dir: PathBuf,
    chain_id: u64,
    world: World,
    /// Storage as of the last transaction/commit boundary.
    committed: FxHashMap<(Address, H256), H256>,
    preimages: FxHashMap<H256, Bytes>,
    snapshots: Vec<World>,
    tx_context: Option<(H256, i64)>,
    closed: bool,
}

impl InMemoryDb {
    /// Opens an instance anchored to an existing directory.
    pub fn open(dir: &Path, chain_id: u64) -> Result<Self, StateDbError> {
        let meta = std::fs::metadata(dir)?;
        if !meta.is_dir() {
            return Err(StateDbError::Backend(format!(
                "state directory {} is not a directory",
                dir.display()
            )));
        }
        debug!(dir = %dir.display(), chain_id, "opened in-memory state database");
        Ok(Self {
            dir: dir.to_path_buf(),
            chain_id,
            world: World::default(),
            committed: FxHashMap::default(),
            preimages: FxHashMap::default(),
            snapshots: Vec::new(),
            tx_context: None,
            closed: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The transaction context last set via `SetTxContext`.
    pub fn tx_context(&self) -> Option<(H256, i64)> {
        self.tx_context
    }

    pub fn preimage(&self, hash: H256) -> Option<&Bytes> {
        self.preimages.get(&hash)
    }

    fn check_open(&self) -> Result<(), StateDbError> {
        if self.closed {
            Err(StateDbError::Closed)
        } else {
            Ok(())
        }
    }

    fn account_mut(&mut self, address: Address) -> &mut Account {
        self.world.accounts.entry(address).or_default()
    }

    fn prune_empty_accounts(&mut self) {
        self.world.accounts.retain(|_, account| !account.is_empty());
    }

    fn code_hash(code: &Bytes) -> H256 {
        H256::from_slice(&Keccak256::digest(code))
    }

    /// Deterministic digest over the full world state.
    fn state_hash(&self) -> H256 {
        let mut hasher = Keccak256::new();
        hasher.update(self.chain_id.to_be_bytes());

        let mut addresses: Vec<&Address> = self.world.accounts.keys().collect();
        addresses.sort();
        for address in addresses {
            let account = &self.world.accounts[address];
            hasher.update(address.as_bytes());
            hasher.update(account.balance.to_big_endian());
            hasher.update(account.nonce.to_be_bytes());
            hasher.update(Self::code_hash(&account.code).as_bytes());
        }

        let mut slots: Vec<(&(Address, H256), &H256)> = self.world.storage.iter().collect();
        slots.sort();
        for ((address, key), value) in slots {
            hasher.update(address.as_bytes());
            hasher.update(key.as_bytes());
            hasher.update(value.as_bytes());
        }
        H256::from_slice(&hasher.finalize())
    }
}

impl StateDb for InMemoryDb {
    fn create_account(&mut self, address: Address) -> Result<(), StateDbError> {
        self.check_open()?;
        self.world.accounts.insert(address, Account::default());
        self.world.created_this_tx.insert(address);
        Ok(())
    }

    fn create_contract(&mut self, address: Address) -> Result<(), StateDbError> {
        self.check_open()?;
        self.account_mut(address);
        self.world.created_this_tx.insert(address);
        Ok(())
    }

    fn self_destruct(&mut self, address: Address) -> Result<(), StateDbError> {
        self.check_open()?;
        let account = self.account_mut(address);
        account.destructed = true;
        account.balance = U256::zero();
        Ok(())
    }

    fn self_destruct_6780(&mut self, address: Address) -> Result<(), StateDbError> {
        self.check_open()?;
        // Post-Cancun semantics: only destruct accounts created in the same
        // transaction.
        if self.world.created_this_tx.contains(&address) {
            return self.self_destruct(address);
        }
        Ok(())
    }

    fn has_self_destructed(&mut self, address: Address) -> Result<bool, StateDbError> {
        self.check_open()?;
        Ok(self
            .world
            .accounts
            .get(&address)
            .is_some_and(|a| a.destructed))
    }

    fn exist(&mut self, address: Address) -> Result<bool, StateDbError> {
        self.check_open()?;
        Ok(self.world.accounts.contains_key(&address))
    }

    fn empty(&mut self, address: Address) -> Result<bool, StateDbError> {
        self.check_open()?;
        Ok(self
            .world
            .accounts
            .get(&address)
            .is_none_or(Account::is_empty))
    }

    fn get_balance(&mut self, address: Address) -> Result<U256, StateDbError> {
        self.check_open()?;
        Ok(self
            .world
            .accounts
            .get(&address)
            .map(|a| a.balance)
            .unwrap_or_default())
    }

    fn add_balance(
        &mut self,
        address: Address,
        amount: U256,
        _reason: BalanceChangeReason,
    ) -> Result<(), StateDbError> {
        self.check_open()?;
        let account = self.account_mut(address);
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| StateDbError::Backend(format!("balance overflow on {address:?}")))?;
        Ok(())
    }

    fn sub_balance(
        &mut self,
        address: Address,
        amount: U256,
        _reason: BalanceChangeReason,
    ) -> Result<(), StateDbError> {
        self.check_open()?;
        let account = self.account_mut(address);
        account.balance = account
            .balance
            .checked_sub(amount)
            .ok_or_else(|| StateDbError::Backend(format!("balance underflow on {address:?}")))?;
        Ok(())
    }

    fn get_nonce(&mut self, address: Address) -> Result<u64, StateDbError> {
        self.check_open()?;
        Ok(self
            .world
            .accounts
            .get(&address)
            .map(|a| a.nonce)
            .unwrap_or_default())
    }

    fn set_nonce(
        &mut self,
        address: Address,
        nonce: u64,
        _reason: NonceChangeReason,
    ) -> Result<(), StateDbError> {
        self.check_open()?;
        self.account_mut(address).nonce = nonce;
        Ok(())
    }

    fn get_code(&mut self, address: Address) -> Result<Bytes, StateDbError> {
        self.check_open()?;
        Ok(self
            .world
            .accounts
            .get(&address)
            .map(|a| a.code.clone())
            .unwrap_or_default())
    }

    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), StateDbError> {
        self.check_open()?;
        self.account_mut(address).code = code;
        Ok(())
    }

    fn get_code_size(&mut self, address: Address) -> Result<usize, StateDbError> {
        self.check_open()?;
        Ok(self
            .world
            .accounts
            .get(&address)
            .map(|a| a.code.len())
            .unwrap_or_default())
    }

    fn get_code_hash(&mut self, address: Address) -> Result<H256, StateDbError> {
        self.check_open()?;
        let code = self
            .world
            .accounts
            .get(&address)
            .map(|a| a.code.clone())
            .unwrap_or_default();
        Ok(Self::code_hash(&code))
    }

    fn get_storage_root(&mut self, address: Address) -> Result<H256, StateDbError> {
        self.check_open()?;
        let mut slots: Vec<(&H256, &H256)> = self
            .world
            .storage
            .iter()
            .filter(|((a, _), _)| *a == address)
            .map(|((_, k), v)| (k, v))
            .collect();
        slots.sort();
        let mut hasher = Keccak256::new();
        for (key, value) in slots {
            hasher.update(key.as_bytes());
            hasher.update(value.as_bytes());
        }
        Ok(H256::from_slice(&hasher.finalize()))
    }

    fn get_state(&mut self, address: Address, key: H256) -> Result<H256, StateDbError> {
        self.check_open()?;
        Ok(self
            .world
            .storage
            .get(&(address, key))
            .copied()
            .unwrap_or_default())
    }

    fn set_state(
        &mut self,
        address: Address,
        key: H256,
        value: H256,
    ) -> Result<(), StateDbError> {
        self.check_open()?;
        self.world.storage.insert((address, key), value);
        Ok(())
    }

    fn get_committed_state(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<H256, StateDbError> {
        self.check_open()?;
        Ok(self
            .committed
            .get(&(address, key))
            .copied()
            .unwrap_or_default())
    }

    fn get_state_and_committed_state(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<(H256, H256), StateDbError> {
        let current = self.get_state(address, key)?;
        let committed = self.get_committed_state(address, key)?;
        Ok((current, committed))
    }

    fn get_transient_state(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<H256, StateDbError> {
        self.check_open()?;
        Ok(self
            .world
            .transient
            .get(&(address, key))
            .copied()
            .unwrap_or_default())
    }

    fn set_transient_state(
        &mut self,
        address: Address,
        key: H256,
        value: H256,
    ) -> Result<(), StateDbError> {
        self.check_open()?;
        self.world.transient.insert((address, key), value);
        Ok(())
    }

    fn add_refund(&mut self, gas: u64) -> Result<(), StateDbError> {
        self.check_open()?;
        self.world.refund = self
            .world
            .refund
            .checked_add(gas)
            .ok_or_else(|| StateDbError::Backend("refund counter overflow".to_string()))?;
        Ok(())
    }

    fn sub_refund(&mut self, gas: u64) -> Result<(), StateDbError> {
        self.check_open()?;
        self.world.refund = self
            .world
            .refund
            .checked_sub(gas)
            .ok_or_else(|| StateDbError::Backend("refund counter underflow".to_string()))?;
        Ok(())
    }

    fn get_refund(&mut self) -> Result<u64, StateDbError> {
        self.check_open()?;
        Ok(self.world.refund)
    }

    fn add_address_to_access_list(&mut self, address: Address) -> Result<(), StateDbError> {
        self.check_open()?;
        self.world.accessed_addresses.insert(address);
        Ok(())
    }

    fn address_in_access_list(&mut self, address: Address) -> Result<bool, StateDbError> {
        self.check_open()?;
        Ok(self.world.accessed_addresses.contains(&address))
    }

    fn add_slot_to_access_list(
        &mut self,
        address: Address,
        slot: H256,
    ) -> Result<(), StateDbError> {
        self.check_open()?;
        self.world.accessed_addresses.insert(address);
        self.world.accessed_slots.insert((address, slot));
        Ok(())
    }

    fn slot_in_access_list(
        &mut self,
        address: Address,
        slot: H256,
    ) -> Result<(bool, bool), StateDbError> {
        self.check_open()?;
        Ok((
            self.world.accessed_addresses.contains(&address),
            self.world.accessed_slots.contains(&(address, slot)),
        ))
    }

    fn add_preimage(&mut self, hash: H256, preimage: Bytes) -> Result<(), StateDbError> {
        self.check_open()?;
        self.preimages.insert(hash, preimage);
        Ok(())
    }

    fn get_logs(
        &mut self,
        _tx_hash: H256,
        _tx_index: u64,
        _block_hash: H256,
        _block_number: u64,
    ) -> Result<Vec<Log>, StateDbError> {
        self.check_open()?;
        Ok(Vec::new())
    }

    fn set_tx_context(&mut self, tx_hash: H256, tx_index: i64) -> Result<(), StateDbError> {
        self.check_open()?;
        self.tx_context = Some((tx_hash, tx_index));
        Ok(())
    }

    fn snapshot(&mut self) -> Result<i64, StateDbError> {
        self.check_open()?;
        self.snapshots.push(self.world.clone());
        Ok((self.snapshots.len() - 1) as i64)
    }

    fn revert_to_snapshot(&mut self, id: i64) -> Result<(), StateDbError> {
        self.check_open()?;
        let index = usize::try_from(id).map_err(|_| StateDbError::UnknownSnapshot(id))?;
        if index >= self.snapshots.len() {
            return Err(StateDbError::UnknownSnapshot(id));
        }
        self.world = self.snapshots[index].clone();
        self.snapshots.truncate(index);
        Ok(())
    }

    fn begin_transaction(&mut self, _number: u32) -> Result<(), StateDbError> {
        self.check_open()?;
        self.world.transient.clear();
        self.world.accessed_addresses.clear();
        self.world.accessed_slots.clear();
        self.world.created_this_tx.clear();
        self.world.refund = 0;
        self.snapshots.clear();
        Ok(())
    }

    fn end_transaction(&mut self) -> Result<(), StateDbError> {
        self.check_open()?;
        self.committed = self.world.storage.clone();
        self.snapshots.clear();
        Ok(())
    }

    fn begin_block(&mut self, _number: u64) -> Result<(), StateDbError> {
        self.check_open()
    }

    fn end_block(&mut self) -> Result<(), StateDbError> {
        self.check_open()
    }

    fn begin_sync_period(&mut self, _number: u64) -> Result<(), StateDbError> {
        self.check_open()
    }

    fn end_sync_period(&mut self) -> Result<(), StateDbError> {
        self.check_open()
    }

    fn intermediate_root(&mut self, delete_empty: bool) -> Result<H256, StateDbError> {
        self.check_open()?;
        if delete_empty {
            self.prune_empty_accounts();
        }
        Ok(self.state_hash())
    }

    fn finalise(&mut self, delete_empty: bool) -> Result<(), StateDbError> {
        self.check_open()?;
        if delete_empty {
            self.prune_empty_accounts();
        }
        Ok(())
    }

    fn commit(&mut self, _block: u64, delete_empty: bool) -> Result<H256, StateDbError> {
        self.check_open()?;
        if delete_empty {
            self.prune_empty_accounts();
        }
        self.committed = self.world.storage.clone();
        self.snapshots.clear();
        Ok(self.state_hash())
    }

    fn get_hash(&mut self) -> Result<H256, StateDbError> {
        self.check_open()?;
        Ok(self.state_hash())
    }

    fn get_archive_block_height(&mut self) -> Result<Option<u64>, StateDbError> {
        self.check_open()?;
        Ok(None)
    }

    fn close(&mut self) -> Result<(), StateDbError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        let mut raw = [0u8; 20];
        raw[19] = n;
        Address::from(raw)
    }

    fn hash(n: u8) -> H256 {
        let mut raw = [0u8; 32];
        raw[31] = n;
        H256::from(raw)
    }

    fn open_db() -> (tempfile::TempDir, InMemoryDb) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = InMemoryDb::open(dir.path(), 250).expect("open");
        (dir, db)
    }

    #[test]
    fn balances_add_and_subtract() {
        let (_dir, mut db) = open_db();
        db.add_balance(addr(1), U256::from(100u64), BalanceChangeReason::Unspecified)
            .expect("add");
        db.sub_balance(addr(1), U256::from(40u64), BalanceChangeReason::GasBuy)
            .expect("sub");
        assert_eq!(db.get_balance(addr(1)).expect("get"), U256::from(60u64));

        let err = db
            .sub_balance(addr(1), U256::from(61u64), BalanceChangeReason::GasBuy)
            .expect_err("underflow");
        assert!(matches!(err, StateDbError::Backend(_)));
    }

    #[test]
    fn snapshot_and_revert_restore_state() {
        let (_dir, mut db) = open_db();
        db.set_state(addr(1), hash(1), hash(10)).expect("set");
        let snap = db.snapshot().expect("snapshot");
        db.set_state(addr(1), hash(1), hash(20)).expect("set");
        db.set_state(addr(1), hash(2), hash(30)).expect("set");

        db.revert_to_snapshot(snap).expect("revert");
        assert_eq!(db.get_state(addr(1), hash(1)).expect("get"), hash(10));
        assert_eq!(db.get_state(addr(1), hash(2)).expect("get"), H256::zero());

        assert!(matches!(
            db.revert_to_snapshot(snap),
            Err(StateDbError::UnknownSnapshot(_))
        ));
        assert!(matches!(
            db.revert_to_snapshot(-1),
            Err(StateDbError::UnknownSnapshot(-1))
        ));
    }

    #[test]
    fn transaction_begin_clears_transient_and_access_lists() {
        let (_dir, mut db) = open_db();
        db.set_transient_state(addr(1), hash(1), hash(5)).expect("set");
        db.add_slot_to_access_list(addr(1), hash(1)).expect("add");
        assert_eq!(
            db.slot_in_access_list(addr(1), hash(1)).expect("query"),
            (true, true)
        );

        db.begin_transaction(0).expect("begin");
        assert_eq!(
            db.get_transient_state(addr(1), hash(1)).expect("get"),
            H256::zero()
        );
        assert_eq!(
            db.slot_in_access_list(addr(1), hash(1)).expect("query"),
            (false, false)
        );
    }

    #[test]
    fn committed_state_lags_until_transaction_end() {
        let (_dir, mut db) = open_db();
        db.set_state(addr(1), hash(1), hash(9)).expect("set");
        assert_eq!(
            db.get_state_and_committed_state(addr(1), hash(1)).expect("get"),
            (hash(9), H256::zero())
        );
        db.end_transaction().expect("end");
        assert_eq!(
            db.get_committed_state(addr(1), hash(1)).expect("get"),
            hash(9)
        );
    }

    #[test]
    fn self_destruct_6780_only_affects_fresh_accounts() {
        let (_dir, mut db) = open_db();
        db.create_account(addr(1)).expect("create");
        db.begin_transaction(0).expect("begin");
        // addr(1) predates the transaction.
        db.self_destruct_6780(addr(1)).expect("6780");
        assert!(!db.has_self_destructed(addr(1)).expect("query"));

        db.create_account(addr(2)).expect("create");
        db.self_destruct_6780(addr(2)).expect("6780");
        assert!(db.has_self_destructed(addr(2)).expect("query"));
    }

    #[test]
    fn preimages_and_tx_context_are_retained() {
        let (_dir, mut db) = open_db();
        db.add_preimage(hash(9), Bytes::from_static(b"nine"))
            .expect("add");
        assert_eq!(
            db.preimage(hash(9)).map(|b| b.as_ref()),
            Some(b"nine".as_slice())
        );
        db.set_tx_context(hash(1), 3).expect("set");
        assert_eq!(db.tx_context(), Some((hash(1), 3)));
    }

    #[test]
    fn closed_database_rejects_operations() {
        let (_dir, mut db) = open_db();
        db.close().expect("close");
        assert!(matches!(db.get_refund(), Err(StateDbError::Closed)));
        // Close is idempotent.
        db.close().expect("close again");
    }

    #[test]
    fn state_hash_is_deterministic() {
        let (_dir, mut db) = open_db();
        let (_dir2, mut db2) = open_db();
        for db in [&mut db, &mut db2] {
            db.add_balance(addr(3), U256::from(7u64), BalanceChangeReason::Transfer)
                .expect("add");
            db.set_state(addr(3), hash(1), hash(2)).expect("set");
        }
        assert_eq!(db.get_hash().expect("hash"), db2.get_hash().expect("hash"));
    }
}
