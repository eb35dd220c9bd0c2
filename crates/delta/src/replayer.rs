//! Replay engine: dispatches trace operations onto a state database.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use tokio_util::sync::CancellationToken;
use whittle_statedb::{BalanceChangeReason, NonceChangeReason, StateDb, StateDbError};
use whittle_trace::{Operation, kind, parse_address};

/// Kinds that only appear in compressed logger traces. Their address is
/// implicit in the preceding operation, which makes them unreplayable in
/// isolation, so the replayer refuses them outright.
const LOGGER_ONLY_KINDS: [&str; 12] = [
    "SetStateLcls",
    "SetTransientStateLcls",
    "GetTransientStateLccs",
    "GetTransientStateLc",
    "GetTransientStateLcls",
    "GetStateAndCommittedStateLcls",
    "GetStateLcls",
    "GetStateLccs",
    "GetStateLc",
    "GetCommittedStateLcls",
    "GetCodeHashLc",
    "GetCodeHashLcS",
];

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("operation {kind} is missing argument {index}")]
    MissingArgument { kind: String, index: usize },

    #[error("operation {kind}: cannot decode argument {index} {token:?}: {reason}")]
    ArgumentDecode {
        kind: String,
        index: usize,
        token: String,
        reason: String,
    },

    #[error("bulk operations are not supported")]
    BulkUnsupported,

    #[error("operation {0} is not supported in logger traces")]
    LoggerOnly(String),

    #[error("unsupported operation {0}")]
    Unsupported(String),

    #[error(transparent)]
    StateDb(#[from] StateDbError),

    #[error("replay cancelled")]
    Cancelled,
}

/// Drives a sequence of operations against a state database, in input
/// order. The only state carried between operations is the current block
/// number, which `Commit` consumes.
pub struct StateReplayer<'a> {
    db: &'a mut dyn StateDb,
    current_block: u64,
}

impl<'a> StateReplayer<'a> {
    pub fn new(db: &'a mut dyn StateDb) -> Self {
        Self {
            db,
            current_block: 0,
        }
    }

    /// Replays the sequence, checking the cancellation token at every
    /// operation boundary. Operations outside a block context are replayed
    /// as-is; partial traces are legitimate input.
    pub fn execute(
        &mut self,
        ctx: &CancellationToken,
        ops: &[Operation],
    ) -> Result<(), ReplayError> {
        for op in ops {
            if ctx.is_cancelled() {
                return Err(ReplayError::Cancelled);
            }
            self.dispatch(op)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, op: &Operation) -> Result<(), ReplayError> {
        match op.kind.as_str() {
            kind::BEGIN_BLOCK => {
                let number = arg_u64(op, 0)?;
                self.current_block = number;
                self.db.begin_block(number)?;
            }
            kind::END_BLOCK => self.db.end_block()?,
            kind::BEGIN_SYNC_PERIOD => self.db.begin_sync_period(arg_u64(op, 0)?)?,
            kind::END_SYNC_PERIOD => self.db.end_sync_period()?,
            kind::BEGIN_TRANSACTION => self.db.begin_transaction(arg_u32(op, 0)?)?,
            kind::END_TRANSACTION => self.db.end_transaction()?,

            "CreateAccount" => self.db.create_account(arg_address(op, 0)?)?,
            "CreateContract" => self.db.create_contract(arg_address(op, 0)?)?,
            "SelfDestruct" => self.db.self_destruct(arg_address(op, 0)?)?,
            "SelfDestruct6780" => self.db.self_destruct_6780(arg_address(op, 0)?)?,
            "HasSelfDestructed" => {
                self.db.has_self_destructed(arg_address(op, 0)?)?;
            }
            "Exist" => {
                self.db.exist(arg_address(op, 0)?)?;
            }
            "Empty" => {
                self.db.empty(arg_address(op, 0)?)?;
            }
            "GetBalance" => {
                self.db.get_balance(arg_address(op, 0)?)?;
            }
            "GetNonce" => {
                self.db.get_nonce(arg_address(op, 0)?)?;
            }
            "GetCode" => {
                self.db.get_code(arg_address(op, 0)?)?;
            }
            "GetCodeSize" => {
                self.db.get_code_size(arg_address(op, 0)?)?;
            }
            "GetCodeHash" => {
                self.db.get_code_hash(arg_address(op, 0)?)?;
            }
            "GetStorageRoot" => {
                self.db.get_storage_root(arg_address(op, 0)?)?;
            }
            "AddAddressToAccessList" => self.db.add_address_to_access_list(arg_address(op, 0)?)?,
            "AddressInAccessList" => {
                self.db.address_in_access_list(arg_address(op, 0)?)?;
            }

            "SetNonce" => {
                let address = arg_address(op, 0)?;
                let nonce = arg_u64(op, 1)?;
                let reason = arg_nonce_reason(op, 2)?;
                self.db.set_nonce(address, nonce, reason)?;
            }
            // Arguments 2 and 4 are recorded but carry nothing the replay
            // needs; they are skipped on purpose.
            "AddBalance" => {
                let address = arg_address(op, 0)?;
                let amount = arg_u256(op, 1)?;
                let reason = arg_balance_reason(op, 3)?;
                self.db.add_balance(address, amount, reason)?;
            }
            "SubBalance" => {
                let address = arg_address(op, 0)?;
                let amount = arg_u256(op, 1)?;
                let reason = arg_balance_reason(op, 3)?;
                self.db.sub_balance(address, amount, reason)?;
            }
            "SetCode" => {
                let address = arg_address(op, 0)?;
                let code = arg_bytes(op, 1)?;
                self.db.set_code(address, code)?;
            }

            "GetState" => {
                self.db.get_state(arg_address(op, 0)?, arg_hash(op, 1)?)?;
            }
            "GetCommittedState" => {
                self.db
                    .get_committed_state(arg_address(op, 0)?, arg_hash(op, 1)?)?;
            }
            "GetStateAndCommittedState" => {
                self.db
                    .get_state_and_committed_state(arg_address(op, 0)?, arg_hash(op, 1)?)?;
            }
            "GetTransientState" => {
                self.db
                    .get_transient_state(arg_address(op, 0)?, arg_hash(op, 1)?)?;
            }
            "SetState" => {
                self.db
                    .set_state(arg_address(op, 0)?, arg_hash(op, 1)?, arg_hash(op, 2)?)?;
            }
            "SetTransientState" => {
                self.db.set_transient_state(
                    arg_address(op, 0)?,
                    arg_hash(op, 1)?,
                    arg_hash(op, 2)?,
                )?;
            }
            "AddSlotToAccessList" => {
                self.db
                    .add_slot_to_access_list(arg_address(op, 0)?, arg_hash(op, 1)?)?;
            }
            "SlotInAccessList" => {
                self.db
                    .slot_in_access_list(arg_address(op, 0)?, arg_hash(op, 1)?)?;
            }

            "AddRefund" => self.db.add_refund(arg_u64(op, 0)?)?,
            "SubRefund" => self.db.sub_refund(arg_u64(op, 0)?)?,
            "GetRefund" => {
                self.db.get_refund()?;
            }

            "SetTxContext" => {
                self.db.set_tx_context(arg_hash(op, 0)?, arg_i64(op, 1)?)?;
            }
            "GetLogs" => {
                self.db.get_logs(
                    arg_hash(op, 0)?,
                    arg_u64(op, 1)?,
                    arg_hash(op, 2)?,
                    arg_u64(op, 3)?,
                )?;
            }
            "AddPreimage" => {
                self.db.add_preimage(arg_hash(op, 0)?, arg_bytes(op, 1)?)?;
            }

            // The recorded snapshot id is ignored: each replay produces its
            // own ids, and a fresh backend reproduces the recorded sequence.
            kind::SNAPSHOT => {
                self.db.snapshot()?;
            }
            kind::REVERT_TO_SNAPSHOT => self.db.revert_to_snapshot(arg_i64(op, 0)?)?,

            "IntermediateRoot" => {
                self.db.intermediate_root(arg_bool(op, 0)?)?;
            }
            "Finalise" => self.db.finalise(arg_bool(op, 0)?)?,
            "GetHash" => {
                self.db.get_hash()?;
            }
            "GetArchiveBlockHeight" => {
                self.db.get_archive_block_height()?;
            }
            "Commit" => {
                self.db.commit(self.current_block, arg_bool(op, 0)?)?;
            }

            // Declared no-ops: recorded for completeness but with no
            // replayable backend counterpart.
            "AddLog" | "Prepare" | "PrepareSubstate" | "Close" | "Error" | "Release"
            | "AccessEvents" | "PointCache" | "Witness" | "GetSubstatePostAlloc" => {}

            kind::BULK => return Err(ReplayError::BulkUnsupported),
            k if LOGGER_ONLY_KINDS.contains(&k) => {
                return Err(ReplayError::LoggerOnly(k.to_string()));
            }
            other => return Err(ReplayError::Unsupported(other.to_string())),
        }
        Ok(())
    }
}

fn arg<'a>(op: &'a Operation, index: usize) -> Result<&'a str, ReplayError> {
    op.args
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| ReplayError::MissingArgument {
            kind: op.kind.clone(),
            index,
        })
}

fn decode_error(
    op: &Operation,
    index: usize,
    token: &str,
    reason: impl Into<String>,
) -> ReplayError {
    ReplayError::ArgumentDecode {
        kind: op.kind.clone(),
        index,
        token: token.to_string(),
        reason: reason.into(),
    }
}

fn arg_address(op: &Operation, index: usize) -> Result<Address, ReplayError> {
    let token = arg(op, index)?;
    parse_address(token).ok_or_else(|| decode_error(op, index, token, "not a 20-byte address"))
}

/// Hash tokens are hex with an optional `0x` prefix and may be shorter than
/// 64 digits; they are left-padded to 32 bytes.
fn arg_hash(op: &Operation, index: usize) -> Result<H256, ReplayError> {
    let token = arg(op, index)?;
    let digits = token.strip_prefix("0x").unwrap_or(token);
    if digits.len() > 64 {
        return Err(decode_error(op, index, token, "hash longer than 32 bytes"));
    }
    let padded = format!("{digits:0>64}");
    let mut raw = [0u8; 32];
    hex::decode_to_slice(&padded, &mut raw)
        .map_err(|_| decode_error(op, index, token, "invalid hex digits"))?;
    Ok(H256::from(raw))
}

fn arg_u64(op: &Operation, index: usize) -> Result<u64, ReplayError> {
    let token = arg(op, index)?;
    let parsed = match token.strip_prefix("0x") {
        Some(digits) => u64::from_str_radix(digits, 16),
        None => token.parse(),
    };
    parsed.map_err(|_| decode_error(op, index, token, "invalid unsigned integer"))
}

fn arg_u32(op: &Operation, index: usize) -> Result<u32, ReplayError> {
    let token = arg(op, index)?;
    let parsed = match token.strip_prefix("0x") {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => token.parse(),
    };
    parsed.map_err(|_| decode_error(op, index, token, "invalid unsigned integer"))
}

fn arg_i64(op: &Operation, index: usize) -> Result<i64, ReplayError> {
    let token = arg(op, index)?;
    let parsed = match token.strip_prefix("0x") {
        Some(digits) => i64::from_str_radix(digits, 16),
        None => token.parse(),
    };
    parsed.map_err(|_| decode_error(op, index, token, "invalid integer"))
}

fn arg_u256(op: &Operation, index: usize) -> Result<U256, ReplayError> {
    let token = arg(op, index)?;
    if token.starts_with('-') {
        return Err(decode_error(op, index, token, "negative value"));
    }
    if let Some(digits) = token.strip_prefix("0x") {
        if digits.len() > 64 {
            return Err(decode_error(op, index, token, "value exceeds 256 bits"));
        }
        U256::from_str_radix(digits, 16)
            .map_err(|_| decode_error(op, index, token, "invalid hex integer"))
    } else {
        U256::from_dec_str(token)
            .map_err(|_| decode_error(op, index, token, "invalid 256-bit decimal integer"))
    }
}

/// Byte payloads are either `0x…` hex or a `[b0, b1, …]` decimal array.
/// The array form spans multiple comma-split tokens, so it is re-joined
/// from `index` up to the token carrying the closing bracket.
fn arg_bytes(op: &Operation, index: usize) -> Result<Bytes, ReplayError> {
    let first = arg(op, index)?;
    if let Some(digits) = first.strip_prefix("0x") {
        let raw = hex::decode(digits)
            .map_err(|_| decode_error(op, index, first, "invalid hex bytes"))?;
        return Ok(Bytes::from(raw));
    }
    if !first.starts_with('[') {
        return Err(decode_error(op, index, first, "expected 0x hex or [..] bytes"));
    }
    let Some(last) = (index..op.args.len()).find(|&i| op.args[i].ends_with(']')) else {
        return Err(decode_error(op, index, first, "unterminated byte array"));
    };
    let joined = op.args[index..=last].join(",");
    let inner = &joined[1..joined.len() - 1];
    let mut raw = Vec::new();
    if !inner.trim().is_empty() {
        for part in inner.split(',') {
            let byte: u8 = part
                .trim()
                .parse()
                .map_err(|_| decode_error(op, index, part.trim(), "invalid byte value"))?;
            raw.push(byte);
        }
    }
    Ok(Bytes::from(raw))
}

fn arg_bool(op: &Operation, index: usize) -> Result<bool, ReplayError> {
    let token = arg(op, index)?;
    match token {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(decode_error(op, index, token, "expected true or false")),
    }
}

fn arg_balance_reason(op: &Operation, index: usize) -> Result<BalanceChangeReason, ReplayError> {
    let token = arg(op, index)?;
    BalanceChangeReason::parse(token)
        .ok_or_else(|| decode_error(op, index, token, "unknown balance change reason"))
}

fn arg_nonce_reason(op: &Operation, index: usize) -> Result<NonceChangeReason, ReplayError> {
    let token = arg(op, index)?;
    NonceChangeReason::parse(token)
        .ok_or_else(|| decode_error(op, index, token, "unknown nonce change reason"))
}
