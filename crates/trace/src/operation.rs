//! In-memory representation of one recorded operation.

use ethereum_types::Address;

/// Names of operation kinds the rest of the pipeline matches on.
pub mod kind {
    pub const BEGIN_SYNC_PERIOD: &str = "BeginSyncPeriod";
    pub const END_SYNC_PERIOD: &str = "EndSyncPeriod";
    pub const BEGIN_BLOCK: &str = "BeginBlock";
    pub const END_BLOCK: &str = "EndBlock";
    pub const BEGIN_TRANSACTION: &str = "BeginTransaction";
    pub const END_TRANSACTION: &str = "EndTransaction";
    pub const SNAPSHOT: &str = "Snapshot";
    pub const REVERT_TO_SNAPSHOT: &str = "RevertToSnapshot";
    pub const BULK: &str = "Bulk";
}

/// Whether `k` is one of the six `Begin…`/`End…` kinds that delimit scopes.
pub fn is_structural(k: &str) -> bool {
    matches!(
        k,
        kind::BEGIN_SYNC_PERIOD
            | kind::END_SYNC_PERIOD
            | kind::BEGIN_BLOCK
            | kind::END_BLOCK
            | kind::BEGIN_TRANSACTION
            | kind::END_TRANSACTION
    )
}

/// One recorded state-database call.
///
/// `raw` preserves the original input line so that a trace loaded and written
/// back is byte-identical. `block` is stamped by the loader from the most
/// recent `BeginBlock`; `contract` is only the address carried directly in
/// the arguments. Address inheritance for `…Lc`-style kinds happens at
/// metadata-collection time, not here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub raw: String,
    pub kind: String,
    /// Only populated for `Bulk` operations.
    pub sub_kind: Option<String>,
    pub args: Vec<String>,
    pub block: Option<u64>,
    pub contract: Option<Address>,
}

#[derive(Debug, thiserror::Error)]
#[error("empty operation kind")]
pub struct EmptyKindError;

impl Operation {
    /// Parses a single trace line. Pure: never consults or produces block
    /// context. The line is split on `,` and every token trimmed; the first
    /// token is the kind and must be non-empty.
    pub fn from_line(line: &str) -> Result<Self, EmptyKindError> {
        let mut tokens = line.split(',').map(str::trim);
        let kind = tokens.next().unwrap_or_default();
        if kind.is_empty() {
            return Err(EmptyKindError);
        }
        let args: Vec<String> = tokens.map(str::to_string).collect();

        let sub_kind = if kind == kind::BULK {
            args.first().cloned()
        } else {
            None
        };
        // Bulk operations name their target in argument 1, everything else
        // in argument 0.
        let contract_token = if kind == kind::BULK {
            args.get(1)
        } else {
            args.first()
        };
        let contract = contract_token.and_then(|token| parse_address(token));

        Ok(Operation {
            raw: line.to_string(),
            kind: kind.to_string(),
            sub_kind,
            args,
            block: None,
            contract,
        })
    }
}

/// A token is an address iff it is exactly 42 characters long, starts with
/// `0x`, and the remaining 40 characters are hex digits. Anything else is
/// not an address; there is no guessing or padding here.
pub fn parse_address(token: &str) -> Option<Address> {
    let digits = token.strip_prefix("0x")?;
    if digits.len() != 40 {
        return None;
    }
    let mut raw = [0u8; 20];
    hex::decode_to_slice(digits, &mut raw).ok()?;
    Some(Address::from(raw))
}
