//! Balance and nonce change reasons.
//!
//! Recorded traces carry the reason of every balance/nonce mutation. The
//! wire form is the snake_case name; some recorders emit the numeric code
//! instead, so parsing accepts both.

use strum::{Display, EnumString, FromRepr};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, FromRepr,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum BalanceChangeReason {
    Unspecified = 0,
    RewardMineUncle = 1,
    RewardMineBlock = 2,
    Withdrawal = 3,
    GenesisBalance = 4,
    RewardTransactionFee = 5,
    GasBuy = 6,
    GasReturn = 7,
    DaoContract = 8,
    DaoAccount = 9,
    Transfer = 10,
    TouchAccount = 11,
    SelfdestructRefund = 12,
    SelfdestructBurn = 13,
}

impl BalanceChangeReason {
    /// Parses the wire form: snake_case name or numeric code.
    pub fn parse(token: &str) -> Option<Self> {
        if let Ok(reason) = token.parse::<Self>() {
            return Some(reason);
        }
        token.parse::<u8>().ok().and_then(Self::from_repr)
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, FromRepr,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum NonceChangeReason {
    Unspecified = 0,
    Genesis = 1,
    EoaCall = 2,
    ContractCreator = 3,
    NewContract = 4,
    Authorization = 5,
}

impl NonceChangeReason {
    /// Parses the wire form: snake_case name or numeric code.
    pub fn parse(token: &str) -> Option<Self> {
        if let Ok(reason) = token.parse::<Self>() {
            return Some(reason);
        }
        token.parse::<u8>().ok().and_then(Self::from_repr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_reason_parses_names_and_codes() {
        assert_eq!(
            BalanceChangeReason::parse("gas_buy"),
            Some(BalanceChangeReason::GasBuy)
        );
        assert_eq!(
            BalanceChangeReason::parse("0"),
            Some(BalanceChangeReason::Unspecified)
        );
        assert_eq!(
            BalanceChangeReason::parse("13"),
            Some(BalanceChangeReason::SelfdestructBurn)
        );
        assert_eq!(BalanceChangeReason::parse("14"), None);
        assert_eq!(BalanceChangeReason::parse("no_such_reason"), None);
    }

    #[test]
    fn nonce_reason_parses_names_and_codes() {
        assert_eq!(
            NonceChangeReason::parse("contract_creator"),
            Some(NonceChangeReason::ContractCreator)
        );
        assert_eq!(NonceChangeReason::parse("2"), Some(NonceChangeReason::EoaCall));
        assert_eq!(NonceChangeReason::parse("-1"), None);
    }

    #[test]
    fn wire_form_round_trips() {
        let reason = BalanceChangeReason::RewardTransactionFee;
        assert_eq!(
            BalanceChangeReason::parse(&reason.to_string()),
            Some(reason)
        );
    }
}
