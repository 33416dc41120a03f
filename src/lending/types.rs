use crate::core::errors::LendingError;
use num_bigint::BigUint;
use serde::{Serialize, Serializer};

/// Whole-unit token amount of arbitrary size
pub type Amount = BigUint;

/// Informational APR for every market, in basis points. No accrual is performed.
pub const DEFAULT_INTEREST_RATE_BPS: u32 = 500;

/// Serialize amounts as decimal strings so no consumer rounds them through f64
pub fn serialize_amount<S>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(amount)
}

/// Parse a decimal integer amount such as `"100"`. Signs, separators and fractions are rejected.
pub fn parse_amount(raw: &str) -> Result<Amount, LendingError> {
    let digits = raw.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LendingError::invalid_amount(raw));
    }
    digits
        .parse::<Amount>()
        .map_err(|_| LendingError::invalid_amount(raw))
}

/// Aggregates for one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    #[serde(serialize_with = "serialize_amount")]
    pub total_supply: Amount,
    #[serde(serialize_with = "serialize_amount")]
    pub total_borrow: Amount,
    #[serde(serialize_with = "serialize_amount")]
    pub reserves: Amount,
    pub interest_rate_bps: u32,
}

impl Market {
    pub fn new() -> Self {
        Self {
            total_supply: Amount::default(),
            total_borrow: Amount::default(),
            reserves: Amount::default(),
            interest_rate_bps: DEFAULT_INTEREST_RATE_BPS,
        }
    }
}

impl Default for Market {
    fn default() -> Self {
        Self::new()
    }
}

/// One user's position in one asset. `supplied >= borrowed` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UserPosition {
    #[serde(serialize_with = "serialize_amount")]
    pub supplied: Amount,
    #[serde(serialize_with = "serialize_amount")]
    pub borrowed: Amount,
}

impl UserPosition {
    pub fn new(supplied: impl Into<Amount>, borrowed: impl Into<Amount>) -> Self {
        Self {
            supplied: supplied.into(),
            borrowed: borrowed.into(),
        }
    }

    /// Supplied balance not backing any debt
    pub fn available(&self) -> Amount {
        if self.supplied > self.borrowed {
            &self.supplied - &self.borrowed
        } else {
            Amount::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    #[serde(flatten)]
    pub market: Market,
}

/// Point-in-time view of every market, ordered by symbol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LendingState {
    pub markets: Vec<MarketSnapshot>,
}

/// Outcome of a successful supply, borrow or redeem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LendingReceipt {
    pub user: String,
    pub symbol: String,
    pub position: UserPosition,
    pub market: Market,
}

/// Outcome of a repay; `repaid` may be less than the amount offered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepayReceipt {
    #[serde(serialize_with = "serialize_amount")]
    pub repaid: Amount,
    #[serde(flatten)]
    pub receipt: LendingReceipt,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("100").unwrap(), Amount::from(100u32));
        assert_eq!(parse_amount(" 42 ").unwrap(), Amount::from(42u32));
        assert_eq!(parse_amount("0").unwrap(), Amount::default());
        assert_eq!(
            parse_amount("340282366920938463463374607431768211456").unwrap(),
            Amount::from(u128::MAX) + 1u32
        );
        assert!(matches!(parse_amount("1.5"), Err(LendingError::InvalidAmount(_))));
        assert!(matches!(parse_amount("-5"), Err(LendingError::InvalidAmount(_))));
        assert!(matches!(parse_amount("+5"), Err(LendingError::InvalidAmount(_))));
        assert!(matches!(parse_amount("1_000"), Err(LendingError::InvalidAmount(_))));
        assert!(matches!(parse_amount("abc"), Err(LendingError::InvalidAmount(_))));
        assert!(matches!(parse_amount(""), Err(LendingError::InvalidAmount(_))));
    }

    #[test]
    fn test_amounts_serialize_as_strings() {
        let snapshot = MarketSnapshot {
            symbol: "USDC".to_string(),
            market: Market {
                total_supply: Amount::from(u128::MAX) * 10u32,
                total_borrow: Amount::from(5u32),
                reserves: Amount::default(),
                interest_rate_bps: DEFAULT_INTEREST_RATE_BPS,
            },
        };

        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({
                "symbol": "USDC",
                "totalSupply": "3402823669209384634633746074317682114550",
                "totalBorrow": "5",
                "reserves": "0",
                "interestRateBps": 500
            })
        );
    }

    #[test]
    fn test_available() {
        assert_eq!(UserPosition::new(100u32, 40u32).available(), Amount::from(60u32));
        assert_eq!(UserPosition::default().available(), Amount::default());
    }
}
