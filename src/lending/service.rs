use super::types::{
    Amount, LendingReceipt, LendingState, Market, MarketSnapshot, RepayReceipt, UserPosition,
};
use crate::core::errors::LendingError;
use num_traits::Zero;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Ledger shared between concurrent tasks; one writer at a time
pub type SharedLendingService = Arc<Mutex<LendingService>>;

/// In-memory collateralized lending ledger
///
/// Markets and positions are created on first use. Every operation validates before
/// mutating and updates the position and its market together, so per symbol the sum
/// of positions always equals the market aggregates.
#[derive(Debug, Default)]
pub struct LendingService {
    markets: BTreeMap<String, Market>,
    // user -> symbol -> position
    positions: HashMap<String, BTreeMap<String, UserPosition>>,
}

fn ensure_positive(amount: impl Into<Amount>) -> Result<Amount, LendingError> {
    let amount = amount.into();
    if amount.is_zero() {
        return Err(LendingError::invalid_amount(amount));
    }
    Ok(amount)
}

impl LendingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedLendingService {
        Arc::new(Mutex::new(self))
    }

    fn entry(&mut self, user: &str, symbol: &str) -> (&mut UserPosition, &mut Market) {
        let market = self.markets.entry(symbol.to_string()).or_default();
        let position = self
            .positions
            .entry(user.to_string())
            .or_default()
            .entry(symbol.to_string())
            .or_default();
        (position, market)
    }

    /// Deposit `amount` of `symbol` as collateral. Succeeds for any positive amount.
    pub fn supply(
        &mut self,
        user: &str,
        symbol: &str,
        amount: impl Into<Amount>,
    ) -> Result<LendingReceipt, LendingError> {
        let amount = ensure_positive(amount)?;
        let (position, market) = self.entry(user, symbol);

        position.supplied += &amount;
        market.total_supply += &amount;

        info!(user = %user, symbol = %symbol, amount = %amount, "supply");
        Ok(receipt(user, symbol, position, market))
    }

    /// Borrow `amount` of `symbol` against 1:1 collateral in the same asset.
    ///
    /// The request must fit in the supplied balance not already backing debt, so
    /// `supplied >= borrowed` still holds afterwards.
    pub fn borrow(
        &mut self,
        user: &str,
        symbol: &str,
        amount: impl Into<Amount>,
    ) -> Result<LendingReceipt, LendingError> {
        let amount = ensure_positive(amount)?;
        let (position, market) = self.entry(user, symbol);

        let available = position.available();
        if amount > available {
            debug!(user = %user, symbol = %symbol, amount = %amount, available = %available, "borrow rejected: insufficient collateral");
            return Err(LendingError::InsufficientCollateral {
                available,
                requested: amount,
            });
        }

        position.borrowed += &amount;
        market.total_borrow += &amount;

        info!(user = %user, symbol = %symbol, amount = %amount, "borrow");
        Ok(receipt(user, symbol, position, market))
    }

    /// Repay up to `amount` of debt. Any excess over the outstanding debt is ignored.
    pub fn repay(
        &mut self,
        user: &str,
        symbol: &str,
        amount: impl Into<Amount>,
    ) -> Result<RepayReceipt, LendingError> {
        let amount = ensure_positive(amount)?;
        let (position, market) = self.entry(user, symbol);

        let repaid = amount.clone().min(position.borrowed.clone());
        position.borrowed -= &repaid;
        market.total_borrow -= &repaid;

        info!(user = %user, symbol = %symbol, requested = %amount, repaid = %repaid, "repay");
        Ok(RepayReceipt {
            repaid,
            receipt: receipt(user, symbol, position, market),
        })
    }

    /// Withdraw `amount` of supplied collateral not backing any debt
    pub fn redeem(
        &mut self,
        user: &str,
        symbol: &str,
        amount: impl Into<Amount>,
    ) -> Result<LendingReceipt, LendingError> {
        let amount = ensure_positive(amount)?;
        let (position, market) = self.entry(user, symbol);

        let available = position.available();
        if amount > available {
            debug!(user = %user, symbol = %symbol, amount = %amount, available = %available, "redeem rejected");
            return Err(LendingError::InsufficientAvailableBalance {
                available,
                requested: amount,
            });
        }

        position.supplied -= &amount;
        market.total_supply -= &amount;

        info!(user = %user, symbol = %symbol, amount = %amount, "redeem");
        Ok(receipt(user, symbol, position, market))
    }

    /// Snapshot of all markets, ordered by symbol
    pub fn state(&self) -> LendingState {
        LendingState {
            markets: self
                .markets
                .iter()
                .map(|(symbol, market)| MarketSnapshot {
                    symbol: symbol.clone(),
                    market: market.clone(),
                })
                .collect(),
        }
    }

    pub fn market(&self, symbol: &str) -> Option<&Market> {
        self.markets.get(symbol)
    }

    /// Position of `user` in `symbol`; `(0, 0)` if never touched
    pub fn position(&self, user: &str, symbol: &str) -> UserPosition {
        self.positions
            .get(user)
            .and_then(|positions| positions.get(symbol))
            .cloned()
            .unwrap_or_default()
    }

    /// All positions held in `symbol`
    pub fn positions_for_symbol<'a>(
        &'a self,
        symbol: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a UserPosition)> + 'a {
        self.positions.iter().filter_map(move |(user, positions)| {
            positions
                .get(symbol)
                .map(|position| (user.as_str(), position))
        })
    }
}

fn receipt(user: &str, symbol: &str, position: &UserPosition, market: &Market) -> LendingReceipt {
    LendingReceipt {
        user: user.to_string(),
        symbol: symbol.to_string(),
        position: position.clone(),
        market: market.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(n: u64) -> Amount {
        Amount::from(n)
    }

    #[test]
    fn test_markets_created_lazily() {
        let mut lending = LendingService::new();
        assert!(lending.market("ETH").is_none());

        lending.supply("bob", "ETH", 3u64).unwrap();
        let market = lending.market("ETH").unwrap();
        assert_eq!(market.total_supply, units(3));
        assert!(market.reserves.is_zero());
        assert_eq!(market.interest_rate_bps, 500);
    }

    #[test]
    fn test_zero_amount_rejected_everywhere() {
        let mut lending = LendingService::new();
        assert!(matches!(lending.supply("a", "X", 0u64), Err(LendingError::InvalidAmount(_))));
        assert!(matches!(lending.borrow("a", "X", 0u64), Err(LendingError::InvalidAmount(_))));
        assert!(matches!(lending.repay("a", "X", 0u64), Err(LendingError::InvalidAmount(_))));
        assert!(matches!(lending.redeem("a", "X", 0u64), Err(LendingError::InvalidAmount(_))));
        assert!(lending.state().markets.is_empty());
    }

    #[test]
    fn test_borrow_limited_to_unencumbered_supply() {
        let mut lending = LendingService::new();
        lending.supply("carol", "DAI", 100u64).unwrap();
        lending.borrow("carol", "DAI", 60u64).unwrap();
        assert_eq!(
            lending.borrow("carol", "DAI", 60u64),
            Err(LendingError::InsufficientCollateral {
                available: units(40),
                requested: units(60),
            })
        );
        lending.borrow("carol", "DAI", 40u64).unwrap();
        assert_eq!(lending.position("carol", "DAI"), UserPosition::new(100u64, 100u64));
        assert_eq!(lending.market("DAI").unwrap().total_borrow, units(100));
        assert_eq!(
            lending.redeem("carol", "DAI", 1u64),
            Err(LendingError::InsufficientAvailableBalance {
                available: units(0),
                requested: units(1),
            })
        );
    }

    #[test]
    fn test_failed_borrow_leaves_state_untouched() {
        let mut lending = LendingService::new();
        lending.supply("dave", "WBTC", 5u64).unwrap();
        let before = lending.state();
        assert!(lending.borrow("dave", "WBTC", 6u64).is_err());
        assert_eq!(lending.state(), before);
        assert_eq!(lending.position("dave", "WBTC"), UserPosition::new(5u64, 0u64));
    }

    #[test]
    fn test_supply_beyond_machine_integers() {
        let mut lending = LendingService::new();
        lending.supply("a", "BIG", u128::MAX).unwrap();
        lending.supply("a", "BIG", u128::MAX).unwrap();
        lending.supply("b", "BIG", 1u64).unwrap();

        let doubled = Amount::from(u128::MAX) * 2u32;
        assert_eq!(lending.position("a", "BIG").supplied, doubled);
        assert_eq!(lending.market("BIG").unwrap().total_supply, doubled + 1u32);

        lending.borrow("a", "BIG", u128::MAX).unwrap();
        assert_eq!(lending.position("a", "BIG").available(), Amount::from(u128::MAX));
    }

    #[test]
    fn test_state_is_sorted_by_symbol() {
        let mut lending = LendingService::new();
        lending.supply("a", "WETH", 1u64).unwrap();
        lending.supply("a", "USDC", 1u64).unwrap();
        lending.supply("a", "DAI", 1u64).unwrap();
        let symbols: Vec<_> = lending
            .state()
            .markets
            .into_iter()
            .map(|m| m.symbol)
            .collect();
        assert_eq!(symbols, vec!["DAI", "USDC", "WETH"]);
    }

    #[test]
    fn test_position_read_does_not_create() {
        let lending = LendingService::new();
        assert_eq!(lending.position("nobody", "USDC"), UserPosition::default());
        assert_eq!(lending.positions_for_symbol("USDC").count(), 0);
    }
}
