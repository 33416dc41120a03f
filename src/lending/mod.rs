pub mod service;
pub mod types;

pub use service::{LendingService, SharedLendingService};
pub use types::{
    parse_amount, Amount, LendingReceipt, LendingState, Market, MarketSnapshot, RepayReceipt,
    UserPosition, DEFAULT_INTEREST_RATE_BPS,
};
