use crate::core::types::RequestId;
use crate::lending::Amount;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClearNodeError {
    #[error("WebSocket not connected")]
    NotConnected,

    #[error("Request id already pending: {0}")]
    DuplicateId(RequestId),

    #[error("RPC timeout: request {id} got no response within {timeout_ms}ms")]
    Timeout { id: RequestId, timeout_ms: u64 },

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Invalid request envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Invalid private key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

impl ClearNodeError {
    /// True for failures caused by the connection going away rather than by the request itself
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ConnectionClosed(_) | Self::NetworkError(_)
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LendingError {
    #[error("amount must be positive: {0}")]
    InvalidAmount(String),

    #[error("insufficient collateral: available={available}, requested={requested}")]
    InsufficientCollateral { available: Amount, requested: Amount },

    #[error("insufficient available supplied balance: available={available}, requested={requested}")]
    InsufficientAvailableBalance { available: Amount, requested: Amount },
}

impl LendingError {
    #[cold]
    #[inline(never)]
    pub fn invalid_amount(amount: impl ToString) -> Self {
        Self::InvalidAmount(amount.to_string())
    }
}
