pub mod client;
pub mod codec;
pub mod router;

// Re-export main types for easier importing
pub use client::ClearNodeClient;
pub use codec::ClearNodeCodec;
pub use router::{CorrelationRouter, PendingResponse};
