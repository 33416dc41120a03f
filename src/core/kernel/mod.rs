//! # Kernel
//!
//! Transport and signing building blocks shared by the ClearNode client.
//!
//! - [`ws`]: a single WebSocket session with explicit [`ConnectionState`], single-flight
//!   connect and inbound event delivery through [`WsEventHandler`]. The session knows
//!   nothing about request correlation.
//! - [`signer`]: the [`MessageSigner`] capability and its secp256k1 implementation,
//!   plus private key normalization.
//! - [`codec`]: the [`EnvelopeBuilder`] capability that turns a named operation into a
//!   signed wire envelope carrying a correlation id.
//!
//! ```rust,no_run
//! use clearlend::core::kernel::{EcdsaSigner, MessageSigner};
//!
//! # fn main() -> Result<(), clearlend::ClearNodeError> {
//! let signer = EcdsaSigner::from_private_key(
//!     "0x59c6995e998f97a5a0044966f094538b292f2f3c5a1e0769f0f4f2159f2c2aa1",
//! )?;
//! let signature = signer.sign(b"payload")?;
//! println!("{} signed {}", signer.address(), signature);
//! # Ok(())
//! # }
//! ```
pub mod codec;
pub mod signer;
pub mod ws;

pub use codec::{request_id_of, EnvelopeBuilder};
pub use signer::{keccak256, normalize_private_key, EcdsaSigner, MessageSigner};
pub use ws::{ConnectionState, TungsteniteWs, WsConfig, WsEventHandler, WsSession};
