use crate::core::errors::ClearNodeError;
use crate::core::kernel::signer::MessageSigner;
use crate::core::types::{RequestId, RpcRequest};
use serde_json::Value;

/// Envelope construction capability
///
/// Implementations turn a named remote operation into a serialized, signed request
/// envelope. The envelope must embed a fresh correlation id as the first element of its
/// `req` array; responses echo that id as the first element of `res`.
pub trait EnvelopeBuilder: Send + Sync + 'static {
    /// Build the serialized envelope for `request`, signed by `signer`
    ///
    /// # Returns
    /// The envelope text exactly as it should go on the wire
    fn build_envelope(
        &self,
        request: &RpcRequest,
        signer: &dyn MessageSigner,
    ) -> Result<String, ClearNodeError>;
}

/// Read the correlation id out of a serialized request envelope
pub fn request_id_of(envelope: &str) -> Result<RequestId, ClearNodeError> {
    let value: Value = serde_json::from_str(envelope)
        .map_err(|e| ClearNodeError::InvalidEnvelope(format!("envelope is not JSON: {}", e)))?;

    value
        .get("req")
        .and_then(Value::as_array)
        .and_then(|req| req.first())
        .and_then(RequestId::from_value)
        .ok_or_else(|| ClearNodeError::InvalidEnvelope("missing request id in req[0]".to_string()))
}
