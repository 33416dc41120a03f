use crate::core::errors::ClearNodeError;
use crate::core::kernel::codec::EnvelopeBuilder;
use crate::core::kernel::signer::MessageSigner;
use crate::core::types::RpcRequest;
use rand::Rng;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};

/// Random spread added to the millisecond clock when picking request ids
const REQUEST_ID_JITTER: u64 = 10_000;

pub fn timestamp_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// ClearNode RPC envelope codec
///
/// Requests are encoded as `{"req":[id, method, params, timestamp], "sig":[signature]}`
/// where the signature covers the compact JSON text of the `req` array.
#[derive(Debug, Default)]
pub struct ClearNodeCodec {
    last_id: AtomicU64,
}

impl ClearNodeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock-based id with random jitter, strictly increasing per codec instance
    pub fn next_request_id(&self) -> u64 {
        let candidate = timestamp_millis() + rand::thread_rng().gen_range(0..REQUEST_ID_JITTER);
        let previous = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        candidate.max(previous + 1)
    }
}

impl EnvelopeBuilder for ClearNodeCodec {
    fn build_envelope(
        &self,
        request: &RpcRequest,
        signer: &dyn MessageSigner,
    ) -> Result<String, ClearNodeError> {
        let req = json!([
            self.next_request_id(),
            request.method(),
            request.params(),
            timestamp_millis()
        ]);

        let payload = serde_json::to_string(&req)?;
        let signature = signer.sign(payload.as_bytes())?;

        Ok(json!({ "req": req, "sig": [signature] }).to_string())
    }
}
