use super::codec::ClearNodeCodec;
use super::router::CorrelationRouter;
use crate::core::config::ClearNodeConfig;
use crate::core::errors::ClearNodeError;
use crate::core::kernel::codec::{request_id_of, EnvelopeBuilder};
use crate::core::kernel::signer::{EcdsaSigner, MessageSigner};
use crate::core::kernel::ws::{ConnectionState, TungsteniteWs, WsSession};
use crate::core::traits::ClearNodeRpc;
use crate::core::types::{RpcRequest, RpcResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Signed request client for a ClearNode
///
/// Each call connects if needed, builds a signed envelope, registers its id with the
/// [`CorrelationRouter`], sends it, and waits for the matching response, the request
/// timeout, or connection loss, whichever comes first.
pub struct ClearNodeClient<W: WsSession = TungsteniteWs> {
    session: W,
    router: CorrelationRouter,
    codec: Arc<dyn EnvelopeBuilder>,
    signer: Arc<dyn MessageSigner>,
    request_timeout: Duration,
}

impl ClearNodeClient<TungsteniteWs> {
    /// Create a client for the configured endpoint, signing with the configured key
    pub fn new(config: ClearNodeConfig) -> Result<Self, ClearNodeError> {
        let signer = EcdsaSigner::from_private_key(config.private_key())?;

        Ok(Self::with_session(
            TungsteniteWs::new(config.ws_url.clone()),
            Arc::new(signer),
            Arc::new(ClearNodeCodec::new()),
        )
        .with_request_timeout(config.request_timeout))
    }
}

impl<W: WsSession> ClearNodeClient<W> {
    /// Assemble a client from its parts
    pub fn with_session(
        session: W,
        signer: Arc<dyn MessageSigner>,
        codec: Arc<dyn EnvelopeBuilder>,
    ) -> Self {
        Self {
            session,
            router: CorrelationRouter::new(),
            codec,
            signer,
            request_timeout: crate::core::config::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the per-request response timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Ensure the session is open. Safe to call concurrently.
    pub async fn connect(&self) -> Result<(), ClearNodeError> {
        self.session.connect(Arc::new(self.router.clone())).await
    }

    /// Perform one signed round trip
    #[instrument(skip(self), fields(method = %request))]
    pub async fn send_request(&self, request: RpcRequest) -> Result<RpcResponse, ClearNodeError> {
        self.connect().await?;

        let envelope = self.codec.build_envelope(&request, self.signer.as_ref())?;
        let id = request_id_of(&envelope)?;
        let pending = self.router.register(id.clone(), self.request_timeout)?;

        debug!(id = %id, ">> {}", request);
        if let Err(e) = self.session.send_text(envelope).await {
            self.router.cancel(&id);
            return Err(e);
        }

        let response = pending.await?;
        debug!(id = %id, method = ?response.method, "<< response");
        Ok(response)
    }

    /// Close the session; in-flight requests fail with [`ClearNodeError::ConnectionClosed`]
    pub async fn close(&self) -> Result<(), ClearNodeError> {
        self.session.close().await
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn signer_address(&self) -> &str {
        self.signer.address()
    }

    /// Number of requests still waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.router.pending_count()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[async_trait]
impl<W: WsSession> ClearNodeRpc for ClearNodeClient<W> {
    async fn ping(&self) -> Result<RpcResponse, ClearNodeError> {
        self.send_request(RpcRequest::Ping).await
    }

    async fn get_config(&self) -> Result<RpcResponse, ClearNodeError> {
        self.send_request(RpcRequest::GetConfig).await
    }

    async fn get_assets(&self, chain_id: Option<u64>) -> Result<RpcResponse, ClearNodeError> {
        self.send_request(RpcRequest::GetAssets { chain_id }).await
    }
}
