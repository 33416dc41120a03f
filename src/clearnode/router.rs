use crate::core::errors::ClearNodeError;
use crate::core::kernel::ws::WsEventHandler;
use crate::core::types::{RequestId, RpcResponse};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type RpcResult = Result<RpcResponse, ClearNodeError>;
type PendingMap = Mutex<HashMap<RequestId, PendingEntry>>;

struct PendingEntry {
    completion: oneshot::Sender<RpcResult>,
    timer: JoinHandle<()>,
}

impl PendingEntry {
    fn resolve(self, result: RpcResult) {
        self.timer.abort();
        // The caller may have stopped waiting; nothing to do then
        let _ = self.completion.send(result);
    }
}

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<RequestId, PendingEntry>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Matches inbound response envelopes to in-flight requests by correlation id
///
/// Every registered id leaves the pending set through exactly one of: a matching
/// response, its timeout, [`CorrelationRouter::fail_all`], or [`CorrelationRouter::cancel`].
#[derive(Clone, Default)]
pub struct CorrelationRouter {
    pending: Arc<PendingMap>,
}

impl CorrelationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` and get a future resolving to its response.
    ///
    /// The entry expires after `timeout`, resolving with [`ClearNodeError::Timeout`].
    /// Must be called from within a tokio runtime.
    pub fn register(
        &self,
        id: RequestId,
        timeout: Duration,
    ) -> Result<PendingResponse, ClearNodeError> {
        let mut pending = lock(&self.pending);
        if pending.contains_key(&id) {
            return Err(ClearNodeError::DuplicateId(id));
        }

        let (completion, receiver) = oneshot::channel();
        let timer = tokio::spawn(expire(
            Arc::downgrade(&self.pending),
            id.clone(),
            timeout,
        ));
        pending.insert(id.clone(), PendingEntry { completion, timer });

        Ok(PendingResponse { id, receiver })
    }

    /// Route an inbound frame. Returns true when it resolved a pending request.
    ///
    /// Malformed frames, frames without a `res` id and unmatched ids are dropped.
    pub fn dispatch(&self, payload: &[u8]) -> bool {
        let Some(response) = RpcResponse::from_slice(payload) else {
            debug!(len = payload.len(), "Ignoring frame that is not a response envelope");
            return false;
        };

        let entry = lock(&self.pending).remove(&response.id);
        match entry {
            Some(entry) => {
                debug!(id = %response.id, method = ?response.method, "Response matched");
                entry.resolve(Ok(response));
                true
            }
            None => {
                debug!(id = %response.id, "Dropping response with no pending request");
                false
            }
        }
    }

    /// Fail every pending request with [`ClearNodeError::ConnectionClosed`] and clear the set.
    /// Returns how many requests were failed.
    pub fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<PendingEntry> = lock(&self.pending).drain().map(|(_, e)| e).collect();
        let count = drained.len();

        for entry in drained {
            entry.resolve(Err(ClearNodeError::ConnectionClosed(reason.to_string())));
        }

        if count > 0 {
            warn!(count, reason = %reason, "Failed in-flight requests on connection close");
        }
        count
    }

    /// Drop a pending entry without resolving it
    pub fn cancel(&self, id: &RequestId) -> bool {
        let entry = lock(&self.pending).remove(id);
        match entry {
            Some(entry) => {
                entry.timer.abort();
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_pending(&self, id: &RequestId) -> bool {
        lock(&self.pending).contains_key(id)
    }
}

async fn expire(pending: Weak<PendingMap>, id: RequestId, timeout: Duration) {
    tokio::time::sleep(timeout).await;

    let Some(pending) = pending.upgrade() else {
        return;
    };
    let entry = lock(&pending).remove(&id);
    if let Some(entry) = entry {
        warn!(id = %id, timeout_ms = timeout.as_millis() as u64, "RPC timeout");
        let _ = entry.completion.send(Err(ClearNodeError::Timeout {
            id,
            timeout_ms: timeout.as_millis() as u64,
        }));
    }
}

impl WsEventHandler for CorrelationRouter {
    fn on_message(&self, payload: &[u8]) {
        self.dispatch(payload);
    }

    fn on_close(&self, code: Option<u16>, reason: &str) {
        let reason = code.map_or_else(
            || format!("WebSocket closed: {}", reason),
            |code| format!("WebSocket closed ({}): {}", code, reason),
        );
        self.fail_all(&reason);
    }

    fn on_error(&self, error: &ClearNodeError) {
        debug!("Transport error reported to router: {}", error);
    }
}

/// Awaitable result of a registered request
pub struct PendingResponse {
    id: RequestId,
    receiver: oneshot::Receiver<RpcResult>,
}

impl PendingResponse {
    pub fn id(&self) -> &RequestId {
        &self.id
    }
}

impl Future for PendingResponse {
    type Output = RpcResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|result| {
            result.unwrap_or_else(|_| {
                Err(ClearNodeError::ConnectionClosed(
                    "request was cancelled".to_string(),
                ))
            })
        })
    }
}
