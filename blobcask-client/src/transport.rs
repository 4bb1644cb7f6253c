//! Remote channel seam: logical request/response operations against the
//! blob server, with a correlation-id exchange for channel-based wiring.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use blobcask_hash::{ContentHash, Fingerprint};

use crate::errors::TransportError;

/// Logical operations the remote blob store answers.
///
/// Wire framing is out of scope: implementations own how these calls
/// cross the network.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Ask whether content with this fingerprint is already stored.
    async fn resolve_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<ContentHash>, TransportError>;

    /// Upload a payload under a transient reference, receiving the hash
    /// the remote assigned to it.
    async fn upload(&self, reference: &str, payload: Bytes) -> Result<ContentHash, TransportError>;

    /// Ask the remote to recompute the fingerprint of stored content.
    async fn fingerprint_of(&self, hash: &ContentHash) -> Result<Fingerprint, TransportError>;

    /// Fetch blob bytes by content hash.
    async fn fetch_blob(&self, hash: &ContentHash) -> Result<Bytes, TransportError>;
}

/// Correlation id pairing a request with its single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum RemoteRequest {
    ResolveFingerprint(Fingerprint),
    Upload { reference: String, payload: Bytes },
    FingerprintOf(ContentHash),
    FetchBlob(ContentHash),
}

#[derive(Debug, Clone)]
pub enum RemoteResponse {
    Resolved(Option<ContentHash>),
    Uploaded(ContentHash),
    Fingerprinted(Fingerprint),
    Blob(Bytes),
    Denied(String),
}

pub type RequestEnvelope = (RequestId, RemoteRequest);
pub type ResponseEnvelope = (RequestId, RemoteResponse);

/// Request/response exchange over an envelope channel pair.
///
/// Each request gets a fresh correlation id and a oneshot slot; a pump
/// task routes inbound responses to their slot. Exactly one response
/// resolves each request. Responses with no registered id (late
/// arrivals after timeout, duplicates) are dropped. Waits are bounded
/// by `request_timeout`.
///
/// Whoever bridges the channel pair to a socket owns the wire encoding.
pub struct ChannelTransport {
    outbound: mpsc::Sender<RequestEnvelope>,
    slots: Arc<Mutex<HashMap<RequestId, oneshot::Sender<RemoteResponse>>>>,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl ChannelTransport {
    /// Wire up a transport over an outbound request queue and an
    /// inbound response stream, spawning the response pump.
    pub fn new(
        outbound: mpsc::Sender<RequestEnvelope>,
        mut inbound: mpsc::Receiver<ResponseEnvelope>,
        request_timeout: Duration,
    ) -> Arc<Self> {
        let transport = Arc::new(Self {
            outbound,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            request_timeout,
        });

        let slots = Arc::clone(&transport.slots);
        tokio::spawn(async move {
            while let Some((id, response)) = inbound.recv().await {
                let slot = slots.lock().unwrap().remove(&id);
                match slot {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => {
                        warn!(%id, "dropping response with no matching request");
                    }
                }
            }
            debug!("remote response channel closed");
        });

        transport
    }

    async fn exchange(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError> {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.slots.lock().unwrap().insert(id, tx);

        if self.outbound.send((id, request)).await.is_err() {
            self.slots.lock().unwrap().remove(&id);
            return Err(TransportError::Closed);
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(RemoteResponse::Denied(reason))) => Err(TransportError::Rejected(reason)),
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.slots.lock().unwrap().remove(&id);
                Err(TransportError::Timeout(self.request_timeout))
            }
        }
    }
}

fn unexpected(response: RemoteResponse) -> TransportError {
    TransportError::Rejected(format!("unexpected response: {:?}", response))
}

#[async_trait]
impl RemoteTransport for ChannelTransport {
    async fn resolve_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<ContentHash>, TransportError> {
        match self
            .exchange(RemoteRequest::ResolveFingerprint(fingerprint.clone()))
            .await?
        {
            RemoteResponse::Resolved(hit) => Ok(hit),
            other => Err(unexpected(other)),
        }
    }

    async fn upload(&self, reference: &str, payload: Bytes) -> Result<ContentHash, TransportError> {
        let request = RemoteRequest::Upload {
            reference: reference.to_string(),
            payload,
        };
        match self.exchange(request).await? {
            RemoteResponse::Uploaded(hash) => Ok(hash),
            other => Err(unexpected(other)),
        }
    }

    async fn fingerprint_of(&self, hash: &ContentHash) -> Result<Fingerprint, TransportError> {
        match self
            .exchange(RemoteRequest::FingerprintOf(hash.clone()))
            .await?
        {
            RemoteResponse::Fingerprinted(fingerprint) => Ok(fingerprint),
            other => Err(unexpected(other)),
        }
    }

    async fn fetch_blob(&self, hash: &ContentHash) -> Result<Bytes, TransportError> {
        match self.exchange(RemoteRequest::FetchBlob(hash.clone())).await? {
            RemoteResponse::Blob(blob) => Ok(blob),
            other => Err(unexpected(other)),
        }
    }
}
