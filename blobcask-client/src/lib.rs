//! Client-side layer for a content-addressable blob store.
//!
//! Fingerprints payloads, deduplicates identical content locally and
//! across concurrent in-flight requests, keeps a bounded in-memory
//! cache of fetched blobs, and encodes directory trees into
//! content-addressed descriptions (and back).

pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod index;
pub mod pending;
pub mod transport;
pub mod tree;

pub use cache::{BlobCache, CacheStats};
pub use client::BlobClient;
pub use config::ClientConfig;
pub use errors::{ClientError, IndexError, Result, StoreFault, TransportError};
pub use index::{FingerprintIndex, IndexBackend, MemoryIndex};
pub use pending::{PendingStores, Registration, StoreGuard, StoreHandle, StoreOutcome};
pub use transport::{
    ChannelTransport, RemoteRequest, RemoteResponse, RemoteTransport, RequestEnvelope, RequestId,
    ResponseEnvelope,
};
pub use tree::DirTree;
