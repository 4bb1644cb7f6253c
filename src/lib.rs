//! Blobcask workspace root
//!
//! This crate serves as the root of the blobcask workspace and contains
//! integration tests that exercise the client against a scripted remote.

// Re-export member crates for integration testing
pub use blobcask_client as client;
pub use blobcask_hash as hash;
