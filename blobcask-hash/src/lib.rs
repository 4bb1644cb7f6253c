pub mod hash;

pub use hash::{fingerprint, ContentHash, Fingerprint};
