use std::time::Duration;

/// Client configuration builder
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Ceiling on total cached blob bytes
    pub cache_size_limit: u64,

    /// Maximum payload accepted by store/store_file
    pub file_size_limit: u64,

    /// Placeholder content stored for non-regular directory entries
    pub not_a_file_sentinel: String,

    /// Placeholder content stored for entries that failed to read
    pub internal_error_sentinel: String,

    /// Bound on each remote request/response exchange
    pub request_timeout: Duration,

    /// Bound on persistent-index lock acquisition
    pub lock_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache_size_limit: 1 << 28, // 256 MiB
            file_size_limit: 1 << 24,  // 16 MiB
            not_a_file_sentinel: "NOT_A_FILE".to_string(),
            internal_error_sentinel: "INTERNAL_ERROR".to_string(),
            request_timeout: Duration::from_secs(30),
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cache size limit in bytes
    pub fn cache_size_limit(mut self, limit: u64) -> Self {
        self.cache_size_limit = limit;
        self
    }

    /// Set maximum accepted payload size in bytes
    pub fn file_size_limit(mut self, limit: u64) -> Self {
        self.file_size_limit = limit;
        self
    }

    /// Set sentinel content for non-regular directory entries
    pub fn not_a_file_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.not_a_file_sentinel = sentinel.into();
        self
    }

    /// Set sentinel content for unreadable directory entries
    pub fn internal_error_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.internal_error_sentinel = sentinel.into();
        self
    }

    /// Set remote request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set index lock-acquisition timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}
