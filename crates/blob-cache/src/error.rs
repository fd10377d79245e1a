//! Error types for the blob cache.

/// Result type for blob cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while reading or writing cache entries.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key validation failed - the key would escape the cache directory
    #[error("Invalid cache key: {key:?} - {reason}")]
    InvalidKey { key: String, reason: String },
}
