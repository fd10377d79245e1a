//! Error type definitions for the transcoding gateway
//!
//! This module defines the request-level error taxonomy. It uses `thiserror`
//! to provide automatic error trait implementations and proper error
//! chaining.

use thiserror::Error;

/// Top-level error type for a transcode request
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// Missing or invalid request parameters
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Signature missing or mismatched
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Source fetch failed or returned a failure status
    #[error("Upstream error for {url}: {message}")]
    Upstream { url: String, message: String },

    /// Byte budget or pixel dimensions exceeded
    #[error("Resource exceeded: {message}")]
    ResourceExceeded { message: String },

    /// External conversion tool failure
    #[error("Conversion failed: {message}")]
    Conversion { message: String },

    /// Cache storage failure
    #[error("Cache error: {0}")]
    Cache(#[from] blob_cache::CacheError),

    /// Filesystem or stream I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience methods for creating common error types
impl TranscodeError {
    /// Create a bad request error with a custom message
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create an upstream fetch error
    pub fn upstream<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Upstream {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a resource limit error
    pub fn resource_exceeded<S: Into<String>>(message: S) -> Self {
        Self::ResourceExceeded {
            message: message.into(),
        }
    }

    /// Create an external tool error
    pub fn conversion<S: Into<String>>(message: S) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }
}
