//! Centralized error handling for the transcoding gateway
//!
//! Every pipeline stage returns its specific error kind; the web layer maps
//! each kind to an HTTP status at the outermost boundary. Nothing in this
//! layer retries: a failed fetch, conversion, or cache write terminates the
//! request and the caller must re-request.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using TranscodeError
pub type TranscodeResult<T> = Result<T, TranscodeError>;
