//! Service layer for the transcoding gateway
//!
//! The services here are the pipeline's collaborators: per-key coordination
//! of in-flight requests, the global conversion permit pool, the ffprobe
//! dimension probe, and the ffmpeg conversion wrapper. All of them are
//! constructed once at startup and injected into the pipeline rather than
//! living as process globals.

pub mod converter;
pub mod coordinator;
pub mod limiter;
pub mod prober;

// Re-export commonly used types for convenience
pub use converter::{Converter, OutputFormat};
pub use coordinator::{KeyClaim, KeyCoordinator};
pub use limiter::ConversionLimiter;
pub use prober::{SourceProber, check_dimensions};
