//! Filesystem-backed key/blob store.
//!
//! Entries are addressed by relative string keys and are immutable once
//! written: a [`BlobStore::put`] streams data into a hidden partial file and
//! only renames it into place when the writer is committed, so a reader can
//! never observe a truncated entry. There is no eviction, TTL, or size
//! accounting; entries live until deleted out-of-band.

mod error;
mod store;

pub use error::{CacheError, Result};
pub use store::{BlobStore, BlobWriter};
