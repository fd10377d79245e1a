//! Core blob store implementation.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{CacheError, Result};

/// Suffix for entries that are still being written.
const PARTIAL_SUFFIX: &str = ".partial";

/// Key/blob store rooted at a single directory.
///
/// The handle is cheap to clone; all clones share the same directory. Two
/// writers for *different* keys never contend. Overlap protection for the
/// *same* key is the caller's responsibility (the service coordinates this
/// per cache key before writing).
#[derive(Clone, Debug)]
pub struct BlobStore {
    base_dir: PathBuf,
}

impl BlobStore {
    /// Opens a store rooted at `base_dir`, creating the directory if needed.
    pub async fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    /// The directory this store writes under.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.base_dir.join(key))
    }

    /// Opens a writer for `key`, creating parent directories on demand.
    ///
    /// Data is streamed into a hidden partial file; the entry only becomes
    /// visible to [`BlobStore::get`] after [`BlobWriter::commit`]. A writer
    /// that is dropped or aborted removes its partial file instead.
    pub async fn put(&self, key: &str) -> Result<BlobWriter> {
        let final_path = self.entry_path(key)?;
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let partial_path = partial_path_for(&final_path);
        let file = File::create(&partial_path).await?;
        debug!("Writing cache entry {}", final_path.display());

        Ok(BlobWriter {
            file: Some(file),
            partial_path,
            final_path,
            committed: false,
        })
    }

    /// Copies the whole of `reader` into the entry for `key` and commits it.
    ///
    /// Returns the number of bytes written.
    pub async fn put_all<R>(&self, key: &str, reader: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut writer = self.put(key).await?;
        let bytes = tokio::io::copy(reader, &mut writer).await?;
        writer.commit().await?;
        Ok(bytes)
    }

    /// Opens the entry for `key` for reading.
    ///
    /// Returns `Ok(None)` when no committed entry exists - absence is the
    /// normal cache-miss branch, not a failure.
    pub async fn get(&self, key: &str) -> Result<Option<File>> {
        let path = self.entry_path(key)?;
        match File::open(&path).await {
            Ok(file) => Ok(Some(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Returns whether a committed entry exists for `key`.
    pub async fn contains(&self, key: &str) -> bool {
        match self.entry_path(key) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// Validates that a key stays inside the store directory.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey {
            key: key.to_string(),
            reason: "empty key".to_string(),
        });
    }

    for component in Path::new(key).components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(CacheError::InvalidKey {
                    key: key.to_string(),
                    reason: "key must be a relative path without traversal".to_string(),
                });
            }
        }
    }

    Ok(())
}

fn partial_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// In-progress cache entry returned by [`BlobStore::put`].
///
/// Implements [`AsyncWrite`]; call [`BlobWriter::commit`] after a fully
/// successful copy to make the entry visible. Dropping the writer without
/// committing discards the partial data.
#[derive(Debug)]
pub struct BlobWriter {
    file: Option<File>,
    partial_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl BlobWriter {
    /// Finalizes the entry: flushes, syncs, and renames it into place.
    pub async fn commit(mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        fs::rename(&self.partial_path, &self.final_path).await?;
        self.committed = true;
        debug!("Committed cache entry {}", self.final_path.display());
        Ok(())
    }

    /// Discards the partial entry.
    pub async fn abort(mut self) {
        self.file.take();
        let _ = fs::remove_file(&self.partial_path).await;
        self.committed = true;
    }
}

impl Drop for BlobWriter {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.partial_path);
        }
    }
}

impl AsyncWrite for BlobWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_write(cx, buf),
            None => Poll::Ready(Err(io::Error::other("blob writer already finalized"))),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn read_entry(store: &BlobStore, key: &str) -> Option<Vec<u8>> {
        let mut file = store.get(key).await.unwrap()?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).await.unwrap();
        Some(data)
    }

    #[tokio::test]
    async fn put_commit_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();

        let mut writer = store.put("abc123.mp4").await.unwrap();
        writer.write_all(b"video bytes").await.unwrap();
        writer.commit().await.unwrap();

        assert_eq!(
            read_entry(&store, "abc123.mp4").await.as_deref(),
            Some(b"video bytes".as_slice())
        );
    }

    #[tokio::test]
    async fn get_missing_entry_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();

        assert!(store.get("nothing.png").await.unwrap().is_none());
        assert!(!store.contains("nothing.png").await);
    }

    #[tokio::test]
    async fn uncommitted_writer_leaves_no_visible_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();

        let mut writer = store.put("partial.mp4").await.unwrap();
        writer.write_all(b"half a file").await.unwrap();
        drop(writer);

        assert!(store.get("partial.mp4").await.unwrap().is_none());
        // the partial file itself is gone too
        assert!(!dir.path().join("partial.mp4.partial").exists());
    }

    #[tokio::test]
    async fn abort_discards_partial_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();

        let mut writer = store.put("aborted.ogv").await.unwrap();
        writer.write_all(b"doomed").await.unwrap();
        writer.abort().await;

        assert!(store.get("aborted.ogv").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();

        let mut reader = &b"nested"[..];
        let bytes = store.put_all("a/b/c.png", &mut reader).await.unwrap();

        assert_eq!(bytes, 6);
        assert_eq!(
            read_entry(&store, "a/b/c.png").await.as_deref(),
            Some(b"nested".as_slice())
        );
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();

        for key in ["", "../escape.mp4", "/abs.mp4", "a/../../b.mp4"] {
            assert!(
                matches!(
                    store.put(key).await,
                    Err(CacheError::InvalidKey { .. })
                ),
                "key {key:?} should be rejected"
            );
        }
    }
}
