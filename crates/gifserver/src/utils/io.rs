//! Stream wrappers used by the conversion pipeline.
//!
//! [`BudgetReader`] enforces the source byte budget while the body is being
//! spooled to disk. [`ResilientWriter`] protects the cache side of the dual
//! write: once the client connection fails, further writes to it become
//! no-ops instead of aborting the whole copy.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::warn;

/// `AsyncRead` wrapper that fails once cumulative bytes exceed a ceiling.
///
/// A ceiling of zero means no limit. Errors from the underlying stream
/// propagate untouched; the budget violation itself surfaces as an
/// [`io::ErrorKind::FileTooLarge`] error so callers can map it to their own
/// resource-limit error kind.
#[derive(Debug)]
pub struct BudgetReader<R> {
    inner: R,
    max_bytes: u64,
    bytes_read: u64,
}

impl<R> BudgetReader<R> {
    pub fn new(inner: R, max_bytes: u64) -> Self {
        Self {
            inner,
            max_bytes,
            bytes_read: 0,
        }
    }

    /// Total bytes successfully read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for BudgetReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;

        this.bytes_read += (buf.filled().len() - before) as u64;
        if this.max_bytes > 0 && this.bytes_read > this.max_bytes {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::FileTooLarge,
                format!("source is too large (> {} bytes)", this.max_bytes),
            )));
        }

        Poll::Ready(Ok(()))
    }
}

/// `AsyncWrite` wrapper that absorbs every failure after the first.
///
/// The first failed write/flush/shutdown is remembered; from then on each
/// call reports full success without touching the inner writer. Callers
/// must not rely on this sink to detect downstream failures beyond the
/// first.
#[derive(Debug)]
pub struct ResilientWriter<W> {
    inner: W,
    failed: bool,
}

impl<W> ResilientWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            failed: false,
        }
    }

    /// Whether the inner writer has failed and writes are being absorbed.
    pub fn has_failed(&self) -> bool {
        self.failed
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for ResilientWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(Ok(buf.len()));
        }

        match ready!(Pin::new(&mut this.inner).poll_write(cx, buf)) {
            Ok(written) => Poll::Ready(Ok(written)),
            Err(err) => {
                warn!("Client write failed, continuing without it: {err}");
                this.failed = true;
                Poll::Ready(Ok(buf.len()))
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(Ok(()));
        }

        match ready!(Pin::new(&mut this.inner).poll_flush(cx)) {
            Ok(()) => Poll::Ready(Ok(())),
            Err(_) => {
                this.failed = true;
                Poll::Ready(Ok(()))
            }
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(Ok(()));
        }

        match ready!(Pin::new(&mut this.inner).poll_shutdown(cx)) {
            Ok(()) => Poll::Ready(Ok(())),
            Err(_) => {
                this.failed = true;
                Poll::Ready(Ok(()))
            }
        }
    }
}
