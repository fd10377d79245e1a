//! The conversion pipeline.
//!
//! Turns one inbound request into at most one conversion execution:
//! signature gate, parameter resolution, per-key claim, cache-aside lookup,
//! source fetch with byte and dimension guards, permit-bounded ffmpeg
//! invocation, and a dual write that feeds the client and the cache from a
//! single pass over the converter output.

use std::io;
use std::path::Path;

use blob_cache::{BlobStore, BlobWriter};
use futures::TryStreamExt;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
use tokio_util::io::StreamReader;
use tracing::{debug, error, info};
use url::Url;

use crate::config::Config;
use crate::errors::{TranscodeError, TranscodeResult};
use crate::services::converter::{Converter, OutputFormat};
use crate::services::coordinator::{KeyClaim, KeyCoordinator};
use crate::services::limiter::ConversionLimiter;
use crate::services::prober::{SourceProber, check_dimensions};
use crate::signature::verify_signature;
use crate::utils::io::{BudgetReader, ResilientWriter};
use crate::utils::url::normalize_source_url;

/// Buffer size of the in-process pipe feeding the client response body.
const CLIENT_PIPE_BUFFER: usize = 64 * 1024;
/// Chunk size of the dual-write copy pass.
const COPY_CHUNK: usize = 64 * 1024;

/// Deterministic cache key for a (source url, output format) pair.
///
/// The key doubles as the entry's relative path in the cache and as the
/// coordination lock name.
pub fn cache_key(url: &str, format: OutputFormat) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("{}.{}", hex::encode(digest), format.extension())
}

/// Per-request parameters handed over by the web layer.
#[derive(Debug, Clone, Default)]
pub struct TranscodeRequest {
    pub url: Option<String>,
    pub format: Option<String>,
    /// Decoded `sig` parameter, if present
    pub sig: Option<String>,
    /// `Accept` header, used for format inference
    pub accept: Option<String>,
    /// Request path, part of the signed text
    pub path: String,
    /// Undecoded query string as sent on the wire
    pub raw_query: String,
}

/// Successful pipeline outcome: a content type and the payload stream.
pub struct TranscodeReply {
    pub content_type: &'static str,
    pub body: Box<dyn AsyncRead + Send + Unpin>,
}

impl std::fmt::Debug for TranscodeReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodeReply")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Request coordinator and executor, constructed once at startup and shared
/// by all request handlers.
pub struct TranscodePipeline {
    secret: String,
    default_format: OutputFormat,
    max_bytes: u64,
    max_width: u32,
    max_height: u32,
    store: BlobStore,
    coordinator: KeyCoordinator,
    limiter: ConversionLimiter,
    client: reqwest::Client,
    prober: SourceProber,
    converter: Converter,
}

impl TranscodePipeline {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let default_format = OutputFormat::parse(&config.convert.default_format)
            .map_err(|err| anyhow::anyhow!("Bad default_format in config: {err}"))?;
        let store = BlobStore::open(&config.cache.dir).await?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("gifserver/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            secret: config.server.secret,
            default_format,
            max_bytes: config.limits.max_bytes,
            max_width: config.limits.max_width,
            max_height: config.limits.max_height,
            store,
            coordinator: KeyCoordinator::new(),
            limiter: ConversionLimiter::new(config.limits.max_concurrency),
            client,
            prober: SourceProber::new(config.convert.ffprobe_command),
            converter: Converter::new(config.convert.ffmpeg_command),
        })
    }

    /// Startup check for the external conversion tool.
    pub async fn converter_available(&self) -> bool {
        self.converter.is_available().await
    }

    /// Drives a request through the full state sequence.
    pub async fn handle(&self, request: TranscodeRequest) -> TranscodeResult<TranscodeReply> {
        verify_signature(
            &self.secret,
            &request.path,
            &request.raw_query,
            request.sig.as_deref(),
        )?;

        let raw_url = request
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| TranscodeError::bad_request("Missing param: url"))?;
        let source_url = normalize_source_url(raw_url);
        Url::parse(&source_url)
            .map_err(|err| TranscodeError::bad_request(format!("Invalid url: {err}")))?;

        let format = self.resolve_format(&request)?;
        let key = cache_key(&source_url, format);

        let claim = self.coordinator.claim(&key).await;

        if let Some(file) = self.store.get(&key).await? {
            debug!("Hit cache for {key}");
            // committed entries are immutable, so the claim can go before serving
            drop(claim);
            return Ok(TranscodeReply {
                content_type: format.content_type(),
                body: Box::new(file),
            });
        }

        self.convert_and_serve(&source_url, format, key, claim).await
    }

    /// Explicit parameter first, then `Accept` inference, then the
    /// configured default.
    fn resolve_format(&self, request: &TranscodeRequest) -> TranscodeResult<OutputFormat> {
        if let Some(format) = request.format.as_deref().filter(|f| !f.is_empty()) {
            return OutputFormat::parse(format);
        }
        if let Some(format) = request
            .accept
            .as_deref()
            .and_then(OutputFormat::infer_from_accept)
        {
            return Ok(format);
        }
        Ok(self.default_format)
    }

    /// The cache-miss path: fetch, guard, convert, dual-write.
    async fn convert_and_serve(
        &self,
        source_url: &str,
        format: OutputFormat,
        key: String,
        claim: KeyClaim,
    ) -> TranscodeResult<TranscodeReply> {
        info!("Converting {source_url} to {}", format.extension());

        let response = self
            .client
            .get(source_url)
            .send()
            .await
            .map_err(|err| TranscodeError::upstream(source_url, err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TranscodeError::upstream(
                source_url,
                format!("unexpected status {status}"),
            ));
        }

        // A declared length over the budget fails fast, but the header can
        // be absent or wrong, so the body stays budgeted below regardless.
        if self.max_bytes > 0
            && let Some(length) = response.content_length()
            && length > self.max_bytes
        {
            return Err(TranscodeError::resource_exceeded(format!(
                "Image is too large ({length} > {})",
                self.max_bytes
            )));
        }

        let workdir = tempfile::Builder::new().prefix("gifserver").tempdir()?;
        let source_path = workdir.path().join("source");
        self.download_source(response, &source_path, source_url)
            .await?;

        let geometry = self.prober.probe(&source_path).await?;
        check_dimensions(geometry.width, geometry.height, self.max_width, self.max_height)?;

        let output_path = {
            let _permit = self.limiter.acquire().await;
            self.converter
                .convert(&source_path, workdir.path(), format)
                .await?
        };

        let output = File::open(&output_path).await?;
        let cache_writer = self.store.put(&key).await?;
        let (client_write, client_read) = duplex(CLIENT_PIPE_BUFFER);

        tokio::spawn(dual_write(
            output,
            cache_writer,
            client_write,
            claim,
            workdir,
            key,
        ));

        Ok(TranscodeReply {
            content_type: format.content_type(),
            body: Box::new(client_read),
        })
    }

    /// Spools the response body to disk through the byte budget.
    async fn download_source(
        &self,
        response: reqwest::Response,
        dest: &Path,
        source_url: &str,
    ) -> TranscodeResult<()> {
        let stream = response.bytes_stream().map_err(io::Error::other);
        let mut reader = BudgetReader::new(StreamReader::new(stream), self.max_bytes);
        let mut file = File::create(dest).await?;

        if let Err(err) = tokio::io::copy(&mut reader, &mut file).await {
            return Err(match err.kind() {
                io::ErrorKind::FileTooLarge => TranscodeError::resource_exceeded(err.to_string()),
                _ => TranscodeError::upstream(source_url, err.to_string()),
            });
        }
        file.flush().await?;

        Ok(())
    }
}

/// Copies the converter output into the cache and the client in one pass.
///
/// The client side is wrapped in a [`ResilientWriter`], so a disconnect
/// never aborts or truncates the cache entry; the entry is committed only
/// after a fully successful copy. The key claim is held until then, and the
/// request's working directory is removed when the copy finishes.
async fn dual_write(
    mut output: File,
    mut cache_writer: BlobWriter,
    client: DuplexStream,
    claim: KeyClaim,
    workdir: TempDir,
    key: String,
) {
    let mut client = ResilientWriter::new(client);
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total: u64 = 0;

    loop {
        let read = match output.read(&mut buf).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) => {
                error!("Reading converter output for {key} failed: {err}");
                cache_writer.abort().await;
                return;
            }
        };

        if let Err(err) = cache_writer.write_all(&buf[..read]).await {
            // dropping the writer discards its partial file
            error!("Cache write for {key} failed: {err}");
            return;
        }
        // absorbed after the first client failure
        let _ = client.write_all(&buf[..read]).await;
        total += read as u64;
    }

    match cache_writer.commit().await {
        Ok(()) => info!("Wrote {total} bytes for {key}"),
        Err(err) => error!("Failed to commit cache entry {key}: {err}"),
    }
    let _ = client.shutdown().await;

    drop(claim);
    drop(workdir);
}
