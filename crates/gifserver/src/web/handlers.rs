//! Request handlers.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Uri, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::errors::TranscodeResult;
use crate::pipeline::TranscodeRequest;
use crate::web::AppState;

/// Decoded query parameters of the transcode endpoint.
#[derive(Debug, Deserialize)]
pub struct TranscodeParams {
    url: Option<String>,
    format: Option<String>,
    sig: Option<String>,
}

/// `GET /transcode?url=...&format=...&sig=...`
///
/// The undecoded query is passed along too: signature verification works on
/// the bytes the client actually signed.
pub async fn transcode(
    State(state): State<AppState>,
    Query(params): Query<TranscodeParams>,
    headers: HeaderMap,
    uri: Uri,
) -> TranscodeResult<Response> {
    debug!("Transcode request: {uri}");

    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let reply = state
        .pipeline
        .handle(TranscodeRequest {
            url: params.url,
            format: params.format,
            sig: params.sig,
            accept,
            path: uri.path().to_string(),
            raw_query: uri.query().unwrap_or_default().to_string(),
        })
        .await?;

    let body = Body::from_stream(ReaderStream::new(reply.body));
    Ok(([(header::CONTENT_TYPE, reply.content_type)], body).into_response())
}

/// `GET /healthcheck`
pub async fn healthcheck() -> &'static str {
    "ok"
}
