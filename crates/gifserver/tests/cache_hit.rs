//! Cache-aside behavior through the full HTTP stack.
//!
//! A pre-seeded cache entry must be served byte for byte without touching
//! the converter; the converter commands are pointed at `false` so any
//! accidental miss fails loudly instead of silently re-converting.

use std::path::Path;
use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use blob_cache::BlobStore;

use gifserver::config::Config;
use gifserver::pipeline::{TranscodePipeline, cache_key};
use gifserver::services::converter::OutputFormat;
use gifserver::web;

const SOURCE_URL: &str = "http://example.com/party.gif";
const PAYLOAD: &[u8] = b"not really an mp4, but the cache does not care";

async fn test_server(cache_dir: &Path) -> TestServer {
    let mut config = Config::default();
    config.cache.dir = cache_dir.to_path_buf();
    config.convert.ffmpeg_command = "false".to_string();
    config.convert.ffprobe_command = "false".to_string();

    let pipeline = Arc::new(TranscodePipeline::new(config).await.unwrap());
    TestServer::new(web::create_router(pipeline)).unwrap()
}

async fn seed(cache_dir: &Path, key: &str, payload: &[u8]) {
    let store = BlobStore::open(cache_dir).await.unwrap();
    store.put_all(key, &mut &payload[..]).await.unwrap();
}

#[tokio::test]
async fn seeded_entry_is_served_byte_identically() {
    let dir = tempfile::tempdir().unwrap();
    let key = cache_key(SOURCE_URL, OutputFormat::Mp4);
    seed(dir.path(), &key, PAYLOAD).await;

    let server = test_server(dir.path()).await;
    let response = server
        .get("/transcode")
        .add_query_param("url", SOURCE_URL)
        .add_query_param("format", "mp4")
        .await;

    response.assert_status(StatusCode::OK);
    response.assert_header("content-type", "video/mp4");
    assert_eq!(response.as_bytes().as_ref(), PAYLOAD);
}

#[tokio::test]
async fn format_selects_a_distinct_entry() {
    let dir = tempfile::tempdir().unwrap();
    seed(
        dir.path(),
        &cache_key(SOURCE_URL, OutputFormat::Mp4),
        PAYLOAD,
    )
    .await;

    let server = test_server(dir.path()).await;

    // the mp4 entry exists, the png one does not, and conversion is
    // unavailable, so the png request must fail rather than serve mp4 bytes
    let response = server
        .get("/transcode")
        .add_query_param("url", SOURCE_URL)
        .add_query_param("format", "png")
        .await;
    assert_ne!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn accept_header_picks_the_seeded_format() {
    let dir = tempfile::tempdir().unwrap();
    seed(
        dir.path(),
        &cache_key(SOURCE_URL, OutputFormat::Ogv),
        PAYLOAD,
    )
    .await;

    let server = test_server(dir.path()).await;
    let response = server
        .get("/transcode")
        .add_query_param("url", SOURCE_URL)
        .add_header("accept", "video/ogg")
        .await;

    response.assert_status(StatusCode::OK);
    response.assert_header("content-type", "video/ogg");
    assert_eq!(response.as_bytes().as_ref(), PAYLOAD);
}

#[tokio::test]
async fn scheme_less_urls_share_the_entry_with_their_normalized_form() {
    let dir = tempfile::tempdir().unwrap();
    seed(
        dir.path(),
        &cache_key(SOURCE_URL, OutputFormat::Mp4),
        PAYLOAD,
    )
    .await;

    let server = test_server(dir.path()).await;
    let response = server
        .get("/transcode")
        .add_query_param("url", "example.com/party.gif")
        .add_query_param("format", "mp4")
        .await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.as_bytes().as_ref(), PAYLOAD);
}
