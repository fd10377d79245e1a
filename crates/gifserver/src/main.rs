use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gifserver::{config::Config, pipeline::TranscodePipeline, web};

#[derive(Parser)]
#[command(name = "gifserver")]
#[command(version)]
#[command(about = "An HTTP service that transcodes animated GIFs with ffmpeg")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("gifserver={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting gifserver v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    // CLI arguments override the file
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if config.server.secret.is_empty() {
        warn!("No secret configured, request signatures are not checked");
    }

    let addr = config.server.listen_addr();
    let pipeline = Arc::new(TranscodePipeline::new(config).await?);

    if !pipeline.converter_available().await {
        warn!("ffmpeg not found on startup, conversions will fail until it is installed");
    }

    let router = web::create_router(pipeline);
    web::serve(router, &addr).await
}
