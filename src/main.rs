//! mjpeg-relay server binary
//!
//! Run with: mjpeg-relay [--port PORT] [--display WxH]...
//!
//! Examples:
//!   mjpeg-relay                                  # 0.0.0.0:65532, one 1920x1080 test display
//!   mjpeg-relay --bind 127.0.0.1 --port 8080
//!   mjpeg-relay --display 2560x1440 --display 1280x1024
//!
//! View a stream with any MJPEG-capable client:
//!   ffplay http://localhost:65532/v/1
//!   curl http://localhost:65532/api/displays

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use mjpeg_relay::capture::DisplayInfo;
use mjpeg_relay::server::DEFAULT_PORT;
use mjpeg_relay::settings;
use mjpeg_relay::{RelayContext, RelayServer, ServerConfig, SettingsStore, SoftwareJpegEncoder, TestPatternSource};

#[derive(Parser)]
#[command(name = "mjpeg-relay")]
#[command(about = "Serve live screen content as an MJPEG stream with a JSON control API")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory with the frontend's static files (defaults to ./public)
    #[arg(long)]
    public_dir: Option<PathBuf>,

    /// Settings file (defaults to $MJPEG_RELAY_CONFIG, ./config.json or the user data dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter directive, e.g. "debug" or "mjpeg_relay=trace"
    #[arg(long, env = "RUST_LOG", default_value = "mjpeg_relay=info")]
    log_level: String,

    /// Virtual display size for the test pattern source; repeat for more displays
    #[arg(long = "display", value_name = "WxH", value_parser = parse_size)]
    displays: Vec<(u32, u32)>,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {value:?}"))?;

    let width: u32 = width.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let height: u32 = height.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    if width == 0 || height == 0 {
        return Err("display size must be non-zero".to_string());
    }
    Ok((width, height))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_new(&cli.log_level)?)
        .init();

    let settings_path = cli.config.clone().unwrap_or_else(settings::resolve_path);
    let settings = Arc::new(SettingsStore::open(settings_path));

    let capture = if cli.displays.is_empty() {
        TestPatternSource::default()
    } else {
        TestPatternSource::new(
            cli.displays
                .iter()
                .zip(1u32..)
                .map(|(&(width, height), id)| DisplayInfo::new(id, width, height))
                .collect(),
        )
    };

    let mut config = ServerConfig::with_addr(SocketAddr::new(cli.bind, cli.port)).max_connections(cli.max_connections);
    if let Some(dir) = cli.public_dir {
        config = config.public_dir(dir);
    }

    let context = RelayContext::new(Arc::new(capture), Arc::new(SoftwareJpegEncoder::new()), settings);
    let server = RelayServer::new(config, context);

    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %server.bind_addr(), error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    // Run with Ctrl+C handling
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    server.run_until(listener, shutdown).await?;
    tracing::info!("Server stopped");
    Ok(())
}
