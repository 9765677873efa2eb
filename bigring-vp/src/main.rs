//! Big Ring video player (bigring-vp) - Main entry point
//!
//! Loads the route catalog, starts the playback controller and serves the
//! HTTP control API until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bigring_common::catalog::load_catalog;
use bigring_vp::api::{self, AppContext};
use bigring_vp::config::{Config, ConfigOverrides};
use bigring_vp::playback::{
    DistanceSource, NullSink, PlaybackController, SensorDistance, SimulatedCyclist,
    SyntheticDecoder,
};
use bigring_vp::SharedState;
use clap::Parser;
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for bigring-vp
#[derive(Parser, Debug)]
#[command(name = "bigring-vp")]
#[command(about = "Distance-synchronized route video player")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "BIGRING_PORT")]
    port: Option<u16>,

    /// Folder containing route videos
    #[arg(short, long)]
    video_folder: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "BIGRING_CONFIG")]
    config: Option<PathBuf>,

    /// Route catalog (JSON)
    #[arg(short, long)]
    routes: Option<PathBuf>,

    /// Take the rider's distance from POST /ride/distance instead of simulating it
    #[arg(long)]
    sensor: bool,

    /// Simulated riding speed in km/h
    #[arg(long)]
    speed_kmh: Option<f64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let overrides = ConfigOverrides {
        port: args.port,
        video_folder: args.video_folder,
        routes_file: args.routes,
        speed_kmh: args.speed_kmh,
        log_level: args.log_level,
    };
    let config = Config::load(args.config.as_deref(), overrides)
        .context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "bigring_vp={level},bigring_common={level},tower_http=info",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Big Ring video player {} ({}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );
    match &config.config_file {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }
    info!("Video folder: {}", config.video_folder.display());

    // Load route catalog
    let routes = match load_catalog(&config.routes_file, &config.video_folder) {
        Ok(routes) => routes,
        Err(e) => {
            warn!(
                "No route catalog loaded from {}: {}",
                config.routes_file.display(),
                e
            );
            Vec::new()
        }
    };
    let catalog = Arc::new(RwLock::new(routes));

    // Distance source
    let sensor = args.sensor.then(|| Arc::new(SensorDistance::new()));
    let distance: Arc<dyn DistanceSource> = match &sensor {
        Some(sensor) => {
            info!("Distance source: external sensor");
            sensor.clone()
        }
        None => {
            info!("Distance source: simulated rider at {:.1} km/h", config.speed_kmh);
            Arc::new(SimulatedCyclist::from_kmh(config.speed_kmh))
        }
    };

    // Initialize playback controller
    let state = Arc::new(SharedState::default());
    let controller = PlaybackController::spawn(
        config.playback.clone(),
        Box::new(SyntheticDecoder::new(config.decoder)),
        distance,
        Box::new(NullSink),
        Arc::clone(&state),
    )
    .context("Failed to start playback controller")?;
    info!("Playback controller initialized");

    let ctx = AppContext {
        state,
        controller: controller.clone(),
        catalog,
        sensor,
        port: config.port,
    };

    let served = api::run(ctx, shutdown_signal()).await;

    if let Err(e) = controller.shutdown().await {
        warn!("Playback controller shutdown: {}", e);
    }

    served.context("Server error")?;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
