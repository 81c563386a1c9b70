use anyhow::Result;
use clap::Parser;
use dynamic_pipeline::{config::Config, gst_utils, Session, SessionEnd};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "dynamic-pipeline.toml")]
    config: PathBuf,

    /// URI to play, overrides the configuration
    #[arg(short, long, env = "DYNAMIC_PIPELINE_URI")]
    uri: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Check the required GStreamer elements and exit
    #[arg(long)]
    check_plugins: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logging comes up before the config is read, the level is picked from
    // the file when RUST_LOG is unset
    let mut config = Config::load(&args.config);
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        let level = config
            .as_ref()
            .map(|c| c.app.log_level.clone())
            .unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    if let Some(uri) = args.uri {
        if let Ok(ref mut config) = config {
            config.source.uri = uri;
            config.validate().map_err(anyhow::Error::msg)?;
        }
    }
    let config = config?;

    info!("Starting {} v{}", config.app.name, env!("CARGO_PKG_VERSION"));
    if args.config.exists() {
        info!("Configuration loaded from {:?}", args.config);
    } else {
        warn!("Configuration file {:?} not found, using defaults", args.config);
    }

    gst_utils::initialize()?;

    let required = config.required_factories();
    if args.check_plugins {
        gst_utils::print_element_info(&gst_utils::discover_elements(&required));
        return Ok(());
    }
    gst_utils::verify_elements(&required)?;

    info!("Playing {}", config.source.uri);
    let session = Session::build(&config)?;

    match session.run()? {
        SessionEnd::Error { message, .. } => error!("Session ended with error: {}", message),
        SessionEnd::EndOfStream => info!("Session finished"),
        SessionEnd::BusClosed => info!("Session stopped"),
    }

    Ok(())
}
