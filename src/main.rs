use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod config;
mod media;
mod server;
mod utils;

use config::{Config, LogFormat};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overrides config and PORT
    #[arg(short, long)]
    port: Option<u16>,
}

const CONFIG_DIR: &str = "ytmux";
const CONFIG_FILE_NAME: &str = "config.toml";

fn get_config_path(args: &Args) -> Option<PathBuf> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }

    if let Ok(path) = std::env::var("CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }

    let xdg_config_home = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from);
    default_config_candidates(xdg_config_home, dirs::home_dir())
        .into_iter()
        .find(|path| path.exists())
}

/// XDG location first, then `~/.config`.
fn default_config_candidates(xdg_config_home: Option<PathBuf>, home: Option<PathBuf>) -> Vec<PathBuf> {
    xdg_config_home
        .into_iter()
        .chain(home.map(|home| home.join(".config")))
        .map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE_NAME))
        .collect()
}

fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = get_config_path(&args);
    let mut config = Config::load(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Invalid configuration".to_string(),
    })?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_logging(config.logging.format);

    info!("Starting {}...", config::SERVICE_NAME);
    match &config_path {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => info!("No config file found, using defaults and environment"),
    }

    server::run(config).await
}
