// ABOUTME: Entry point that loads configuration, connects to the platform, and runs the panel host
// ABOUTME: Everything runs on a single-threaded tokio runtime; blocking OS queries go to the blocking pool

use anyhow::{Context, Result};
use notchbar::platform::Platform;
use notchbar::{App, Config};
use tracing::{Level, info, warn};

fn init_logging() {
    let level = if std::env::var("NOTCHBAR_DEBUG").is_ok() {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn load_config() -> Config {
    let loaded = Config::default_config_path().and_then(|path| {
        let existed = path.exists();
        let config = Config::load_or_create(&path)?;
        if !existed {
            info!("Created default configuration at: {}", path.display());
        }
        Ok(config)
    });

    loaded.unwrap_or_else(|e| {
        warn!("Failed to load config: {e:#}. Using defaults.");
        Config::default()
    })
}

fn main() -> Result<()> {
    init_logging();
    info!("Starting NotchBar...");

    let config = load_config();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    runtime.block_on(async {
        let services = Platform::connect().context("Failed to connect to the windowing system")?;
        App::new(config, services).run().await
    })
}
