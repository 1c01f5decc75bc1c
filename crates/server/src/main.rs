//! World server binary.

use tracing::info;
use tracing_subscriber::EnvFilter;

use server::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("World Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Loaded configuration");
    info!("  Port: {}", config.server.port);
    info!("  Tick: {}ms", config.server.tick_interval_ms);
    info!("  Spawn: {}", config.world.spawn);

    // Start the game server
    server::run(config).await?;

    Ok(())
}
