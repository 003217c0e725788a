mod server;
mod store;

use anyhow::Result;
use tracing::info;

use bobine_core::config::load_config;
use bobine_core::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (load_config already calls validate())
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Bobine media server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Run the server until shutdown
    server::run(config).await
}
