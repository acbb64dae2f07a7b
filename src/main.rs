mod shutdown;
mod startup;

use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting zuifeed");

    // Load configuration
    let config = startup::load_config().await?;

    // Follow the feed until interrupted
    startup::run(config).await
}
