use felix::{
    config::Config,
    file_cache::FileCache,
    logging::LoggerManager,
    server::FileServer,
    shutdown::{ShutdownCoordinator, ShutdownSignal},
    Result,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let logger = LoggerManager::new(config.logging.clone());
    logger.initialize()?;

    info!(
        "Starting Felix server v{} (built: {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIMESTAMP")
    );
    info!(
        "Cache: enabled={}, capacity={}MB, eviction={}",
        config.cache.enabled,
        config.cache.capacity / 1024 / 1024,
        config.cache.eviction_algorithm
    );

    let file_cache = Arc::new(FileCache::from_config(&config.cache));

    let mut shutdown_coordinator = ShutdownCoordinator::new(Duration::from_secs(10));
    shutdown_coordinator.set_file_cache(file_cache.clone());

    let server = FileServer::bind(&config.server, file_cache).await?;
    let server_shutdown = ShutdownSignal::new(shutdown_coordinator.subscribe());

    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(server_shutdown).await {
            error!("File server failed: {}", e);
        }
    });

    if let Err(e) = shutdown_coordinator.listen_for_shutdown().await {
        error!("Shutdown coordinator failed: {}", e);
    }

    server_task.await.ok();

    info!("Felix shutdown complete");
    Ok(())
}
