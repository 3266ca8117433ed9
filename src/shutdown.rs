//! Graceful Shutdown Module
//!
//! Handles SIGINT/SIGTERM, broadcasts the shutdown to every listening
//! component, then releases cached content within a bounded time.

use crate::file_cache::FileCache;
use crate::{FelixError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Shutdown coordinator for graceful system shutdown
pub struct ShutdownCoordinator {
    file_cache: Option<Arc<FileCache>>,
    shutdown_sender: broadcast::Sender<()>,
    shutdown_timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create new shutdown coordinator
    pub fn new(shutdown_timeout: Duration) -> Self {
        let (shutdown_sender, _) = broadcast::channel(16);

        Self {
            file_cache: None,
            shutdown_sender,
            shutdown_timeout,
        }
    }

    /// Set file cache reference
    pub fn set_file_cache(&mut self, file_cache: Arc<FileCache>) {
        self.file_cache = Some(file_cache);
    }

    /// Get shutdown receiver for components to listen for shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_sender.subscribe()
    }

    /// Wait for SIGINT or SIGTERM, then shut down
    pub async fn listen_for_shutdown(&self) -> Result<()> {
        info!("Starting shutdown signal listener");

        let mut sigint =
            signal::unix::signal(signal::unix::SignalKind::interrupt()).map_err(|e| {
                FelixError::SystemError(format!("Failed to create SIGINT handler: {}", e))
            })?;

        let mut sigterm =
            signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(|e| {
                FelixError::SystemError(format!("Failed to create SIGTERM handler: {}", e))
            })?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, initiating graceful shutdown");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
            }
        }

        self.initiate_shutdown().await
    }

    /// Initiate graceful shutdown sequence
    pub async fn initiate_shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown sequence");

        if let Err(e) = self.shutdown_sender.send(()) {
            // No receivers left is normal late in shutdown
            debug!("Shutdown signal not sent (no active receivers): {}", e);
        }

        match timeout(self.shutdown_timeout, self.perform_shutdown()).await {
            Ok(Ok(())) => {
                info!("Graceful shutdown completed successfully");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Error during graceful shutdown: {}", e);
                Err(e)
            }
            Err(_) => {
                error!(
                    "Graceful shutdown timed out after {:?}, forcing shutdown",
                    self.shutdown_timeout
                );
                Err(FelixError::TimeoutError(
                    "Graceful shutdown timeout".to_string(),
                ))
            }
        }
    }

    async fn perform_shutdown(&self) -> Result<()> {
        if let Some(file_cache) = &self.file_cache {
            match file_cache.stats() {
                Ok(stats) => info!(
                    "Final cache stats: entries={}, size={} bytes, hits={}, misses={}, invalidations={}, evictions={}, bypassed={}",
                    stats.entries_count,
                    stats.current_size,
                    stats.hit_count,
                    stats.miss_count,
                    stats.invalidation_count,
                    stats.eviction_count,
                    file_cache.bypass_count()
                ),
                Err(e) => warn!("Could not read cache stats during shutdown: {}", e),
            }

            file_cache.clear()?;
        }

        Ok(())
    }
}

/// Shutdown signal receiver for components
pub struct ShutdownSignal {
    receiver: broadcast::Receiver<()>,
    shutdown_requested: bool,
}

impl ShutdownSignal {
    /// Create new shutdown signal from receiver
    pub fn new(receiver: broadcast::Receiver<()>) -> Self {
        Self {
            receiver,
            shutdown_requested: false,
        }
    }

    /// Check if shutdown has been requested (non-blocking)
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// Wait for shutdown signal. A closed or lagged channel also counts as shutdown.
    pub async fn wait_for_shutdown(&mut self) {
        let _ = self.receiver.recv().await;
        self.shutdown_requested = true;
    }
}
