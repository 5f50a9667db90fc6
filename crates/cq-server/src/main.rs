//! Consequences Host
//!
//! Main entry point. Loads the configuration from the directory given as the
//! first argument (or `CONSEQUENCES_CONFIG`, or the working directory), wires
//! the event bus, chain dispatcher and addon host together, restores stored
//! addon instances and runs until interrupted.

use anyhow::{Context, Result};
use cq_addons::AddonHost;
use cq_config::HostConfig;
use cq_engine::{ChainDispatcher, LinkEvaluator};
use cq_event_bus::EventBus;
use cq_storage::{AddonStore, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// The running host
pub struct Consequences {
    /// Event bus for pub/sub communication
    pub bus: Arc<EventBus>,
    /// Dispatcher starting chains when events fire
    pub dispatcher: Arc<ChainDispatcher>,
    /// Addon instances and their persistence
    pub addons: AddonHost,
}

impl Consequences {
    /// Wire the host from its configuration
    pub fn new(config: &HostConfig) -> Self {
        let bus = Arc::new(EventBus::with_capacity(config.event_channel_capacity));
        let dispatcher = Arc::new(ChainDispatcher::with_evaluator(
            bus.clone(),
            LinkEvaluator::new(config.max_link_depth),
        ));
        let store = Arc::new(AddonStore::new(Arc::new(Storage::new(
            config.storage_dir.clone(),
        ))));
        let addons = AddonHost::new(store, dispatcher.clone());

        Self {
            bus,
            dispatcher,
            addons,
        }
    }

    /// Start dispatching and restore stored addon instances
    pub async fn start(&self) -> Result<usize> {
        self.dispatcher.start();
        let restored = self
            .addons
            .restore_all()
            .await
            .context("restoring addon instances")?;
        Ok(restored)
    }

    pub fn stop(&self) {
        self.dispatcher.stop();
    }
}

fn config_dir() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("CONSEQUENCES_CONFIG"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_dir = config_dir();
    let config = HostConfig::load(&config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir.display()))?;

    // RUST_LOG takes precedence over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_dir = %config_dir.display(),
        "Starting Consequences"
    );

    let host = Consequences::new(&config);
    let restored = host.start().await?;

    info!(
        restored,
        storage_dir = %config.storage_dir.display(),
        "Consequences is running"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    host.stop();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_start_with_empty_storage() {
        let dir = TempDir::new().unwrap();
        let config = HostConfig::load(dir.path()).unwrap();
        let host = Consequences::new(&config);

        assert_eq!(host.start().await.unwrap(), 0);
        assert!(host.dispatcher.is_running());
        assert_eq!(host.addons.instance_count(), 0);

        host.stop();
    }
}
