//! # omnihubd — omnihub daemon
//!
//! Composition root that wires all adapters into the unified entity
//! service and keeps it syncing.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars)
//! - Construct the unified entity service with configured priorities
//! - Register and connect enabled adapters (connect failures are recorded,
//!   not fatal — reconnection policy lives here, not in the core)
//! - Run an initial sync, then start the periodic scheduler
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use omnihub_adapter_hub::HubAdapter;
use omnihub_adapter_hub::config::HubConfig;
use omnihub_adapter_ups::{UpsAdapter, UpsConfig};
use omnihub_adapter_virtual::VirtualAdapter;
use omnihub_app::ports::SourceAdapter;
use omnihub_app::registries::SourcePriorityManager;
use omnihub_app::service::UnifiedEntityService;
use omnihub_app::sync::SyncConfig;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    let priority = SourcePriorityManager::default();
    for (source, rank) in config.priority_overrides() {
        priority.set_rank(source, rank);
    }

    let service = UnifiedEntityService::with_priorities(
        priority,
        SyncConfig {
            timeout: Duration::from_secs(config.sync.timeout_secs),
            removal_threshold: config.sync.removal_threshold,
        },
    );

    let adapters = build_adapters(&config)?;
    for adapter in adapters {
        let adapter_id = adapter.id().to_string();
        service.register_adapter(adapter)?;
        if let Err(err) = service.connect_adapter(&adapter_id).await {
            tracing::warn!(adapter_id, error = %err, "adapter connect failed, leaving in error state");
        }
    }

    for result in service.sync_all().await {
        match result {
            Ok(sync) => tracing::info!(
                source = %sync.source,
                found = sync.entities_found,
                registered = sync.entities_registered,
                "initial sync done"
            ),
            Err(err) => tracing::warn!(error = %err, "initial sync failed"),
        }
    }

    if config.sync.interval_secs > 0 {
        let _ = service.start_periodic_sync(Duration::from_secs(config.sync.interval_secs));
    }

    tracing::info!(
        adapters = service.registry_manager().adapter_registry().len(),
        entities = service.registry_manager().entity_registry().len(),
        "omnihubd running, press ctrl-c to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    service.stop_periodic_sync().await;
    for record in service.registry_manager().adapter_registry().records() {
        if let Err(err) = service.disconnect_adapter(&record.adapter_id).await {
            tracing::warn!(adapter_id = record.adapter_id, error = %err, "disconnect failed");
        }
    }

    Ok(())
}

/// Instantiate every enabled adapter from the configuration.
fn build_adapters(config: &Config) -> anyhow::Result<Vec<Arc<dyn SourceAdapter>>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    if config.virtual_devices.enabled {
        adapters.push(Arc::new(VirtualAdapter::default()));
    }

    if config.hub.enabled {
        let adapter = HubAdapter::new(&HubConfig::new(
            config.hub.base_url.clone(),
            config.hub.token.clone(),
        ))?;
        adapters.push(Arc::new(adapter));
    }

    if config.ups.enabled {
        adapters.push(Arc::new(UpsAdapter::new(UpsConfig {
            host: config.ups.host.clone(),
            port: config.ups.port,
            ups_names: config.ups.ups_names.clone(),
        })));
    }

    Ok(adapters)
}
