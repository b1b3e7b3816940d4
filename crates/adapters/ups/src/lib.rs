//! # omnihub-adapter-ups
//!
//! UPS monitoring adapter speaking the NUT (Network UPS Tools) line
//! protocol. Exposes battery charge, load, runtime, and input voltage as
//! read-only sensor entities per monitored UPS.
//!
//! ## Dependency rule
//!
//! Depends on `omnihub-app` (port traits) and `omnihub-domain` only,
//! plus the tokio TCP stack.

pub mod client;
pub mod convert;

use async_trait::async_trait;
use serde::Deserialize;

use omnihub_app::ports::SourceAdapter;
use omnihub_domain::action::{ActionResult, EntityAction};
use omnihub_domain::adapter::HealthInfo;
use omnihub_domain::entity::RawEntity;
use omnihub_domain::error::HubError;
use omnihub_domain::source::SourceType;

use client::NutClient;

/// Connection settings for the NUT daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsConfig {
    /// NUT daemon host.
    pub host: String,
    /// NUT daemon port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// UPS names to monitor; empty means discover via `LIST UPS`.
    #[serde(default)]
    pub ups_names: Vec<String>,
}

fn default_port() -> u16 {
    3493
}

/// Adapter for the UPS monitoring source.
pub struct UpsAdapter {
    config: UpsConfig,
    client: NutClient,
}

impl UpsAdapter {
    #[must_use]
    pub fn new(config: UpsConfig) -> Self {
        let client = NutClient::new(config.host.clone(), config.port);
        Self { config, client }
    }

    fn wrap(err: impl std::fmt::Display) -> HubError {
        HubError::adapter(SourceType::Ups, err)
    }
}

#[async_trait]
impl SourceAdapter for UpsAdapter {
    fn id(&self) -> &str {
        "ups"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Ups
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn connect(&self) -> Result<(), HubError> {
        self.client.connect().await.map_err(Self::wrap)
    }

    async fn disconnect(&self) -> Result<(), HubError> {
        self.client.disconnect().await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        // The port contract is synchronous; fall back to a non-blocking
        // peek at the connection slot.
        self.client.is_connected_blocking()
    }

    fn health(&self) -> HealthInfo {
        if self.is_connected() {
            HealthInfo::healthy()
        } else {
            HealthInfo::unhealthy(vec!["not connected".to_string()])
        }
    }

    async fn fetch_entities(&self) -> Result<Vec<RawEntity>, HubError> {
        let names = if self.config.ups_names.is_empty() {
            self.client.list_ups().await.map_err(Self::wrap)?
        } else {
            self.config.ups_names.clone()
        };

        let mut raws = Vec::new();
        for name in &names {
            let vars = self.client.list_vars(name).await.map_err(Self::wrap)?;
            raws.extend(convert::sensors_for(name, &vars)?);
        }
        Ok(raws)
    }

    async fn execute_action(
        &self,
        source_entity_id: &str,
        _action: &EntityAction,
    ) -> Result<ActionResult, HubError> {
        // UPS sensors advertise no capabilities, so the router rejects
        // actions before reaching this point.
        Err(Self::wrap(format!(
            "ups entity {source_entity_id} is read-only"
        )))
    }
}
