//! # omnihub-adapter-hub
//!
//! Adapter for a smart-home hub exposing a Home-Assistant-style REST API.
//! The hub is the primary, most comprehensive source: it enumerates
//! entities via `GET /api/states` and executes actions via
//! `POST /api/services/{domain}/{service}`.
//!
//! ## Dependency rule
//!
//! Depends on `omnihub-app` (port traits) and `omnihub-domain` only,
//! plus the HTTP stack.

pub mod client;
pub mod config;
pub mod convert;
pub mod error;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use omnihub_app::ports::SourceAdapter;
use omnihub_domain::action::{ActionResult, EntityAction};
use omnihub_domain::adapter::HealthInfo;
use omnihub_domain::entity::{Capability, EntityState, RawEntity};
use omnihub_domain::error::HubError;
use omnihub_domain::source::SourceType;

use client::HubClient;
use config::HubConfig;

/// Adapter for the smart-home hub source.
pub struct HubAdapter {
    client: HubClient,
    connected: AtomicBool,
}

impl HubAdapter {
    /// Build the adapter. Does not connect — call
    /// [`connect`](SourceAdapter::connect) explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration cannot form an HTTP client.
    pub fn new(config: &HubConfig) -> Result<Self, HubError> {
        let client = HubClient::new(config)
            .map_err(|err| HubError::adapter(SourceType::Hub, err))?;
        Ok(Self {
            client,
            connected: AtomicBool::new(false),
        })
    }

    fn ensure_connected(&self) -> Result<(), HubError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(HubError::adapter(SourceType::Hub, "not connected"))
        }
    }
}

/// Map an action to the hub's `(service, payload)` form.
///
/// Parameterized actions fold their parameters into the service payload
/// the way the hub expects (`set_brightness` is a `turn_on` with a
/// `brightness` field).
fn service_call_for(action: &EntityAction) -> (&'static str, serde_json::Value) {
    match action.name {
        Capability::TurnOn => ("turn_on", action.parameters.clone()),
        Capability::TurnOff => ("turn_off", action.parameters.clone()),
        Capability::Toggle => ("toggle", action.parameters.clone()),
        Capability::SetBrightness | Capability::SetColor => {
            ("turn_on", action.parameters.clone())
        }
        Capability::SetPosition => ("set_cover_position", action.parameters.clone()),
        Capability::SetTemperature => ("set_temperature", action.parameters.clone()),
        Capability::Lock => ("lock", action.parameters.clone()),
        Capability::Unlock => ("unlock", action.parameters.clone()),
    }
}

/// The state we can assume immediately after a successful service call.
fn expected_state_for(action: Capability) -> Option<EntityState> {
    match action {
        Capability::TurnOn | Capability::SetBrightness | Capability::SetColor => {
            Some(EntityState::On)
        }
        Capability::TurnOff => Some(EntityState::Off),
        _ => None,
    }
}

#[async_trait]
impl SourceAdapter for HubAdapter {
    fn id(&self) -> &str {
        "hub"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Hub
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn connect(&self) -> Result<(), HubError> {
        self.client
            .ping()
            .await
            .map_err(|err| HubError::adapter(SourceType::Hub, err))?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), HubError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn health(&self) -> HealthInfo {
        if self.is_connected() {
            HealthInfo::healthy()
        } else {
            HealthInfo::unhealthy(vec!["not connected".to_string()])
        }
    }

    async fn fetch_entities(&self) -> Result<Vec<RawEntity>, HubError> {
        self.ensure_connected()?;
        let states = self
            .client
            .states()
            .await
            .map_err(|err| HubError::adapter(SourceType::Hub, err))?;

        // Per-entity conversion failures are left to the registry; only
        // states with an unusable id are dropped here.
        let mut raws = Vec::with_capacity(states.len());
        for state in &states {
            match convert::to_raw_entity(state) {
                Ok(raw) => raws.push(raw),
                Err(err) => {
                    tracing::warn!(
                        entity_id = state.entity_id,
                        error = %err,
                        "skipping unconvertible hub state"
                    );
                }
            }
        }
        Ok(raws)
    }

    async fn execute_action(
        &self,
        source_entity_id: &str,
        action: &EntityAction,
    ) -> Result<ActionResult, HubError> {
        self.ensure_connected()?;

        let domain = source_entity_id
            .split_once('.')
            .map(|(prefix, _)| prefix)
            .unwrap_or("homeassistant");
        let (service, payload) = service_call_for(action);

        self.client
            .call_service(domain, service, source_entity_id, payload)
            .await
            .map_err(|err| HubError::adapter(SourceType::Hub, err))?;

        Ok(ActionResult::ok(action, expected_state_for(action.name)))
    }
}
