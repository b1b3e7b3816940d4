//! # omnihub-adapter-virtual
//!
//! Virtual/demo adapter that provides simulated devices for testing and
//! demonstration purposes.
//!
//! ## Provided devices
//!
//! | Device | Source entity id | Behaviour |
//! |--------|------------------|-----------|
//! | Virtual Light | `light.virtual_light` | Responds to `turn_on` / `turn_off` / `toggle` |
//! | Virtual Switch | `switch.virtual_switch` | Responds to `turn_on` / `turn_off` / `toggle` |
//! | Virtual Temperature | `sensor.virtual_temperature` | Read-only numeric reading |
//!
//! ## Dependency rule
//!
//! Depends on `omnihub-app` (port traits) and `omnihub-domain` only.

mod devices;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use omnihub_app::ports::SourceAdapter;
use omnihub_domain::action::{ActionResult, EntityAction};
use omnihub_domain::adapter::HealthInfo;
use omnihub_domain::entity::RawEntity;
use omnihub_domain::error::HubError;
use omnihub_domain::source::SourceType;

use devices::{VirtualDevice, VirtualLight, VirtualSensor, VirtualSwitch};

/// Simulated source exposing one light, one switch, and one sensor.
pub struct VirtualAdapter {
    connected: AtomicBool,
    devices: HashMap<&'static str, VirtualDevice>,
}

impl Default for VirtualAdapter {
    fn default() -> Self {
        let mut devices = HashMap::new();
        devices.insert(
            VirtualLight::SOURCE_ENTITY_ID,
            VirtualDevice::Light(VirtualLight::default()),
        );
        devices.insert(
            VirtualSwitch::SOURCE_ENTITY_ID,
            VirtualDevice::Switch(VirtualSwitch::default()),
        );
        devices.insert(
            VirtualSensor::SOURCE_ENTITY_ID,
            VirtualDevice::Sensor(VirtualSensor::default()),
        );
        Self {
            connected: AtomicBool::new(false),
            devices,
        }
    }
}

impl VirtualAdapter {
    fn ensure_connected(&self) -> Result<(), HubError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(HubError::adapter(SourceType::Virtual, "not connected"))
        }
    }
}

#[async_trait]
impl SourceAdapter for VirtualAdapter {
    fn id(&self) -> &str {
        "virtual"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Virtual
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn connect(&self) -> Result<(), HubError> {
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
        self.devices.values().map(VirtualDevice::report).collect()
    }

    async fn execute_action(
        &self,
        source_entity_id: &str,
        action: &EntityAction,
    ) -> Result<ActionResult, HubError> {
        self.ensure_connected()?;
        let device = self.devices.get(source_entity_id).ok_or_else(|| {
            HubError::adapter(
                SourceType::Virtual,
                format!("unknown device: {source_entity_id}"),
            )
        })?;
        let new_state = device.handle(action.name)?;
        Ok(ActionResult::ok(action, Some(new_state)))
    }
}
