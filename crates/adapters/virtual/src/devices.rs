//! Virtual device implementations — light, switch, temperature sensor.
//!
//! Each device keeps its simulated state behind a mutex so actions are
//! reflected in the next enumeration.

use std::sync::{Mutex, PoisonError};

use omnihub_domain::entity::{
    AttributeValue, Capability, DomainType, EntityState, RawEntity,
};
use omnihub_domain::error::HubError;

/// Wrapper enum for the concrete virtual device types.
pub enum VirtualDevice {
    Light(VirtualLight),
    Switch(VirtualSwitch),
    Sensor(VirtualSensor),
}

impl VirtualDevice {
    /// The source-local entity id of this device.
    #[must_use]
    pub fn source_entity_id(&self) -> &'static str {
        match self {
            Self::Light(_) => VirtualLight::SOURCE_ENTITY_ID,
            Self::Switch(_) => VirtualSwitch::SOURCE_ENTITY_ID,
            Self::Sensor(_) => VirtualSensor::SOURCE_ENTITY_ID,
        }
    }

    /// Current state as a [`RawEntity`] report.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails (should not happen
    /// with hardcoded inputs).
    pub fn report(&self) -> Result<RawEntity, HubError> {
        match self {
            Self::Light(d) => d.report(),
            Self::Switch(d) => d.report(),
            Self::Sensor(d) => d.report(),
        }
    }

    /// Apply an action, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns an error when the device does not handle the action.
    pub fn handle(&self, action: Capability) -> Result<EntityState, HubError> {
        match self {
            Self::Light(d) => d.handle(action),
            Self::Switch(d) => d.handle(action),
            Self::Sensor(d) => d.handle(action),
        }
    }
}

fn toggle_state(state: &Mutex<EntityState>, action: Capability) -> Result<EntityState, HubError> {
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    match action {
        Capability::TurnOn => *state = EntityState::On,
        Capability::TurnOff => *state = EntityState::Off,
        Capability::Toggle => {
            *state = match *state {
                EntityState::On => EntityState::Off,
                _ => EntityState::On,
            };
        }
        other => {
            return Err(HubError::adapter(
                omnihub_domain::source::SourceType::Virtual,
                format!("action {other} not handled by this device"),
            ));
        }
    }
    Ok(state.clone())
}

/// A simulated light that can be turned on and off.
pub struct VirtualLight {
    state: Mutex<EntityState>,
}

impl Default for VirtualLight {
    fn default() -> Self {
        Self {
            state: Mutex::new(EntityState::Off),
        }
    }
}

impl VirtualLight {
    pub const SOURCE_ENTITY_ID: &'static str = "light.virtual_light";

    /// Current state as a [`RawEntity`] report.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn report(&self) -> Result<RawEntity, HubError> {
        let state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        RawEntity::builder()
            .source_entity_id(Self::SOURCE_ENTITY_ID)
            .domain(DomainType::Light)
            .friendly_name("Virtual Light")
            .state(state)
            .capability(Capability::TurnOn)
            .capability(Capability::TurnOff)
            .capability(Capability::Toggle)
            .build()
    }

    /// Apply an action.
    ///
    /// # Errors
    ///
    /// Returns an error when the action is not handled.
    pub fn handle(&self, action: Capability) -> Result<EntityState, HubError> {
        toggle_state(&self.state, action)
    }
}

/// A simulated switch.
pub struct VirtualSwitch {
    state: Mutex<EntityState>,
}

impl Default for VirtualSwitch {
    fn default() -> Self {
        Self {
            state: Mutex::new(EntityState::Off),
        }
    }
}

impl VirtualSwitch {
    pub const SOURCE_ENTITY_ID: &'static str = "switch.virtual_switch";

    /// Current state as a [`RawEntity`] report.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn report(&self) -> Result<RawEntity, HubError> {
        let state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        RawEntity::builder()
            .source_entity_id(Self::SOURCE_ENTITY_ID)
            .domain(DomainType::Switch)
            .friendly_name("Virtual Switch")
            .state(state)
            .capability(Capability::TurnOn)
            .capability(Capability::TurnOff)
            .capability(Capability::Toggle)
            .build()
    }

    /// Apply an action.
    ///
    /// # Errors
    ///
    /// Returns an error when the action is not handled.
    pub fn handle(&self, action: Capability) -> Result<EntityState, HubError> {
        toggle_state(&self.state, action)
    }
}

/// A simulated temperature sensor. Read-only: it advertises no
/// capabilities and rejects every action.
pub struct VirtualSensor {
    temperature: Mutex<f64>,
}

impl Default for VirtualSensor {
    fn default() -> Self {
        Self {
            temperature: Mutex::new(21.5),
        }
    }
}

impl VirtualSensor {
    pub const SOURCE_ENTITY_ID: &'static str = "sensor.virtual_temperature";

    /// Current reading as a [`RawEntity`] report.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn report(&self) -> Result<RawEntity, HubError> {
        let temperature = *self.temperature.lock().unwrap_or_else(PoisonError::into_inner);
        RawEntity::builder()
            .source_entity_id(Self::SOURCE_ENTITY_ID)
            .domain(DomainType::Sensor)
            .friendly_name("Virtual Temperature")
            .state(EntityState::Custom(temperature.to_string()))
            .attribute("temperature", AttributeValue::Float(temperature))
            .attribute("unit", AttributeValue::String("\u{b0}C".to_string()))
            .build()
    }

    /// Sensors handle no actions.
    ///
    /// # Errors
    ///
    /// Always returns an adapter error.
    pub fn handle(&self, action: Capability) -> Result<EntityState, HubError> {
        Err(HubError::adapter(
            omnihub_domain::source::SourceType::Virtual,
            format!("sensor does not handle {action}"),
        ))
    }

    /// Override the simulated reading.
    pub fn set_temperature(&self, value: f64) {
        *self.temperature.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}
