//! Conversion from hub states to the canonical raw entity shape.
//!
//! The domain comes from the entity-id prefix (`light.kitchen` → light),
//! the friendly name from the `friendly_name` attribute when present, and
//! capabilities are detected from the domain plus advertised attributes
//! (`brightness`, `rgb_color`, `current_position`, …).

use omnihub_domain::entity::{
    AttributeValue, Capability, DomainType, EntityState, RawEntity,
};
use omnihub_domain::error::HubError;
use omnihub_domain::time::now;

use crate::client::HubState;

/// Translate one hub state into a [`RawEntity`] report.
///
/// # Errors
///
/// Returns a validation error when the hub state has an empty entity id.
pub fn to_raw_entity(state: &HubState) -> Result<RawEntity, HubError> {
    let domain = domain_of(&state.entity_id);
    let friendly_name = state
        .attributes
        .get("friendly_name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(&state.entity_id)
        .to_string();

    let available = state.state != "unavailable";
    let entity_state = if available {
        EntityState::from(state.state.as_str())
    } else {
        EntityState::Unknown
    };

    let mut builder = RawEntity::builder()
        .source_entity_id(&state.entity_id)
        .domain(domain)
        .friendly_name(friendly_name)
        .state(entity_state)
        .available(available)
        .reported_at(state.last_updated.unwrap_or_else(now));

    for (key, value) in &state.attributes {
        if key == "friendly_name" {
            continue;
        }
        builder = builder.attribute(key, AttributeValue::from_json(value.clone()));
    }

    for capability in detect_capabilities(domain, state) {
        builder = builder.capability(capability);
    }

    builder.build()
}

/// The domain encoded in the entity-id prefix.
#[must_use]
pub fn domain_of(entity_id: &str) -> DomainType {
    entity_id
        .split_once('.')
        .map(|(prefix, _)| prefix)
        .unwrap_or("")
        .parse()
        .unwrap_or(DomainType::Other)
}

fn detect_capabilities(domain: DomainType, state: &HubState) -> Vec<Capability> {
    let mut capabilities = Vec::new();
    match domain {
        DomainType::Light => {
            capabilities.extend([Capability::TurnOn, Capability::TurnOff, Capability::Toggle]);
            if state.attributes.contains_key("brightness") {
                capabilities.push(Capability::SetBrightness);
            }
            if state.attributes.contains_key("rgb_color")
                || state.attributes.contains_key("color_temp")
            {
                capabilities.push(Capability::SetColor);
            }
        }
        DomainType::Switch => {
            capabilities.extend([Capability::TurnOn, Capability::TurnOff, Capability::Toggle]);
        }
        DomainType::Cover => {
            if state.attributes.contains_key("current_position") {
                capabilities.push(Capability::SetPosition);
            }
        }
        DomainType::Climate => {
            capabilities.push(Capability::SetTemperature);
        }
        DomainType::Lock => {
            capabilities.extend([Capability::Lock, Capability::Unlock]);
        }
        _ => {}
    }
    capabilities
}
