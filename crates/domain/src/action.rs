//! Actions — imperative commands targeted at a canonical entity.
//!
//! Every consumer (HTTP handlers, automation engine) gets one uniform
//! result shape: [`ActionResult`] either succeeds or carries a structured
//! [`ActionError`] with a stable code. Raw adapter errors never escape.

use serde::{Deserialize, Serialize};

use crate::entity::{Capability, EntityState};
use crate::error::{ErrorCode, HubError};
use crate::id::{CanonicalId, RequestId};
use crate::time::{Timestamp, now};

/// A control request routed to the adapter owning the target entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityAction {
    pub entity_id: CanonicalId,
    pub name: Capability,
    /// Action-specific parameters (e.g. `{"brightness": 128}`).
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Which consumer issued the request (e.g. `"automation"`).
    pub requestor: Option<String>,
    pub request_id: RequestId,
    pub issued_at: Timestamp,
}

impl EntityAction {
    /// Create an action with no parameters and fresh request metadata.
    #[must_use]
    pub fn new(entity_id: CanonicalId, name: Capability) -> Self {
        Self {
            entity_id,
            name,
            parameters: serde_json::Value::Null,
            requestor: None,
            request_id: RequestId::new(),
            issued_at: now(),
        }
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    #[must_use]
    pub fn with_requestor(mut self, requestor: impl Into<String>) -> Self {
        self.requestor = Some(requestor.into());
        self
    }
}

/// Structured failure attached to an unsuccessful [`ActionResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionError {
    pub code: ErrorCode,
    pub message: String,
}

/// Uniform outcome of an action dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub entity_id: CanonicalId,
    pub action: Capability,
    /// State reported by the adapter after execution, when known.
    pub new_state: Option<EntityState>,
    pub error: Option<ActionError>,
    pub processed_at: Timestamp,
}

impl ActionResult {
    /// A successful result, optionally carrying the post-action state.
    #[must_use]
    pub fn ok(action: &EntityAction, new_state: Option<EntityState>) -> Self {
        Self {
            success: true,
            entity_id: action.entity_id,
            action: action.name,
            new_state,
            error: None,
            processed_at: now(),
        }
    }

    /// A failed result carrying the error's stable code and message.
    #[must_use]
    pub fn failed(action: &EntityAction, error: &HubError) -> Self {
        Self {
            success: false,
            entity_id: action.entity_id,
            action: action.name,
            new_state: None,
            error: Some(ActionError {
                code: error.code(),
                message: error.to_string(),
            }),
            processed_at: now(),
        }
    }
}
