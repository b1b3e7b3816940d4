//! Error taxonomy shared across the workspace.
//!
//! Every failure a consumer can observe maps to a stable [`ErrorCode`].
//! Adapter-level failures are never surfaced raw — the sync orchestrator and
//! action router wrap them into [`HubError::Adapter`] with the adapter's
//! message attached as detail.

use crate::entity::Capability;
use crate::source::SourceType;

/// Stable machine-readable error codes exposed to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EntityNotFound,
    AdapterNotFound,
    AdapterNotConnected,
    AdapterAlreadyRegistered,
    AdapterError,
    ActionUnsupported,
    SyncInProgress,
    Timeout,
    Cancelled,
    Validation,
    Config,
}

impl ErrorCode {
    /// The wire form of the code (`SCREAMING_SNAKE_CASE`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EntityNotFound => "ENTITY_NOT_FOUND",
            Self::AdapterNotFound => "ADAPTER_NOT_FOUND",
            Self::AdapterNotConnected => "ADAPTER_NOT_CONNECTED",
            Self::AdapterAlreadyRegistered => "ADAPTER_ALREADY_REGISTERED",
            Self::AdapterError => "ADAPTER_ERROR",
            Self::ActionUnsupported => "ACTION_UNSUPPORTED",
            Self::SyncInProgress => "SYNC_IN_PROGRESS",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Validation => "VALIDATION",
            Self::Config => "CONFIG",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("source entity id must not be empty")]
    EmptySourceEntityId,
    #[error("friendly name must not be empty")]
    EmptyFriendlyName,
    #[error("adapter id must not be empty")]
    EmptyAdapterId,
}

/// Top-level error type for the unified entity system.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// No canonical entity with the given id is registered.
    #[error("entity not found: {entity_id}")]
    EntityNotFound { entity_id: String },

    /// No adapter is registered under the given id or source.
    #[error("adapter not found: {adapter}")]
    AdapterNotFound { adapter: String },

    /// An adapter with the same id (or for the same source) already exists.
    #[error("adapter already registered: {adapter_id}")]
    AdapterAlreadyRegistered { adapter_id: String },

    /// The owning adapter is not connected; the action/sync was not attempted.
    #[error("adapter for source {source_type} is not connected")]
    AdapterNotConnected { source_type: SourceType },

    /// Wraps a failure reported by an adapter, with its message as detail.
    #[error("adapter {source_type} failed: {message}")]
    Adapter {
        source_type: SourceType,
        message: String,
    },

    /// The entity does not advertise the requested capability.
    #[error("entity {entity_id} does not support action {action}")]
    ActionUnsupported {
        entity_id: String,
        action: Capability,
    },

    /// A sync for this source is already running; the request failed fast.
    #[error("sync already in progress for source {source_type}")]
    SyncInProgress { source_type: SourceType },

    /// An adapter call exceeded its deadline.
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// A domain invariant was violated.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl HubError {
    /// Wrap an adapter-level failure, attaching its message as detail.
    pub fn adapter(source: SourceType, error: impl std::fmt::Display) -> Self {
        Self::Adapter {
            source_type: source,
            message: error.to_string(),
        }
    }

    /// `ADAPTER_NOT_FOUND` for a lookup by source.
    #[must_use]
    pub fn adapter_not_found(source: SourceType) -> Self {
        Self::AdapterNotFound {
            adapter: source.as_str().to_string(),
        }
    }

    /// The stable code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EntityNotFound { .. } => ErrorCode::EntityNotFound,
            Self::AdapterNotFound { .. } => ErrorCode::AdapterNotFound,
            Self::AdapterAlreadyRegistered { .. } => ErrorCode::AdapterAlreadyRegistered,
            Self::AdapterNotConnected { .. } => ErrorCode::AdapterNotConnected,
            Self::Adapter { .. } => ErrorCode::AdapterError,
            Self::ActionUnsupported { .. } => ErrorCode::ActionUnsupported,
            Self::SyncInProgress { .. } => ErrorCode::SyncInProgress,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Validation(_) => ErrorCode::Validation,
        }
    }
}
