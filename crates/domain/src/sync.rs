//! Sync outcome reports.
//!
//! A [`SyncResult`] is created fresh per sync invocation and is immutable
//! once returned. Per-entity failures are non-fatal and collected in
//! `errors`; they never abort the remaining batch.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::source::SourceType;
use crate::time::Timestamp;

/// A non-fatal per-entity failure recorded during a sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncError {
    pub source_entity_id: String,
    pub message: String,
}

/// Outcome of a single full synchronization from one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub source: SourceType,
    /// Entities the adapter enumerated.
    pub entities_found: usize,
    /// Newly registered canonical entities.
    pub entities_registered: usize,
    /// Existing entities merged with an incoming report.
    pub entities_updated: usize,
    /// Entities removed after exceeding the absence threshold.
    pub entities_removed: usize,
    /// Entities marked unavailable because they were absent from this pass.
    pub entities_unavailable: usize,
    pub duration: Duration,
    pub errors: Vec<SyncError>,
    pub finished_at: Timestamp,
}

impl SyncResult {
    /// Whether every enumerated entity was applied without error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
