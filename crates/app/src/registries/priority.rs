//! Source priority — a configurable ranking used to break merge ties.
//!
//! Lower rank = higher precedence. The primary hub outranks auxiliary
//! adapters by default. The manager holds no entity data; it is used
//! exclusively as an input to the conflict resolver's tie-break rule.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use omnihub_domain::source::SourceType;

/// Rank assigned to sources that were never configured. Keeps unknown
/// sources below every explicitly ranked one.
pub const UNRANKED: u8 = u8::MAX;

/// Configurable ranking of sources (lower = higher precedence).
pub struct SourcePriorityManager {
    ranks: RwLock<HashMap<SourceType, u8>>,
}

impl SourcePriorityManager {
    /// Build a manager from explicit ranks.
    #[must_use]
    pub fn new(ranks: HashMap<SourceType, u8>) -> Self {
        Self {
            ranks: RwLock::new(ranks),
        }
    }

    /// The rank for a source; [`UNRANKED`] when it was never configured.
    #[must_use]
    pub fn rank(&self, source: SourceType) -> u8 {
        self.ranks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&source)
            .copied()
            .unwrap_or(UNRANKED)
    }

    /// Override the rank for a source at runtime.
    pub fn set_rank(&self, source: SourceType, rank: u8) {
        let previous = self
            .ranks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source, rank);
        match previous {
            Some(old) if old != rank => {
                tracing::info!(source = %source, old, new = rank, "source priority updated");
            }
            None => tracing::info!(source = %source, rank, "source priority set"),
            Some(_) => {}
        }
    }

    /// All ranked sources ordered by precedence (highest first).
    #[must_use]
    pub fn order(&self) -> Vec<SourceType> {
        let ranks = self.ranks.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<(SourceType, u8)> =
            ranks.iter().map(|(source, rank)| (*source, *rank)).collect();
        entries.sort_by_key(|(_, rank)| *rank);
        entries.into_iter().map(|(source, _)| source).collect()
    }

    /// Whether `incoming` takes strict precedence over `current`.
    #[must_use]
    pub fn should_override(&self, current: SourceType, incoming: SourceType) -> bool {
        self.rank(incoming) < self.rank(current)
    }

    /// Compare two sources by precedence; `Less` means `a` wins.
    #[must_use]
    pub fn compare(&self, a: SourceType, b: SourceType) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }
}

impl Default for SourcePriorityManager {
    /// Default ranking: the primary hub first, auxiliary protocol adapters
    /// next, simulated devices last.
    fn default() -> Self {
        Self::new(HashMap::from([
            (SourceType::Hub, 1),
            (SourceType::Router, 2),
            (SourceType::Ups, 3),
            (SourceType::Bluetooth, 4),
            (SourceType::Virtual, 10),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_rank_hub_above_every_other_default_source() {
        let manager = SourcePriorityManager::default();
        for source in [
            SourceType::Router,
            SourceType::Ups,
            SourceType::Bluetooth,
            SourceType::Virtual,
        ] {
            assert!(manager.should_override(source, SourceType::Hub));
            assert!(!manager.should_override(SourceType::Hub, source));
        }
    }

    #[test]
    fn should_return_unranked_for_unconfigured_source() {
        let manager = SourcePriorityManager::new(HashMap::new());
        assert_eq!(manager.rank(SourceType::Hub), UNRANKED);
    }

    #[test]
    fn should_apply_runtime_override() {
        let manager = SourcePriorityManager::default();
        assert!(!manager.should_override(SourceType::Hub, SourceType::Ups));

        manager.set_rank(SourceType::Ups, 0);
        assert!(manager.should_override(SourceType::Hub, SourceType::Ups));
    }

    #[test]
    fn should_order_sources_by_precedence() {
        let manager = SourcePriorityManager::default();
        let order = manager.order();
        assert_eq!(order.first(), Some(&SourceType::Hub));
        assert_eq!(order.last(), Some(&SourceType::Virtual));
    }

    #[test]
    fn should_not_override_when_ranks_are_equal() {
        let manager =
            SourcePriorityManager::new(HashMap::from([(SourceType::Hub, 1), (SourceType::Ups, 1)]));
        assert!(!manager.should_override(SourceType::Hub, SourceType::Ups));
        assert!(!manager.should_override(SourceType::Ups, SourceType::Hub));
        assert_eq!(
            manager.compare(SourceType::Hub, SourceType::Ups),
            Ordering::Equal
        );
    }
}
