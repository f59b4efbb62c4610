//! State owned by a single harvest run.

use crate::models::HarvestConfig;
use crate::network::{NetworkCache, NetworkObserver, NetworkSession};
use crate::pagination::PaginationController;

use super::Accumulator;

/// Everything a run mutates. Created fresh when a run starts and dropped
/// when it ends, which also ends its network subscription.
#[derive(Debug)]
pub struct HarvestSession {
    pub network: NetworkSession,
    pub pager: PaginationController,
    pub accumulator: Accumulator,
    pub pages_visited: u32,
    pub empty_streak: u32,
}

impl HarvestSession {
    pub fn new(config: &HarvestConfig, observer: &dyn NetworkObserver) -> Self {
        Self {
            network: NetworkSession::new(observer, NetworkCache::new(config.cache.freshness())),
            pager: PaginationController::new(config),
            accumulator: Accumulator::new(),
            pages_visited: 0,
            empty_streak: 0,
        }
    }
}
