//! Engine tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{EngineError, Result};

/// Default number of remote wagers kept in the live feed.
pub const DEFAULT_FEED_CAPACITY: usize = 20;

/// Default time a remote wager stays visible in the live feed (4 seconds).
pub const DEFAULT_FEED_TTL: Duration = Duration::from_secs(4);

/// Default number of remembered rooms.
pub const DEFAULT_RECENT_ROOMS: usize = 3;

/// Default bet-history page size.
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 10;

/// Default number of rounds used for door statistics.
pub const DEFAULT_STATS_WINDOW: usize = 100;

/// Session configuration.
///
/// Every field has a default, so a partial JSON document is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub feed_capacity: usize,
    pub feed_ttl_ms: u64,
    pub recent_rooms_capacity: usize,
    pub history_page_size: u32,
    pub stats_window: usize,
    /// Demote wagers stuck in `pending` after this long. Off when `None`.
    pub pending_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feed_capacity: DEFAULT_FEED_CAPACITY,
            feed_ttl_ms: DEFAULT_FEED_TTL.as_millis() as u64,
            recent_rooms_capacity: DEFAULT_RECENT_ROOMS,
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            stats_window: DEFAULT_STATS_WINDOW,
            pending_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON. Zero capacities are clamped to 1.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::Storage(format!("bad engine config: {e}")))?;
        Ok(config.normalized())
    }

    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity.max(1);
        self
    }

    pub fn with_feed_ttl(mut self, ttl: Duration) -> Self {
        self.feed_ttl_ms = ttl.as_millis() as u64;
        self
    }

    pub fn with_recent_rooms_capacity(mut self, capacity: usize) -> Self {
        self.recent_rooms_capacity = capacity.max(1);
        self
    }

    pub fn with_history_page_size(mut self, size: u32) -> Self {
        self.history_page_size = size.max(1);
        self
    }

    pub fn with_pending_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pending_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn feed_ttl(&self) -> Duration {
        Duration::from_millis(self.feed_ttl_ms)
    }

    pub fn pending_timeout(&self) -> Option<Duration> {
        self.pending_timeout_ms.map(Duration::from_millis)
    }

    fn normalized(mut self) -> Self {
        self.feed_capacity = self.feed_capacity.max(1);
        self.recent_rooms_capacity = self.recent_rooms_capacity.max(1);
        self.history_page_size = self.history_page_size.max(1);
        self.stats_window = self.stats_window.max(1);
        self
    }
}
