//! Live activity feed of other players' wagers.
//!
//! Purely ambient: entries expire after a short TTL, the oldest are dropped
//! past the capacity bound, and losing an entry is never an error.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::{DEFAULT_FEED_CAPACITY, DEFAULT_FEED_TTL};
use super::door::Door;

/// A wager placed by someone else in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBetEvent {
    pub bet_id: String,
    pub user_id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub avatar: String,
    pub door: Door,
    pub amount: u64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub event: LiveBetEvent,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LiveFeed {
    entries: VecDeque<FeedEntry>,
    capacity: usize,
    ttl: Duration,
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY, DEFAULT_FEED_TTL)
    }
}

impl LiveFeed {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Record a remote wager received at `now`.
    ///
    /// Returns false when the event belongs to `local_user_id`; the feed only
    /// shows other players.
    pub fn record(&mut self, event: LiveBetEvent, local_user_id: &str, now: DateTime<Utc>) -> bool {
        if event.user_id == local_user_id {
            return false;
        }
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::zero());
        self.entries.push_back(FeedEntry {
            event,
            expires_at: now + ttl,
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    /// Retract a wager the server reported as cancelled.
    pub fn remove_by_bet_id(&mut self, bet_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.event.bet_id != bet_id);
        self.entries.len() != before
    }

    /// Drop entries whose TTL has elapsed. Returns how many were removed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.expires_at > now);
        before - self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest first.
    pub fn events(&self) -> impl Iterator<Item = &LiveBetEvent> {
        self.entries.iter().map(|e| &e.event)
    }

    /// Events still visible at `now`, oldest first.
    pub fn visible_at(&self, now: DateTime<Utc>) -> impl Iterator<Item = &LiveBetEvent> {
        self.entries
            .iter()
            .filter(move |e| e.expires_at > now)
            .map(|e| &e.event)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
