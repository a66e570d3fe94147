//! Round history statistics and paged personal/room bet history.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::door::Door;

/// A settled round as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundHistoryEntry {
    pub round_id: String,
    pub result: Vec<Door>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// How often a door came up over a window of rounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorFrequency {
    pub door: Door,
    /// Dice showing this door.
    pub hits: usize,
    /// Share of all dice in the window, 0-100.
    pub percent: f64,
}

/// Append-only list of settled rounds.
#[derive(Debug, Clone, Default)]
pub struct RoundHistory {
    entries: Vec<RoundHistoryEntry>,
    known: HashSet<String>,
}

impl RoundHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append entries not seen before. Returns how many were added.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = RoundHistoryEntry>) -> usize {
        let mut added = 0;
        for entry in entries {
            if self.known.insert(entry.round_id.clone()) {
                self.entries.push(entry);
                added += 1;
            }
        }
        added
    }

    pub fn entries(&self) -> &[RoundHistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.known.clear();
    }

    /// Per-door frequencies over the most recent `window` rounds, in
    /// display order.
    pub fn door_frequencies(&self, window: usize) -> Vec<DoorFrequency> {
        let start = self.entries.len().saturating_sub(window);
        let recent = &self.entries[start..];
        let total: usize = recent.iter().map(|e| e.result.len()).sum();

        Door::ALL
            .iter()
            .map(|&door| {
                let hits = recent
                    .iter()
                    .flat_map(|e| e.result.iter())
                    .filter(|d| **d == door)
                    .count();
                let percent = if total == 0 {
                    0.0
                } else {
                    hits as f64 * 100.0 / total as f64
                };
                DoorFrequency { door, hits, percent }
            })
            .collect()
    }
}

/// Whose wagers to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFilter {
    #[default]
    Mine,
    All,
}

/// One page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub filter: HistoryFilter,
    /// Restrict `All` to one player.
    pub selected_user: Option<String>,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

/// A wager from a settled round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettledWager {
    #[serde(default)]
    pub bet_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub nickname: String,
    pub door: Door,
    pub amount: u64,
    #[serde(default)]
    pub round_id: Option<String>,
    #[serde(default)]
    pub result: Vec<Door>,
    #[serde(default)]
    pub win_amount: u64,
    #[serde(default)]
    pub profit: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Infinite-scroll style pager over settled wagers.
#[derive(Debug, Clone)]
pub struct BetHistoryPager {
    filter: HistoryFilter,
    selected_user: Option<String>,
    page_size: u32,
    next_page: u32,
    has_more: bool,
    in_flight: Option<HistoryQuery>,
    items: Vec<SettledWager>,
}

impl BetHistoryPager {
    pub fn new(page_size: u32) -> Self {
        Self {
            filter: HistoryFilter::Mine,
            selected_user: None,
            page_size: page_size.max(1),
            next_page: 1,
            has_more: true,
            in_flight: None,
            items: Vec::new(),
        }
    }

    /// Start over with a new filter. Always yields a page-1 query, even if
    /// an older request is still outstanding; its reply will be discarded.
    pub fn restart(&mut self, filter: HistoryFilter, selected_user: Option<String>) -> HistoryQuery {
        self.filter = filter;
        self.selected_user = selected_user;
        self.next_page = 1;
        self.has_more = true;
        self.items.clear();
        self.begin()
    }

    /// Next page, unless a request is pending or the list is exhausted.
    pub fn next(&mut self) -> Option<HistoryQuery> {
        if self.in_flight.is_some() || !self.has_more {
            return None;
        }
        Some(self.begin())
    }

    fn begin(&mut self) -> HistoryQuery {
        let query = HistoryQuery {
            filter: self.filter,
            selected_user: self.selected_user.clone(),
            page: self.next_page,
            page_size: self.page_size,
        };
        self.in_flight = Some(query.clone());
        query
    }

    /// Accept the reply to `query`. Stale replies are dropped.
    pub fn receive(&mut self, query: &HistoryQuery, page: Vec<SettledWager>) -> bool {
        if self.in_flight.as_ref() != Some(query) {
            return false;
        }
        self.in_flight = None;
        self.has_more = page.len() as u32 == self.page_size;
        self.next_page = query.page + 1;
        self.items.extend(page);
        true
    }

    /// The request for `query` failed; allow a retry of the same page.
    pub fn fail(&mut self, query: &HistoryQuery) {
        if self.in_flight.as_ref() == Some(query) {
            self.in_flight = None;
        }
    }

    pub fn items(&self) -> &[SettledWager] {
        &self.items
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Sum of profit over loaded items.
    pub fn total_profit(&self) -> i64 {
        self.items.iter().map(|w| w.profit).sum()
    }
}
