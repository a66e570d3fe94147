//! Wager ledger for the local participant's current round.
//!
//! Wagers are applied optimistically: a record is added as `Pending` and
//! counted in its door total before the server answers. Each record then
//! moves exactly once to `Confirmed` (kept) or `Rejected` (removed, total
//! restored). Confirmed records can later be cancelled while betting is open.
//!
//! Invariant: for every door, `total_on(door)` equals the sum of the amounts
//! of the live records on that door.
//!
//! ```text
//!   place ──▶ Pending ──confirm──▶ Confirmed ──cancel ok──▶ (removed)
//!                │                     │
//!                └──reject/timeout──▶ (removed)   cancel failed: unchanged
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::door::Door;
use super::error::{EngineError, Result};
use super::phase::Phase;

/// Correlates a local wager with the server's eventual reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WagerHandle(u64);

impl fmt::Display for WagerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wager#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WagerStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
}

/// Why a pending wager was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Server(String),
    Timeout,
    /// The request could not be sent.
    Transport,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(message) => write!(f, "{}", message),
            Self::Timeout => write!(f, "no response from server"),
            Self::Transport => write!(f, "request could not be sent"),
        }
    }
}

/// One wager placed by the local participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WagerRecord {
    pub handle: WagerHandle,
    /// Server id once confirmed, a `local-` placeholder before.
    pub bet_id: String,
    pub door: Door,
    pub amount: u64,
    pub status: WagerStatus,
    pub placed_at: DateTime<Utc>,
    /// A cancellation request is outstanding.
    pub cancelling: bool,
}

impl WagerRecord {
    /// Whether `bet_id` is still the local placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.bet_id.starts_with(PLACEHOLDER_PREFIX)
    }
}

const PLACEHOLDER_PREFIX: &str = "local-";

/// Table limits and balance a placement is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WagerLimits {
    pub min_bet: u64,
    pub max_bet: u64,
    /// Authoritative balance; pending amounts are subtracted by the ledger.
    pub balance: u64,
}

/// Result of applying a server reply to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    Applied(WagerRecord),
    /// Unknown handle or already settled; nothing changed.
    Ignored,
}

impl Reconciled {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[derive(Debug, Default)]
pub struct WagerLedger {
    records: Vec<WagerRecord>,
    totals: BTreeMap<Door, u64>,
    next_handle: u64,
}

impl WagerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance left for new wagers once in-flight ones are accounted for.
    pub fn available_balance(&self, balance: u64) -> u64 {
        balance.saturating_sub(self.pending_total())
    }

    /// Highest stake currently allowed on a single door.
    pub fn ceiling(&self, limits: &WagerLimits) -> u64 {
        limits.max_bet.min(self.available_balance(limits.balance))
    }

    fn validate(&self, amount: u64, limits: &WagerLimits, phase: Phase) -> Result<()> {
        if !phase.allows_placement() {
            return Err(EngineError::invalid_wager(format!(
                "betting is closed (phase is {phase})"
            )));
        }
        if amount == 0 {
            return Err(EngineError::invalid_wager("amount must be positive"));
        }
        if amount < limits.min_bet {
            return Err(EngineError::invalid_wager(format!(
                "amount {amount} is below the table minimum {}",
                limits.min_bet
            )));
        }
        let ceiling = self.ceiling(limits);
        if amount > ceiling {
            return Err(EngineError::invalid_wager(format!(
                "amount {amount} exceeds the limit {ceiling}"
            )));
        }
        Ok(())
    }

    /// Optimistically record a wager.
    pub fn place(
        &mut self,
        door: Door,
        amount: u64,
        limits: &WagerLimits,
        phase: Phase,
        now: DateTime<Utc>,
    ) -> Result<WagerHandle> {
        self.validate(amount, limits, phase)?;
        Ok(self.insert(door, amount, now))
    }

    /// Place the same amount on several doors. All or nothing: if any door
    /// fails validation, nothing is recorded.
    pub fn place_batch(
        &mut self,
        doors: &[Door],
        amount: u64,
        limits: &WagerLimits,
        phase: Phase,
        now: DateTime<Utc>,
    ) -> Result<Vec<WagerHandle>> {
        if doors.is_empty() {
            return Err(EngineError::invalid_wager("no door selected"));
        }
        for (i, door) in doors.iter().enumerate() {
            if doors[..i].contains(door) {
                return Err(EngineError::invalid_wager(format!("door {door} selected twice")));
            }
        }
        self.validate(amount, limits, phase)?;

        let total = amount.saturating_mul(doors.len() as u64);
        let available = self.available_balance(limits.balance);
        if total > available {
            return Err(EngineError::invalid_wager(format!(
                "batch total {total} exceeds available balance {available}"
            )));
        }

        Ok(doors
            .iter()
            .map(|door| self.insert(*door, amount, now))
            .collect())
    }

    fn insert(&mut self, door: Door, amount: u64, now: DateTime<Utc>) -> WagerHandle {
        self.next_handle += 1;
        let handle = WagerHandle(self.next_handle);
        self.records.push(WagerRecord {
            handle,
            bet_id: format!("{PLACEHOLDER_PREFIX}{}", Uuid::new_v4()),
            door,
            amount,
            status: WagerStatus::Pending,
            placed_at: now,
            cancelling: false,
        });
        *self.totals.entry(door).or_insert(0) += amount;
        debug!(%handle, %door, amount, "wager pending");
        self.debug_check();
        handle
    }

    /// Promote a pending wager. A repeated confirmation is a no-op.
    pub fn confirm(&mut self, handle: WagerHandle, server_bet_id: &str) -> Reconciled {
        let Some(record) = self.records.iter_mut().find(|r| r.handle == handle) else {
            debug!(%handle, "confirmation for unknown wager ignored");
            return Reconciled::Ignored;
        };
        if record.status != WagerStatus::Pending {
            return Reconciled::Ignored;
        }
        record.status = WagerStatus::Confirmed;
        record.bet_id = server_bet_id.to_string();
        debug!(%handle, bet_id = server_bet_id, "wager confirmed");
        Reconciled::Applied(record.clone())
    }

    /// Roll back a pending wager.
    pub fn reject(&mut self, handle: WagerHandle, reason: &RejectReason) -> Reconciled {
        let Some(index) = self.records.iter().position(|r| r.handle == handle) else {
            return Reconciled::Ignored;
        };
        if self.records[index].status != WagerStatus::Pending {
            warn!(%handle, %reason, "rejection for a settled wager ignored");
            return Reconciled::Ignored;
        }
        let mut record = self.remove_at(index);
        record.status = WagerStatus::Rejected;
        debug!(%handle, %reason, "wager rejected");
        Reconciled::Applied(record)
    }

    /// Mark a confirmed wager as having a cancellation in flight.
    pub fn begin_cancellation(&mut self, bet_id: &str, phase: Phase) -> Result<&WagerRecord> {
        if !phase.allows_cancellation() {
            return Err(EngineError::CancellationWindowClosed { phase });
        }
        let record = self
            .records
            .iter_mut()
            .find(|r| r.bet_id == bet_id && r.status == WagerStatus::Confirmed)
            .ok_or_else(|| EngineError::invalid_wager(format!("no confirmed wager {bet_id}")))?;
        if record.cancelling {
            return Err(EngineError::invalid_wager(format!(
                "cancellation of {bet_id} already requested"
            )));
        }
        record.cancelling = true;
        Ok(&*record)
    }

    /// Remove a confirmed wager after the server cancelled it.
    ///
    /// Also used for server-initiated cancellations, so no prior
    /// `begin_cancellation` is required.
    pub fn complete_cancellation(&mut self, bet_id: &str) -> Reconciled {
        let Some(index) = self
            .records
            .iter()
            .position(|r| r.bet_id == bet_id && r.status == WagerStatus::Confirmed)
        else {
            return Reconciled::Ignored;
        };
        let mut record = self.remove_at(index);
        record.status = WagerStatus::Cancelled;
        record.cancelling = false;
        debug!(bet_id, "wager cancelled");
        Reconciled::Applied(record)
    }

    /// The server refused the cancellation; the wager stays as it was.
    pub fn abort_cancellation(&mut self, bet_id: &str) {
        if let Some(record) = self.records.iter_mut().find(|r| r.bet_id == bet_id) {
            record.cancelling = false;
        }
    }

    /// Reject pending wagers older than `timeout`.
    pub fn expire_pending(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<WagerRecord> {
        let stale: Vec<WagerHandle> = self
            .records
            .iter()
            .filter(|r| r.status == WagerStatus::Pending)
            .filter(|r| (now - r.placed_at).to_std().is_ok_and(|age| age >= timeout))
            .map(|r| r.handle)
            .collect();

        stale
            .into_iter()
            .filter_map(|handle| match self.reject(handle, &RejectReason::Timeout) {
                Reconciled::Applied(record) => Some(record),
                Reconciled::Ignored => None,
            })
            .collect()
    }

    fn remove_at(&mut self, index: usize) -> WagerRecord {
        let record = self.records.remove(index);
        if let Some(total) = self.totals.get_mut(&record.door) {
            debug_assert!(*total >= record.amount, "door total would go negative");
            *total = total.saturating_sub(record.amount);
            if *total == 0 {
                self.totals.remove(&record.door);
            }
        }
        self.debug_check();
        record
    }

    /// Drop every record. Only the phase policy calls this.
    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.totals.clear();
    }

    fn debug_check(&self) {
        debug_assert!(self.totals_consistent(), "ledger totals diverged from records");
    }

    /// Whether door totals match the live records.
    pub fn totals_consistent(&self) -> bool {
        let mut expected: BTreeMap<Door, u64> = BTreeMap::new();
        for record in &self.records {
            *expected.entry(record.door).or_insert(0) += record.amount;
        }
        expected == self.totals
    }

    pub fn records(&self) -> &[WagerRecord] {
        &self.records
    }

    pub fn get(&self, handle: WagerHandle) -> Option<&WagerRecord> {
        self.records.iter().find(|r| r.handle == handle)
    }

    pub fn find_by_bet_id(&self, bet_id: &str) -> Option<&WagerRecord> {
        self.records.iter().find(|r| r.bet_id == bet_id)
    }

    pub fn total_on(&self, door: Door) -> u64 {
        self.totals.get(&door).copied().unwrap_or(0)
    }

    pub fn totals(&self) -> &BTreeMap<Door, u64> {
        &self.totals
    }

    pub fn pending_total(&self) -> u64 {
        self.sum_where(WagerStatus::Pending)
    }

    pub fn confirmed_total(&self) -> u64 {
        self.sum_where(WagerStatus::Confirmed)
    }

    pub fn total_staked(&self) -> u64 {
        self.totals.values().sum()
    }

    fn sum_where(&self, status: WagerStatus) -> u64 {
        self.records
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.amount)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
