//! Room mirror.
//!
//! Holds the last known authoritative room snapshot and merges inbound
//! patches into it field by field. A field carried by a patch (even as
//! `null`) overwrites; an absent field keeps its previous value, so a timer
//! tick never wipes membership and a membership push never wipes the timer.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::door::{DiceResult, Door};
use super::history::RoundHistoryEntry;
use super::phase::{Phase, PhaseTransition};

/// How the dealer seat moves between players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealerMode {
    Fixed,
    #[default]
    Rotate,
}

/// Whether rounds advance on a server timer or on dealer actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    #[default]
    Auto,
    Manual,
}

/// Table configuration chosen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomConfig {
    pub name: String,
    pub max_players: u32,
    pub starting_balance: u64,
    pub dealer_mode: DealerMode,
    pub rotate_rounds: u32,
    pub play_mode: PlayMode,
    pub min_bet: u64,
    pub max_bet: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_players: 15,
            starting_balance: 100_000,
            dealer_mode: DealerMode::Rotate,
            rotate_rounds: 3,
            play_mode: PlayMode::Auto,
            min_bet: 5_000,
            max_bet: 50_000,
        }
    }
}

/// Selectable bet limits offered to a host, derived from the starting balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetLimitOptions {
    pub min_options: [u64; 3],
    pub max_options: [u64; 3],
}

impl RoomConfig {
    /// Min bet at 2.5%, 5%, 10% and max bet at 50%, 75%, 100% of the
    /// starting balance.
    pub fn bet_limit_options(&self) -> BetLimitOptions {
        let b = self.starting_balance;
        BetLimitOptions {
            min_options: [b / 40, b / 20, b / 10],
            max_options: [b / 2, b * 3 / 4, b],
        }
    }

    /// Apply the default limits for the current starting balance.
    pub fn with_default_limits(mut self) -> Self {
        let options = self.bet_limit_options();
        self.min_bet = options.min_options[0];
        self.max_bet = options.max_options[0];
        self
    }
}

/// A player seated in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub current_balance: u64,
    #[serde(default = "default_online")]
    pub is_online: bool,
    #[serde(default)]
    pub init_balance: u64,
}

fn default_online() -> bool {
    true
}

impl Member {
    /// Net result since joining.
    pub fn profit(&self) -> i64 {
        self.current_balance as i64 - self.init_balance as i64
    }
}

/// Mirror of the authoritative room state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoomSnapshot {
    pub room_id: Option<String>,
    pub host_id: Option<String>,
    pub phase: Phase,
    pub config: RoomConfig,
    pub current_dealer_id: Option<String>,
    pub last_round_result: Option<DiceResult>,
    pub total_bets_by_door: BTreeMap<Door, u64>,
    pub time_left: Option<u32>,
    pub members: Vec<Member>,
}

impl RoomSnapshot {
    pub fn total_on(&self, door: Door) -> u64 {
        self.total_bets_by_door.get(&door).copied().unwrap_or(0)
    }

    pub fn has_room(&self) -> bool {
        self.room_id.is_some()
    }
}

/// A partial room update as received from the server.
///
/// Each field is `None` when absent and `Some(None)` when explicitly `null`.
/// Fields are decoded one at a time: a malformed field is logged and treated
/// as absent, so one bad value never loses the rest of the update. `phase`
/// stays a raw string so an unknown value can be ignored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoomPatch {
    pub room_id: Option<Option<String>>,
    pub host_id: Option<Option<String>>,
    pub phase: Option<Option<String>>,
    pub config: Option<Option<RoomConfig>>,
    pub current_dealer_id: Option<Option<String>>,
    pub last_round_result: Option<Option<DiceResult>>,
    pub total_bets_by_door: Option<Option<BTreeMap<Door, u64>>>,
    pub time_left: Option<Option<u32>>,
    pub members: Option<Option<Vec<Member>>>,
    /// Consumed by the round history, not by the mirror.
    pub history: Option<Option<Vec<RoundHistoryEntry>>>,
}

impl RoomPatch {
    /// A patch that only carries a phase value.
    pub fn phase(raw: impl Into<String>) -> Self {
        Self {
            phase: Some(Some(raw.into())),
            ..Default::default()
        }
    }

    /// Decode a patch. Fails only when the payload is not an object.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    fn from_map(mut map: Map<String, Value>) -> Self {
        Self {
            room_id: decode_field(&mut map, "roomId", Some("id")),
            host_id: decode_field(&mut map, "hostId", None),
            phase: take_field(&mut map, "phase", Some("status")).map(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            }),
            config: decode_field(&mut map, "config", Some("roomConfig")),
            current_dealer_id: decode_field(&mut map, "currentDealerId", Some("currentDealer")),
            last_round_result: decode_field(&mut map, "lastRoundResult", Some("lastResult")),
            total_bets_by_door: decode_door_totals(&mut map),
            time_left: decode_field(&mut map, "timeLeft", None),
            members: decode_list(&mut map, "members"),
            history: decode_list(&mut map, "history"),
        }
    }
}

impl<'de> Deserialize<'de> for RoomPatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Self::from_map)
    }
}

/// Value under `key`, else under `alias`. A non-null `key` wins; a `null`
/// `key` yields to a present `alias`.
fn take_field(map: &mut Map<String, Value>, key: &str, alias: Option<&str>) -> Option<Value> {
    let primary = map.remove(key);
    let secondary = alias.and_then(|a| map.remove(a));
    match (primary, secondary) {
        (Some(p), _) if !p.is_null() => Some(p),
        (p, Some(s)) => {
            if p.is_some() {
                debug!(key, "null field superseded by its alias");
            }
            Some(s)
        }
        (p, None) => p,
    }
}

fn decode_field<T: DeserializeOwned>(
    map: &mut Map<String, Value>,
    key: &str,
    alias: Option<&str>,
) -> Option<Option<T>> {
    let value = take_field(map, key, alias)?;
    if value.is_null() {
        return Some(None);
    }
    match serde_json::from_value(value) {
        Ok(v) => Some(Some(v)),
        Err(err) => {
            warn!(field = key, error = %err, "protocol mismatch: dropping field");
            None
        }
    }
}

/// A list where undecodable items are skipped one by one.
fn decode_list<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<Option<Vec<T>>> {
    match map.remove(key)? {
        Value::Null => Some(None),
        Value::Array(items) => Some(Some(
            items
                .into_iter()
                .filter_map(|item| match serde_json::from_value(item) {
                    Ok(v) => Some(v),
                    Err(err) => {
                        warn!(field = key, error = %err, "protocol mismatch: skipping item");
                        None
                    }
                })
                .collect(),
        )),
        other => {
            warn!(field = key, value = %other, "protocol mismatch: expected a list");
            None
        }
    }
}

/// Door totals with unknown doors and bad amounts skipped.
fn decode_door_totals(map: &mut Map<String, Value>) -> Option<Option<BTreeMap<Door, u64>>> {
    match take_field(map, "totalBetsByDoor", Some("totalBets"))? {
        Value::Null => Some(None),
        Value::Object(entries) => Some(Some(
            entries
                .into_iter()
                .filter_map(|(door, amount)| {
                    match (door.parse::<Door>(), amount.as_u64()) {
                        (Ok(door), Some(amount)) => Some((door, amount)),
                        _ => {
                            warn!(%door, %amount, "protocol mismatch: skipping door total");
                            None
                        }
                    }
                })
                .collect(),
        )),
        other => {
            warn!(value = %other, "protocol mismatch: door totals are not an object");
            None
        }
    }
}

/// What a patch changed that the session must react to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatchOutcome {
    pub transition: Option<PhaseTransition>,
    pub members_changed: bool,
    /// The patch carried a phase value that was not understood.
    pub phase_mismatch: Option<String>,
}

/// Owner of the room snapshot.
#[derive(Debug, Default)]
pub struct RoomMirror {
    snapshot: RoomSnapshot,
    /// First-seen order of each member, for leaderboard tie breaks.
    join_order: HashMap<String, u64>,
    next_join_seq: u64,
}

impl RoomMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &RoomSnapshot {
        &self.snapshot
    }

    pub fn phase(&self) -> Phase {
        self.snapshot.phase
    }

    pub fn config(&self) -> &RoomConfig {
        &self.snapshot.config
    }

    pub fn room_id(&self) -> Option<&str> {
        self.snapshot.room_id.as_deref()
    }

    /// Merge a patch. Never fails; unknown phases keep the previous phase.
    pub fn apply_patch(&mut self, patch: RoomPatch) -> PatchOutcome {
        let mut outcome = PatchOutcome::default();
        let snap = &mut self.snapshot;

        if let Some(v) = patch.room_id {
            snap.room_id = v;
        }
        if let Some(v) = patch.host_id {
            snap.host_id = v;
        }
        if let Some(v) = patch.config {
            snap.config = v.unwrap_or_default();
        }
        if let Some(v) = patch.current_dealer_id {
            snap.current_dealer_id = v;
        }
        if let Some(v) = patch.last_round_result {
            snap.last_round_result = v;
        }
        if let Some(v) = patch.total_bets_by_door {
            snap.total_bets_by_door = v.unwrap_or_default();
        }
        if let Some(v) = patch.time_left {
            snap.time_left = v;
        }
        if let Some(v) = patch.members {
            let members = v.unwrap_or_default();
            outcome.members_changed = members != snap.members;
            snap.members = members;
            self.track_join_order();
        }

        if let Some(raw) = patch.phase {
            match raw.as_deref().and_then(Phase::parse) {
                Some(next) => outcome.transition = self.set_phase(next),
                None => {
                    let shown = raw.unwrap_or_else(|| "null".to_string());
                    warn!(phase = %shown, "protocol mismatch: unknown phase, keeping {}", self.snapshot.phase);
                    outcome.phase_mismatch = Some(shown);
                }
            }
        }

        outcome
    }

    /// Apply a standalone phase value (`game_status` / `phase_change`).
    pub fn apply_phase(&mut self, raw: &str) -> PatchOutcome {
        self.apply_patch(RoomPatch::phase(raw))
    }

    /// Per-second countdown. Touches nothing but `time_left`.
    pub fn apply_timer(&mut self, seconds: Option<u32>) {
        self.snapshot.time_left = seconds;
    }

    fn set_phase(&mut self, next: Phase) -> Option<PhaseTransition> {
        let transition = PhaseTransition::new(self.snapshot.phase, next)?;
        if !transition.from.expects(next) {
            debug!(%transition, "unexpected phase successor");
        }
        self.snapshot.phase = next;
        Some(transition)
    }

    fn track_join_order(&mut self) {
        for member in &self.snapshot.members {
            if !self.join_order.contains_key(&member.user_id) {
                self.join_order
                    .insert(member.user_id.clone(), self.next_join_seq);
                self.next_join_seq += 1;
            }
        }
    }

    /// Forget everything and start from a fresh `waiting` snapshot.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Leave the room after it dissolved. The phase stays as observed.
    pub fn drop_room(&mut self) {
        let phase = self.snapshot.phase;
        self.reset();
        self.snapshot.phase = phase;
    }

    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.snapshot.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn is_host(&self, user_id: &str) -> bool {
        self.snapshot.host_id.as_deref() == Some(user_id)
    }

    pub fn is_dealer(&self, user_id: &str) -> bool {
        self.snapshot.current_dealer_id.as_deref() == Some(user_id)
    }

    /// Members by balance, richest first; ties keep join order.
    pub fn leaderboard(&self) -> Vec<&Member> {
        let mut ranked: Vec<&Member> = self.snapshot.members.iter().collect();
        ranked.sort_by_key(|m| {
            (
                std::cmp::Reverse(m.current_balance),
                self.join_order.get(&m.user_id).copied().unwrap_or(u64::MAX),
            )
        });
        ranked
    }

    /// 1-based leaderboard position.
    pub fn rank_of(&self, user_id: &str) -> Option<usize> {
        self.leaderboard()
            .iter()
            .position(|m| m.user_id == user_id)
            .map(|i| i + 1)
    }

    pub fn online_count(&self) -> usize {
        self.snapshot.members.iter().filter(|m| m.is_online).count()
    }

    /// Convert to JSON for UI consumers.
    pub fn to_json(&self) -> serde_json::Value {
        let snap = &self.snapshot;
        let totals: serde_json::Map<String, serde_json::Value> = snap
            .total_bets_by_door
            .iter()
            .map(|(door, amount)| (door.to_string(), serde_json::json!(amount)))
            .collect();

        serde_json::json!({
            "roomId": snap.room_id,
            "hostId": snap.host_id,
            "phase": snap.phase.as_str(),
            "config": snap.config,
            "currentDealerId": snap.current_dealer_id,
            "lastRoundResult": snap.last_round_result,
            "totalBetsByDoor": totals,
            "timeLeft": snap.time_left,
            "members": snap.members
        })
    }
}
