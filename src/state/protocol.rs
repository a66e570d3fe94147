//! Wire vocabulary shared with the game server.
//!
//! Inbound events arrive as `(name, json payload)` pairs; outbound requests
//! are encoded the same way and later answered by a [`Reply`].

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::door::Door;
use super::error::{EngineError, Result};
use super::feed::LiveBetEvent;
use super::history::{HistoryQuery, SettledWager};
use super::recent::RecentRoom;
use super::room::{RoomConfig, RoomPatch};

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// `room_update`: partial snapshot.
    RoomUpdate(Box<RoomPatch>),
    /// `game_status` / `phase_change`: raw phase value.
    Phase(String),
    /// `timer_update`: seconds left in the current phase.
    Timer(Option<u32>),
    /// `new_bet`: someone placed a wager.
    RemoteWagerPlaced(LiveBetEvent),
    /// `bet_cancelled`: a wager was withdrawn (possibly our own).
    WagerCancelled { bet_id: String },
    /// `game_result_individual`: settlement for the local participant.
    Settlement(Settlement),
    /// `error_msg`: free-form server complaint.
    ServerMessage(String),
    /// `rooms_info_res`: live occupancy of remembered rooms.
    RoomsInfo(Vec<RecentRoom>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    #[serde(default)]
    pub win_amount: u64,
    #[serde(default)]
    pub net_profit: i64,
    #[serde(default)]
    pub new_balance: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelledPayload {
    bet_id: String,
}

#[derive(Deserialize)]
struct PhasePayload {
    #[serde(alias = "status")]
    phase: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimerPayload {
    time_left: Option<u32>,
}

impl InboundEvent {
    /// Decode a named event. Unknown names and malformed payloads are
    /// reported as [`EngineError::ProtocolMismatch`].
    pub fn decode(name: &str, payload: serde_json::Value) -> Result<Self> {
        let event = match name {
            "room_update" => Self::RoomUpdate(Box::new(RoomPatch::from_json(payload)?)),
            "game_status" | "phase_change" => match payload {
                serde_json::Value::String(phase) => Self::Phase(phase),
                other => Self::Phase(serde_json::from_value::<PhasePayload>(other)?.phase),
            },
            "timer_update" => match payload {
                serde_json::Value::Null => Self::Timer(None),
                serde_json::Value::Number(n) => Self::Timer(Some(
                    n.as_u64()
                        .and_then(|v| u32::try_from(v).ok())
                        .ok_or_else(|| EngineError::protocol(format!("bad timer value {n}")))?,
                )),
                other => Self::Timer(serde_json::from_value::<TimerPayload>(other)?.time_left),
            },
            "new_bet" => Self::RemoteWagerPlaced(serde_json::from_value(payload)?),
            "bet_cancelled" => Self::WagerCancelled {
                bet_id: serde_json::from_value::<CancelledPayload>(payload)?.bet_id,
            },
            "game_result_individual" => Self::Settlement(serde_json::from_value(payload)?),
            "error_msg" => Self::ServerMessage(match payload {
                serde_json::Value::String(message) => message,
                other => other
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown server error")
                    .to_string(),
            }),
            "rooms_info_res" => Self::RoomsInfo(match payload {
                serde_json::Value::Null => Vec::new(),
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .filter_map(|item| match serde_json::from_value(item) {
                        Ok(room) => Some(room),
                        Err(err) => {
                            warn!(error = %err, "protocol mismatch: skipping room info");
                            None
                        }
                    })
                    .collect(),
                other => return Err(EngineError::protocol(format!("rooms info is not a list: {other}"))),
            }),
            other => return Err(EngineError::protocol(format!("unknown event '{other}'"))),
        };
        Ok(event)
    }
}

/// Host and dealer actions. Buttons and gesture detectors both go through
/// the same entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseAction {
    StartGame,
    Shake,
    Reveal,
}

impl PhaseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartGame => "start_game",
            Self::Shake => "shake",
            Self::Reveal => "reveal",
        }
    }
}

/// Requests sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundRequest {
    JoinRoom {
        room_id: String,
        user: serde_json::Value,
        room_config: Option<RoomConfig>,
    },
    LeaveRoom {
        room_id: String,
        user_id: String,
    },
    PlaceBet {
        room_id: String,
        user_id: String,
        doors: Vec<Door>,
        amount: u64,
    },
    CancelBet {
        room_id: String,
        user_id: String,
        bet_id: String,
    },
    BetHistory {
        room_id: String,
        user_id: String,
        query: HistoryQuery,
    },
    PhaseAction {
        room_id: String,
        user_id: String,
        action: PhaseAction,
    },
    /// Answered by a `rooms_info_res` event rather than an acknowledgement.
    RoomsInfo {
        room_ids: Vec<String>,
    },
}

impl OutboundRequest {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::PlaceBet { .. } => "place_bet",
            Self::CancelBet { .. } => "cancel_bet",
            Self::BetHistory { .. } => "get_bet_history",
            Self::PhaseAction { action, .. } => action.as_str(),
            Self::RoomsInfo { .. } => "get_rooms_info",
        }
    }

    /// Encode the payload.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::JoinRoom {
                room_id,
                user,
                room_config,
            } => {
                let mut obj = json!({"roomId": room_id, "userData": user});
                if let Some(config) = room_config {
                    obj["roomConfig"] = json!(config);
                }
                obj
            }
            Self::LeaveRoom { room_id, user_id } => json!({"roomId": room_id, "userId": user_id}),
            Self::PlaceBet {
                room_id,
                user_id,
                doors,
                amount,
            } => json!({
                "roomId": room_id,
                "userId": user_id,
                "doors": doors,
                "amount": amount
            }),
            Self::CancelBet {
                room_id,
                user_id,
                bet_id,
            } => json!({"roomId": room_id, "betId": bet_id, "userId": user_id}),
            Self::BetHistory {
                room_id,
                user_id,
                query,
            } => json!({
                "roomId": room_id,
                "userId": user_id,
                "filterType": query.filter,
                "selectedUserId": query.selected_user.as_deref().unwrap_or("all"),
                "page": query.page,
                "limit": query.page_size
            }),
            Self::PhaseAction {
                room_id, user_id, ..
            } => json!({"roomId": room_id, "userId": user_id}),
            Self::RoomsInfo { room_ids } => json!(room_ids),
        }
    }
}

/// A door the server accepted in a (possibly batched) placement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedBet {
    pub door: Door,
    pub bet_id: String,
}

/// Acknowledgement payloads, one shape per request kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Join {
        success: bool,
        message: Option<String>,
        snapshot: Option<Box<RoomPatch>>,
    },
    Wager {
        success: bool,
        message: Option<String>,
        /// Doors the server accepted; absent doors count as rejected.
        placed: Vec<PlacedBet>,
        new_balance: Option<u64>,
    },
    Cancel {
        success: bool,
        message: Option<String>,
        new_balance: Option<u64>,
    },
    History {
        success: bool,
        data: Vec<SettledWager>,
    },
    Ack {
        success: bool,
        message: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    room: Option<serde_json::Value>,
    #[serde(default)]
    bets: Vec<PlacedBet>,
    #[serde(default)]
    door: Option<Door>,
    #[serde(default)]
    bet_id: Option<String>,
    #[serde(default)]
    new_balance: Option<u64>,
    #[serde(default)]
    data: Vec<SettledWager>,
}

impl Reply {
    /// Decode an acknowledgement for a request of the given kind.
    ///
    /// Single placements may answer with a top-level `door`/`betId` pair
    /// instead of a `bets` list.
    pub fn decode(request: &OutboundRequest, payload: serde_json::Value) -> Result<Self> {
        let raw: RawReply = serde_json::from_value(payload)?;
        let reply = match request {
            OutboundRequest::JoinRoom { .. } => Self::Join {
                success: raw.success,
                message: raw.message,
                snapshot: raw
                    .room
                    .map(RoomPatch::from_json)
                    .transpose()?
                    .map(Box::new),
            },
            OutboundRequest::PlaceBet { doors, .. } => {
                let mut placed = raw.bets;
                if placed.is_empty() {
                    if let Some(bet_id) = raw.bet_id {
                        let door = raw.door.or_else(|| match doors.as_slice() {
                            [only] => Some(*only),
                            _ => None,
                        });
                        if let Some(door) = door {
                            placed.push(PlacedBet { door, bet_id });
                        }
                    }
                }
                Self::Wager {
                    success: raw.success,
                    message: raw.message,
                    placed,
                    new_balance: raw.new_balance,
                }
            }
            OutboundRequest::CancelBet { .. } => Self::Cancel {
                success: raw.success,
                message: raw.message,
                new_balance: raw.new_balance,
            },
            OutboundRequest::BetHistory { .. } => Self::History {
                success: raw.success,
                data: raw.data,
            },
            OutboundRequest::LeaveRoom { .. }
            | OutboundRequest::PhaseAction { .. }
            | OutboundRequest::RoomsInfo { .. } => Self::Ack {
                success: raw.success,
                message: raw.message,
            },
        };
        Ok(reply)
    }

    pub fn is_success(&self) -> bool {
        match self {
            Self::Join { success, .. }
            | Self::Wager { success, .. }
            | Self::Cancel { success, .. }
            | Self::History { success, .. }
            | Self::Ack { success, .. } => *success,
        }
    }
}
