//! State management for the Bau Cua table client.
//!
//! This module provides the state types and the engine that owns them:
//!
//! - `session` - The engine: routes events, replies, actions and ticks
//! - `room` - Mirror of the server's room snapshot and member leaderboard
//! - `phase` - Round phase machine and the effects of each transition
//! - `ledger` - Optimistic wager ledger (pending / confirmed / cancelling)
//! - `feed` - Bounded, expiring feed of other players' wagers
//! - `identity`, `recent`, `persist` - What survives a restart
//! - `history` - Round results and paged personal bet history
//! - `protocol`, `transport` - Wire events and the outbound seam
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            GameSession                               │
//! │                                                                      │
//! │  server event ──▶ InboundEvent ──▶ RoomMirror ──▶ PhaseTransition    │
//! │                                        │               │             │
//! │                                        ▼               ▼             │
//! │                              members / balance   clear ledger+feed   │
//! │                                                                      │
//! │  user action ──▶ WagerLedger (pending) ──▶ Transport ──▶ server      │
//! │                        ▲                                   │         │
//! │                        └──── Reply (confirm / reject) ◀────┘         │
//! │                                                                      │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐    │
//! │  │ IdentityStore│  │ RecentRooms  │──│ SessionStore ("session") │    │
//! │  └──────────────┘  └──────────────┘  └──────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use baucua_state::state::{Door, EngineConfig, GameSession, MemoryStore, MemoryTransport};
//!
//! let mut session = GameSession::new(MemoryTransport::new(), MemoryStore::new(), EngineConfig::default())?;
//! let join = session.join_room("1234", None)?;
//! // ... the host application feeds the acknowledgement back:
//! session.handle_reply_json(join, ack_payload)?;
//! session.handle_wire("game_status", serde_json::json!("betting"));
//! let pending = session.place_wager(Door::Bau, 10_000)?;
//! ```

pub mod chips;
pub mod config;
pub mod door;
pub mod error;
pub mod feed;
pub mod history;
pub mod identity;
pub mod ledger;
pub mod persist;
pub mod phase;
pub mod protocol;
pub mod recent;
pub mod room;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use chips::{compute_chip_set, round_to_denomination, ChipSet};
pub use config::EngineConfig;
pub use door::{DiceResult, Door, UnknownDoor, DICE_PER_ROUND};
pub use error::{EngineError, Result};
pub use feed::{LiveBetEvent, LiveFeed};
pub use history::{
    BetHistoryPager, DoorFrequency, HistoryFilter, HistoryQuery, RoundHistory, RoundHistoryEntry,
    SettledWager,
};
pub use identity::{IdentityStore, Participant, ProfileUpdate, DEFAULT_AVATAR, DEFAULT_BALANCE};
pub use ledger::{
    Reconciled, RejectReason, WagerHandle, WagerLedger, WagerLimits, WagerRecord, WagerStatus,
};
pub use persist::{FileStore, MemoryStore, PersistedSession, SessionStore, SESSION_KEY};
pub use phase::{Phase, PhaseTransition, TransitionEffects};
pub use protocol::{InboundEvent, OutboundRequest, PhaseAction, PlacedBet, Reply, Settlement};
pub use recent::{RecentRoom, RecentRooms};
pub use room::{
    BetLimitOptions, DealerMode, Member, PlayMode, RoomConfig, RoomMirror, RoomPatch,
    RoomSnapshot,
};
pub use session::{GameSession, Notification, PendingWager};
pub use transport::{ConnectionStatus, MemoryTransport, RequestId, RequestTracker, Transport};
