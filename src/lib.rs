//! Bau Cua State Library
//!
//! Client-side state engine for the Bau Cua multiplayer dice table.
//!
//! # Overview
//!
//! The state module provides:
//!
//! - **Room Mirror** - A local copy of the server's authoritative room
//!   snapshot, merged field by field from partial updates.
//!
//! - **Phase Machine** - The round lifecycle (waiting, betting, shaking,
//!   result, finished) and what each transition clears.
//!
//! - **Wager Ledger** - Optimistic placement, server confirmation or
//!   rollback, and cancellation during the betting window.
//!
//! - **Live Feed** - Other players' wagers, bounded and short-lived.
//!
//! - **Persistence** - Player identity and recently visited rooms.
//!
//! # Design Principles
//!
//! 1. **The server is authoritative** - Local state is either a mirror of it
//!    or an optimistic guess that the server confirms or rolls back.
//!
//! 2. **One writer** - Every mutation goes through [`GameSession`], one
//!    message at a time.
//!
//! 3. **No networking** - Requests go out through the [`Transport`] trait and
//!    replies are fed back in by the host application.
//!
//! 4. **Serialization-ready** - Wire shapes decode with serde; snapshots
//!    convert to JSON for clients.
//!
//! # Example
//!
//! ```rust
//! use baucua_state::{Door, EngineConfig, GameSession, MemoryStore, MemoryTransport, Phase};
//!
//! let mut session =
//!     GameSession::new(MemoryTransport::new(), MemoryStore::new(), EngineConfig::default())
//!         .unwrap();
//! assert_eq!(session.phase(), Phase::Waiting);
//!
//! session.handle_wire(
//!     "room_update",
//!     serde_json::json!({"roomId": "1234", "status": "betting"}),
//! );
//! assert!(session.can_place());
//!
//! let pending = session.place_wager(Door::Bau, 10_000).unwrap();
//! assert_eq!(pending.handles.len(), 1);
//! assert_eq!(session.ledger().total_on(Door::Bau), 10_000);
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
