//! Round phase and the policy applied when it changes.
//!
//! The server owns the phase; the client only observes transitions and
//! decides what local state must be reset or locked.
//!
//! # State Diagram
//!
//! ```text
//!  (no room) ──┐
//!              ▼
//!        ┌──────────┐   start   ┌──────────┐  lock  ┌──────────┐
//!   ┌───▶│ Waiting  │──────────▶│ Betting  │───────▶│ Shaking  │
//!   │    └──────────┘           └──────────┘        └────┬─────┘
//!   │          ▲                      ▲                  │ reveal
//!   │          │ next round           │ next round       │
//!   │          │                ┌─────┴────┐             │
//!   │          └────────────────┤  Result  │◀────────────┘
//!   │                           └─────┬────┘
//!   │                                 │ dissolve
//!   │                           ┌─────▼────┐
//!   └───────────────────────────│ Finished │
//!                               └──────────┘
//! ```
//!
//! | From  | To       | Effect                                         |
//! |-------|----------|------------------------------------------------|
//! | any   | betting  | clear ledger, clear feed, enable wagers        |
//! | any   | shaking  | lock placement and cancellation                |
//! | any   | result   | reveal last result, keep ledger for settlement |
//! | any   | finished | clear ledger, clear feed, drop room            |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current stage of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Waiting,
    Betting,
    Shaking,
    Result,
    Finished,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Betting => "betting",
            Self::Shaking => "shaking",
            Self::Result => "result",
            Self::Finished => "finished",
        }
    }

    /// Parse a wire value. Unknown strings yield `None` so the caller can
    /// keep its previous phase.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(Self::Waiting),
            "betting" => Some(Self::Betting),
            "shaking" => Some(Self::Shaking),
            "result" => Some(Self::Result),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }

    /// Wagers may be placed.
    pub fn allows_placement(&self) -> bool {
        matches!(self, Self::Betting)
    }

    /// Confirmed wagers may be cancelled.
    pub fn allows_cancellation(&self) -> bool {
        matches!(self, Self::Betting)
    }

    /// Whether `next` is the successor the normal round cycle expects.
    ///
    /// The server is authoritative, so an unexpected successor is still
    /// applied; this only drives diagnostics.
    pub fn expects(&self, next: Phase) -> bool {
        use Phase::*;

        match (self, next) {
            (_, Betting) | (_, Finished) | (_, Waiting) => true,
            (Betting, Shaking) => true,
            (Shaking, Result) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An observed phase change. Only produced when the value actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
}

impl PhaseTransition {
    pub fn new(from: Phase, to: Phase) -> Option<Self> {
        (from != to).then_some(Self { from, to })
    }

    /// Side effects the local session must perform.
    pub fn effects(&self) -> TransitionEffects {
        match self.to {
            Phase::Betting => TransitionEffects {
                clear_ledger: true,
                clear_feed: true,
                ..Default::default()
            },
            Phase::Result => TransitionEffects {
                reveal_result: true,
                ..Default::default()
            },
            Phase::Finished => TransitionEffects::room_left(),
            Phase::Shaking | Phase::Waiting => TransitionEffects::default(),
        }
    }
}

impl fmt::Display for PhaseTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// What a transition requires of the session.
///
/// Placement and cancellation locks are not listed: they follow directly
/// from [`Phase::allows_placement`] on the new phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionEffects {
    pub clear_ledger: bool,
    pub clear_feed: bool,
    pub drop_room: bool,
    pub reveal_result: bool,
}

impl TransitionEffects {
    /// Losing the room, by dissolution or by leaving it.
    pub fn room_left() -> Self {
        Self {
            clear_ledger: true,
            clear_feed: true,
            drop_room: true,
            reveal_result: false,
        }
    }
}
