//! Engine error taxonomy.

use thiserror::Error;

use super::phase::Phase;

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the engine.
///
/// Only `ServerRejected` and `Disconnected` ever originate outside the
/// client; everything else is detected locally before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Local validation failed (amount, door or phase). Nothing was sent.
    #[error("invalid wager: {reason}")]
    InvalidWager { reason: String },

    /// The server refused a wager or cancellation.
    #[error("rejected by server: {message}")]
    ServerRejected { message: String },

    /// Cancellation attempted outside the betting window.
    #[error("cancellation window closed (phase is {phase})")]
    CancellationWindowClosed { phase: Phase },

    /// Inbound event carried an unknown value or lacked a required field.
    #[error("protocol mismatch: {detail}")]
    ProtocolMismatch { detail: String },

    /// Transport is not connected.
    #[error("transport disconnected")]
    Disconnected,

    /// A host/dealer phase action is not permitted right now.
    #[error("{action} not allowed: {reason}")]
    ActionNotAllowed {
        action: &'static str,
        reason: &'static str,
    },

    /// Reading or writing persisted state failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub(crate) fn invalid_wager(reason: impl Into<String>) -> Self {
        Self::InvalidWager {
            reason: reason.into(),
        }
    }

    pub(crate) fn protocol(detail: impl Into<String>) -> Self {
        Self::ProtocolMismatch {
            detail: detail.into(),
        }
    }

    /// Whether the UI may simply retry the same action later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Disconnected | Self::ServerRejected { .. })
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(err.to_string())
    }
}
