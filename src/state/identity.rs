//! Local participant identity.
//!
//! The participant id is generated once per device and reused for every
//! room the player joins.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Avatar used until the player picks one.
pub const DEFAULT_AVATAR: &str = "😊";

/// Balance granted to a brand new profile.
pub const DEFAULT_BALANCE: u64 = 1_000_000;

/// The local player as persisted on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Participant {
    pub id: Option<String>,
    pub nickname: String,
    pub avatar: String,
    pub balance: u64,
}

impl Default for Participant {
    fn default() -> Self {
        Self {
            id: None,
            nickname: String::new(),
            avatar: DEFAULT_AVATAR.to_string(),
            balance: DEFAULT_BALANCE,
        }
    }
}

/// Explicit profile edits. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    pub fn nickname(nickname: impl Into<String>) -> Self {
        Self {
            nickname: Some(nickname.into()),
            avatar: None,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Owner of the local participant.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    participant: Participant,
    /// Unsaved changes since the last persist.
    dirty: bool,
}

impl IdentityStore {
    /// Restore from a persisted profile, minting an id if none is stored.
    pub fn restore(mut participant: Participant) -> Self {
        let minted = match participant.id.as_deref() {
            Some(id) if !id.is_empty() => false,
            _ => {
                let id = Uuid::new_v4().to_string();
                info!(participant_id = %id, "generated device participant id");
                participant.id = Some(id);
                true
            }
        };
        Self {
            participant,
            dirty: minted,
        }
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn id(&self) -> &str {
        self.participant.id.as_deref().unwrap_or_default()
    }

    pub fn balance(&self) -> u64 {
        self.participant.balance
    }

    /// Whether `user_id` refers to the local participant.
    pub fn is_me(&self, user_id: &str) -> bool {
        self.id() == user_id
    }

    pub fn update_profile(&mut self, update: ProfileUpdate) {
        if let Some(nickname) = update.nickname {
            self.participant.nickname = nickname;
            self.dirty = true;
        }
        if let Some(avatar) = update.avatar {
            self.participant.avatar = avatar;
            self.dirty = true;
        }
    }

    /// Set the authoritative balance. Returns true if it changed.
    pub fn set_balance(&mut self, balance: u64) -> bool {
        if self.participant.balance == balance {
            return false;
        }
        self.participant.balance = balance;
        self.dirty = true;
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Payload sent as `userData` when joining a room.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id(),
            "nickname": self.participant.nickname,
            "avatar": self.participant.avatar,
            "balance": self.participant.balance
        })
    }
}
