//! Recently joined rooms, most recent first.

use serde::{Deserialize, Serialize};

use super::config::DEFAULT_RECENT_ROOMS;

/// Avatars shown per remembered room.
pub const RECENT_ROOM_AVATARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentRoom {
    pub id: String,
    #[serde(default)]
    pub players: usize,
    #[serde(default)]
    pub avatars: Vec<String>,
}

impl RecentRoom {
    pub fn new(id: impl Into<String>, players: usize, mut avatars: Vec<String>) -> Self {
        avatars.truncate(RECENT_ROOM_AVATARS);
        Self {
            id: id.into(),
            players,
            avatars,
        }
    }
}

/// Bounded, deduplicated list of rooms for quick rejoin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentRooms {
    rooms: Vec<RecentRoom>,
    capacity: usize,
}

impl Default for RecentRooms {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RECENT_ROOMS)
    }
}

impl RecentRooms {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rooms: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Restore a persisted list, re-applying dedup and the capacity bound.
    pub fn restore(rooms: Vec<RecentRoom>, capacity: usize) -> Self {
        let mut recent = Self::with_capacity(capacity);
        for room in rooms.into_iter().rev() {
            recent.remember(room);
        }
        recent
    }

    /// Move `room` to the front. Returns true if the list changed.
    pub fn remember(&mut self, room: RecentRoom) -> bool {
        if self.rooms.first() == Some(&room) {
            return false;
        }
        self.rooms.retain(|r| r.id != room.id);
        self.rooms.insert(0, room);
        self.rooms.truncate(self.capacity);
        true
    }

    /// Merge live player counts and avatars into remembered rooms.
    ///
    /// Order is kept; rooms not remembered are ignored, and remembered rooms
    /// missing from `live` keep their last known info. Returns true if
    /// anything changed.
    pub fn refresh(&mut self, live: Vec<RecentRoom>) -> bool {
        let mut changed = false;
        for info in live {
            let Some(room) = self.rooms.iter_mut().find(|r| r.id == info.id) else {
                continue;
            };
            let fresh = RecentRoom::new(info.id, info.players, info.avatars);
            if *room != fresh {
                *room = fresh;
                changed = true;
            }
        }
        changed
    }

    pub fn forget(&mut self, room_id: &str) -> bool {
        let before = self.rooms.len();
        self.rooms.retain(|r| r.id != room_id);
        self.rooms.len() != before
    }

    pub fn rooms(&self) -> &[RecentRoom] {
        &self.rooms
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rooms.iter().map(|r| r.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn room(id: &str) -> RecentRoom {
        RecentRoom::new(id, 1, vec![])
    }

    #[test]
    fn test_most_recent_first_and_bounded() {
        let mut recent = RecentRooms::with_capacity(3);
        for id in ["1111", "2222", "3333", "4444"] {
            recent.remember(room(id));
        }
        assert_eq!(recent.ids().collect::<Vec<_>>(), vec!["4444", "3333", "2222"]);
    }

    #[test]
    fn test_rejoin_moves_to_front() {
        let mut recent = RecentRooms::default();
        recent.remember(room("1111"));
        recent.remember(room("2222"));
        recent.remember(RecentRoom::new("1111", 4, vec![]));

        assert_eq!(recent.len(), 2);
        assert_eq!(recent.rooms()[0].id, "1111");
        assert_eq!(recent.rooms()[0].players, 4);
    }

    #[test]
    fn test_unchanged_front_is_noop() {
        let mut recent = RecentRooms::default();
        assert!(recent.remember(room("1111")));
        assert!(!recent.remember(room("1111")));
    }

    #[test]
    fn test_avatars_truncated() {
        let r = RecentRoom::new("1", 5, vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        assert_eq!(r.avatars.len(), RECENT_ROOM_AVATARS);
    }

    #[test]
    fn test_restore_keeps_order() {
        let restored = RecentRooms::restore(vec![room("a"), room("b"), room("a")], 3);
        assert_eq!(restored.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_refresh_merges_live_info() {
        let mut recent = RecentRooms::default();
        recent.remember(room("1111"));
        recent.remember(room("2222"));

        let changed = recent.refresh(vec![
            RecentRoom::new("1111", 6, vec!["🦀".into(), "🐓".into()]),
            RecentRoom::new("9999", 2, vec![]),
        ]);

        assert!(changed);
        assert_eq!(recent.ids().collect::<Vec<_>>(), vec!["2222", "1111"]);
        assert_eq!(recent.rooms()[1].players, 6);
        assert_eq!(recent.rooms()[1].avatars.len(), 2);
        assert_eq!(recent.rooms()[0], room("2222"));
        assert!(!recent.refresh(vec![RecentRoom::new("1111", 6, vec!["🦀".into(), "🐓".into()])]));
    }

    #[test]
    fn test_refresh_truncates_avatars() {
        let mut recent = RecentRooms::default();
        recent.remember(room("1"));
        let avatars = ["a", "b", "c", "d", "e"].map(String::from).to_vec();
        recent.refresh(vec![RecentRoom {
            id: "1".into(),
            players: 5,
            avatars,
        }]);
        assert_eq!(recent.rooms()[0].avatars.len(), RECENT_ROOM_AVATARS);
    }

    #[test]
    fn test_forget() {
        let mut recent = RecentRooms::default();
        recent.remember(room("a"));
        assert!(recent.forget("a"));
        assert!(recent.is_empty());
    }
}
