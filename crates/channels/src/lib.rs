//! The channel registry: `channel name -> set<connection>` plus the
//! reverse index, with creation on first join and GC when a channel's last
//! member leaves. Plain `&mut self` methods; callers (the connection
//! manager) own synchronization, same as the rest of the broker's state.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque connection identity, assigned at accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `channel name -> member set` plus the reverse index, mirroring the
/// forward/reverse `HashMap` pair used to track device nodes elsewhere in
/// this codebase, generalized from a 1:1 node mapping to a many:many one.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    /// channel name → members
    channels: HashMap<String, HashSet<ConnId>>,
    /// connection → channels it has joined
    memberships: HashMap<ConnId, HashSet<String>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` to `channel`, creating the channel if this is its first
    /// member. Returns `true` if the channel was created by this call, and
    /// `false` both when the channel already existed and when `conn` was
    /// already a member — join is idempotent.
    pub fn join(&mut self, conn: ConnId, channel: &str) -> bool {
        let created = !self.channels.contains_key(channel);
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(conn);
        self.memberships
            .entry(conn)
            .or_default()
            .insert(channel.to_string());
        created
    }

    /// Remove `conn` from `channel`. Deletes the channel entry if its
    /// member set becomes empty, atomically with the removal.
    pub fn leave(&mut self, conn: ConnId, channel: &str) {
        if let Some(members) = self.channels.get_mut(channel) {
            members.remove(&conn);
            if members.is_empty() {
                self.channels.remove(channel);
            }
        }
        if let Some(joined) = self.memberships.get_mut(&conn) {
            joined.remove(channel);
            if joined.is_empty() {
                self.memberships.remove(&conn);
            }
        }
    }

    /// Remove `conn` from every channel it had joined (connection close).
    /// Returns the channel names it was removed from.
    pub fn remove_connection(&mut self, conn: ConnId) -> Vec<String> {
        let Some(joined) = self.memberships.remove(&conn) else {
            return Vec::new();
        };
        for channel in &joined {
            if let Some(members) = self.channels.get_mut(channel) {
                members.remove(&conn);
                if members.is_empty() {
                    self.channels.remove(channel);
                }
            }
        }
        joined.into_iter().collect()
    }

    pub fn is_member(&self, conn: ConnId, channel: &str) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|members| members.contains(&conn))
    }

    /// Every member of `channel` other than `exclude` — used by the router
    /// to forward to every other member.
    pub fn members_excluding(&self, channel: &str, exclude: ConnId) -> Vec<ConnId> {
        self.channels
            .get(channel)
            .map(|members| members.iter().copied().filter(|c| *c != exclude).collect())
            .unwrap_or_default()
    }

    pub fn members(&self, channel: &str) -> Vec<ConnId> {
        self.channels
            .get(channel)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn channels_of(&self, conn: ConnId) -> Vec<String> {
        self.memberships
            .get(&conn)
            .map(|joined| joined.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Sorted channel names with member counts, for `get_active_channels`.
    pub fn active_channels(&self) -> Vec<(String, usize)> {
        let mut entries: Vec<_> = self
            .channels
            .iter()
            .map(|(name, members)| (name.clone(), members.len()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
