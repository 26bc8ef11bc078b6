//! Guild/channel → shard routing
//!
//! Replaces "scan every shard, take the first hit" with an O(1) lookup.
//! When more than one shard holds an id the lowest shard index owns it,
//! which is the shard an ascending scan would have hit first.

use dashmap::DashMap;
use std::hash::Hash;
use twilight_model::id::marker::{ChannelMarker, GuildMarker};
use twilight_model::id::Id;

#[derive(Debug, Default)]
pub struct RoutingTable {
    guilds: DashMap<Id<GuildMarker>, u32>,
    channels: DashMap<Id<ChannelMarker>, u32>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guild_shard(&self, id: Id<GuildMarker>) -> Option<u32> {
        self.guilds.get(&id).map(|entry| *entry)
    }

    pub fn channel_shard(&self, id: Id<ChannelMarker>) -> Option<u32> {
        self.channels.get(&id).map(|entry| *entry)
    }

    pub fn register_guild(&self, id: Id<GuildMarker>, shard_id: u32) {
        register(&self.guilds, id, shard_id);
    }

    pub fn register_channel(&self, id: Id<ChannelMarker>, shard_id: u32) {
        register(&self.channels, id, shard_id);
    }

    /// Drop the route if `shard_id` owns it; true when dropped
    pub fn release_guild(&self, id: Id<GuildMarker>, shard_id: u32) -> bool {
        self.guilds.remove_if(&id, |_, owner| *owner == shard_id).is_some()
    }

    /// Drop the route if `shard_id` owns it; true when dropped
    pub fn release_channel(&self, id: Id<ChannelMarker>, shard_id: u32) -> bool {
        self.channels
            .remove_if(&id, |_, owner| *owner == shard_id)
            .is_some()
    }
}

fn register<K: Eq + Hash>(routes: &DashMap<K, u32>, key: K, shard_id: u32) {
    routes
        .entry(key)
        .and_modify(|owner| *owner = (*owner).min(shard_id))
        .or_insert(shard_id);
}
