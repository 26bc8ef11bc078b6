//! Per-shard state caches
//!
//! Each shard connection owns one `ShardCache`, fed by its own event stream.
//! The `RoutingTable` maps guild and channel ids to the shard holding them.

pub mod permissions;
mod routing;

pub use routing::RoutingTable;

use crate::events::decode::GuildPatch;
use crate::model::{CachedGuild, ChannelRecord, GuildRecord, MemberRecord, RoleRecord};
use dashmap::DashMap;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, RoleMarker, UserMarker};
use twilight_model::id::Id;

/// Channel ids touched by a full guild insert
#[derive(Debug, Default)]
pub struct GuildInsert {
    /// Channels the guild payload carried
    pub channels: Vec<Id<ChannelMarker>>,
    /// Previously cached channels the payload no longer has
    pub stale: Vec<Id<ChannelMarker>>,
}

/// One shard's fragment of guild, channel, role and member state
#[derive(Debug)]
pub struct ShardCache {
    shard_id: u32,
    guilds: DashMap<Id<GuildMarker>, CachedGuild>,
    channels: DashMap<Id<ChannelMarker>, ChannelRecord>,
    members: DashMap<(Id<GuildMarker>, Id<UserMarker>), MemberRecord>,
}

impl ShardCache {
    pub fn new(shard_id: u32) -> Self {
        Self {
            shard_id,
            guilds: DashMap::new(),
            channels: DashMap::new(),
            members: DashMap::new(),
        }
    }

    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    pub fn channel(&self, id: Id<ChannelMarker>) -> Option<ChannelRecord> {
        self.channels.get(&id).map(|entry| entry.value().clone())
    }

    pub fn guild(&self, id: Id<GuildMarker>) -> Option<CachedGuild> {
        self.guilds.get(&id).map(|entry| entry.value().clone())
    }

    pub fn member(&self, guild_id: Id<GuildMarker>, user_id: Id<UserMarker>) -> Option<MemberRecord> {
        self.members
            .get(&(guild_id, user_id))
            .map(|entry| entry.value().clone())
    }

    pub fn has_guild(&self, id: Id<GuildMarker>) -> bool {
        self.guilds.contains_key(&id)
    }

    pub fn has_channel(&self, id: Id<ChannelMarker>) -> bool {
        self.channels.contains_key(&id)
    }

    /// Guilds in ascending id order
    pub fn guilds(&self) -> Vec<CachedGuild> {
        let mut guilds: Vec<_> = self.guilds.iter().map(|e| e.value().clone()).collect();
        guilds.sort_by_key(|guild| guild.id);
        guilds
    }

    /// Members of one guild in ascending user id order
    pub fn guild_members(&self, guild_id: Id<GuildMarker>) -> Vec<MemberRecord> {
        let mut members: Vec<_> = self
            .members
            .iter()
            .filter(|entry| entry.key().0 == guild_id)
            .map(|entry| entry.value().clone())
            .collect();
        members.sort_by_key(|member| member.user.id);
        members
    }

    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }

    /// Store a full guild with its channels and members.
    ///
    /// A full payload replaces whatever was cached for the guild, so
    /// channels and members it no longer lists are dropped.
    pub fn insert_guild(&self, record: GuildRecord) -> GuildInsert {
        let guild_id = record.id;
        let previous = self.remove_guild(guild_id);
        self.guilds.insert(guild_id, CachedGuild::from(&record));

        for member in record.members {
            self.members.insert((guild_id, member.user.id), member);
        }

        let channels: Vec<_> = record
            .channels
            .into_iter()
            .map(|channel| {
                let id = channel.id;
                self.channels.insert(id, channel);
                id
            })
            .collect();
        let stale = previous
            .into_iter()
            .filter(|id| !channels.contains(id))
            .collect();

        GuildInsert { channels, stale }
    }

    /// Apply a partial update; no-op for unknown guilds
    pub fn update_guild(&self, patch: GuildPatch) {
        if let Some(mut guild) = self.guilds.get_mut(&patch.id) {
            if let Some(name) = patch.name {
                guild.name = name;
            }
            if patch.owner_id.is_some() {
                guild.owner_id = patch.owner_id;
            }
            if let Some(roles) = patch.roles {
                guild.roles = roles;
            }
        }
    }

    /// Drop a guild with its channels and members.
    ///
    /// Returns the ids of the channels that were removed.
    pub fn remove_guild(&self, id: Id<GuildMarker>) -> Vec<Id<ChannelMarker>> {
        self.guilds.remove(&id);
        self.members.retain(|(guild_id, _), _| *guild_id != id);

        let removed: Vec<_> = self
            .channels
            .iter()
            .filter(|entry| entry.value().guild_id == Some(id))
            .map(|entry| *entry.key())
            .collect();
        for channel_id in &removed {
            self.channels.remove(channel_id);
        }
        removed
    }

    pub fn upsert_channel(&self, channel: ChannelRecord) {
        self.channels.insert(channel.id, channel);
    }

    /// Insert only when absent; returns true when inserted
    pub fn insert_channel_if_absent(&self, channel: ChannelRecord) -> bool {
        let mut inserted = false;
        self.channels.entry(channel.id).or_insert_with(|| {
            inserted = true;
            channel
        });
        inserted
    }

    pub fn remove_channel(&self, id: Id<ChannelMarker>) -> bool {
        self.channels.remove(&id).is_some()
    }

    pub fn upsert_role(&self, guild_id: Id<GuildMarker>, role: RoleRecord) {
        if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
            match guild.roles.iter_mut().find(|existing| existing.id == role.id) {
                Some(existing) => *existing = role,
                None => guild.roles.push(role),
            }
        }
    }

    pub fn remove_role(&self, guild_id: Id<GuildMarker>, role_id: Id<RoleMarker>) {
        if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
            guild.roles.retain(|role| role.id != role_id);
        }
    }

    pub fn upsert_member(&self, guild_id: Id<GuildMarker>, member: MemberRecord) {
        self.members.insert((guild_id, member.user.id), member);
    }

    pub fn remove_member(&self, guild_id: Id<GuildMarker>, user_id: Id<UserMarker>) {
        self.members.remove(&(guild_id, user_id));
    }
}
