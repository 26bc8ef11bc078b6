//! State aggregation across shards
//!
//! Every shard keeps its own cache fragment. Lookups go through the routing
//! table to the owning shard, so a hit from shard *i* is authoritative and a
//! miss is reported as `GatewayError::NotFound`.

use crate::cache::permissions::{channel_permissions, member_color};
use crate::cache::{RoutingTable, ShardCache};
use crate::error::{GatewayError, Result};
use crate::events::decode::ShardEvent;
use crate::model::{CachedGuild, ChannelRecord, MemberRecord, RawMessage, RoleRecord, UserRecord};
use std::sync::{OnceLock, RwLock};
use tracing::debug;
use twilight_model::guild::Permissions;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, UserMarker};
use twilight_model::id::Id;

/// Color returned when no color could be resolved.
///
/// Also the value of a resolved-but-uncolored member; callers cannot tell
/// the two apart.
pub const NO_COLOR: u32 = 0;

/// Read surface over all shard caches
#[derive(Debug, Default)]
pub struct StateAggregator {
    shards: OnceLock<Vec<ShardCache>>,
    routes: RoutingTable,
    current_user: RwLock<Option<UserRecord>>,
}

impl StateAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create one cache per shard. Write-once: a second call fails.
    pub fn install(&self, shard_count: u32) -> Result<()> {
        let caches = (0..shard_count).map(ShardCache::new).collect();
        self.shards
            .set(caches)
            .map_err(|_| GatewayError::AlreadyOpen)
    }

    /// Number of installed shards (0 before `install`)
    pub fn shard_count(&self) -> usize {
        self.shards().len()
    }

    fn shards(&self) -> &[ShardCache] {
        self.shards.get().map(Vec::as_slice).unwrap_or_default()
    }

    fn shard(&self, shard_id: u32) -> Option<&ShardCache> {
        self.shards().get(shard_id as usize)
    }

    /// Guilds held by one shard
    pub fn shard_guild_count(&self, shard_id: u32) -> usize {
        self.shard(shard_id).map_or(0, ShardCache::guild_count)
    }

    /// Bot identity from the most recent READY
    pub fn current_user(&self) -> Option<UserRecord> {
        self.current_user
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_current_user(&self, user: UserRecord) {
        *self.current_user.write().unwrap_or_else(|e| e.into_inner()) = Some(user);
    }

    /// Fold one shard event into that shard's cache and the routing table.
    pub fn apply(&self, shard_id: u32, event: ShardEvent) {
        let Some(cache) = self.shard(shard_id) else {
            debug!(shard_id, "Event for unknown shard ignored");
            return;
        };

        match event {
            ShardEvent::Ready { user } => self.set_current_user(user),
            ShardEvent::GuildAvailable(guild) => {
                let guild_id = guild.id;
                let insert = cache.insert_guild(guild);
                self.routes.register_guild(guild_id, shard_id);
                for channel_id in insert.channels {
                    self.routes.register_channel(channel_id, shard_id);
                }
                for channel_id in insert.stale {
                    self.reroute_channel(channel_id, shard_id);
                }
            }
            ShardEvent::GuildUpdated(patch) => cache.update_guild(patch),
            ShardEvent::GuildRemoved {
                guild_id,
                unavailable,
            } => {
                // Outages keep the last known state
                if unavailable {
                    return;
                }
                for channel_id in cache.remove_guild(guild_id) {
                    self.reroute_channel(channel_id, shard_id);
                }
                self.reroute_guild(guild_id, shard_id);
            }
            ShardEvent::ChannelUpsert(channel) => {
                let channel_id = channel.id;
                cache.upsert_channel(channel);
                self.routes.register_channel(channel_id, shard_id);
            }
            ShardEvent::ChannelRemoved { channel_id } => {
                if cache.remove_channel(channel_id) {
                    self.reroute_channel(channel_id, shard_id);
                }
            }
            ShardEvent::RoleUpsert { guild_id, role } => cache.upsert_role(guild_id, role),
            ShardEvent::RoleRemoved { guild_id, role_id } => cache.remove_role(guild_id, role_id),
            ShardEvent::MemberUpsert { guild_id, member } => cache.upsert_member(guild_id, member),
            ShardEvent::MembersChunk { guild_id, members } => {
                for member in members {
                    cache.upsert_member(guild_id, member);
                }
            }
            ShardEvent::MemberRemoved { guild_id, user_id } => {
                cache.remove_member(guild_id, user_id)
            }
            ShardEvent::Message { message, .. } => self.observe_message(shard_id, &message),
            ShardEvent::Resumed | ShardEvent::HeartbeatAck => {}
        }
    }

    /// Register a private-channel stub for guildless messages on unknown channels.
    pub fn observe_message(&self, shard_id: u32, message: &RawMessage) {
        if message.guild_id.is_some() || self.routes.channel_shard(message.channel_id).is_some() {
            return;
        }
        if let Some(cache) = self.shard(shard_id) {
            if cache.insert_channel_if_absent(ChannelRecord::private(message.channel_id)) {
                self.routes.register_channel(message.channel_id, shard_id);
            }
        }
    }

    fn reroute_guild(&self, id: Id<GuildMarker>, shard_id: u32) {
        if self.routes.release_guild(id, shard_id) {
            if let Some(next) = self.shards().iter().find(|cache| cache.has_guild(id)) {
                self.routes.register_guild(id, next.shard_id());
            }
        }
    }

    fn reroute_channel(&self, id: Id<ChannelMarker>, shard_id: u32) {
        if self.routes.release_channel(id, shard_id) {
            if let Some(next) = self.shards().iter().find(|cache| cache.has_channel(id)) {
                self.routes.register_channel(id, next.shard_id());
            }
        }
    }

    /// Shard that owns a channel, if any shard has cached it
    pub fn channel_shard(&self, id: Id<ChannelMarker>) -> Option<u32> {
        self.routes.channel_shard(id)
    }

    /// Channel by id from its owning shard
    pub fn channel(&self, id: Id<ChannelMarker>) -> Result<ChannelRecord> {
        self.routes
            .channel_shard(id)
            .and_then(|shard_id| self.shard(shard_id))
            .and_then(|cache| cache.channel(id))
            .ok_or_else(|| GatewayError::not_found("channel", id.get()))
    }

    /// Guild by id from its owning shard
    pub fn guild(&self, id: Id<GuildMarker>) -> Result<CachedGuild> {
        self.guild_cache(id)
            .and_then(|cache| cache.guild(id))
            .ok_or_else(|| GatewayError::not_found("guild", id.get()))
    }

    fn guild_cache(&self, id: Id<GuildMarker>) -> Option<&ShardCache> {
        self.routes
            .guild_shard(id)
            .and_then(|shard_id| self.shard(shard_id))
    }

    /// Every shard's guilds concatenated in shard order, without de-duplication
    pub fn guilds(&self) -> Vec<CachedGuild> {
        self.shards().iter().flat_map(ShardCache::guilds).collect()
    }

    /// Roles of a guild
    pub fn guild_roles(&self, id: Id<GuildMarker>) -> Result<Vec<RoleRecord>> {
        self.guild(id).map(|guild| guild.roles)
    }

    /// Cached members of a guild
    pub fn guild_members(&self, id: Id<GuildMarker>) -> Result<Vec<MemberRecord>> {
        self.guild_cache(id)
            .filter(|cache| cache.has_guild(id))
            .map(|cache| cache.guild_members(id))
            .ok_or_else(|| GatewayError::not_found("guild", id.get()))
    }

    /// One member of a guild
    pub fn member(&self, guild_id: Id<GuildMarker>, user_id: Id<UserMarker>) -> Result<MemberRecord> {
        self.guild_cache(guild_id)
            .and_then(|cache| cache.member(guild_id, user_id))
            .ok_or_else(|| GatewayError::not_found("member", user_id.get()))
    }

    /// Guild that owns a channel
    pub fn channel_guild(&self, channel_id: Id<ChannelMarker>) -> Result<CachedGuild> {
        let channel = self.channel(channel_id)?;
        let guild_id = channel
            .guild_id
            .ok_or_else(|| GatewayError::not_found("guild", 0))?;
        self.guild(guild_id)
    }

    /// Effective permission bits of a user in a channel
    pub fn user_channel_permissions(
        &self,
        user_id: Id<UserMarker>,
        channel_id: Id<ChannelMarker>,
    ) -> Result<Permissions> {
        let channel = self.channel(channel_id)?;
        let guild_id = channel
            .guild_id
            .ok_or_else(|| GatewayError::not_found("guild", 0))?;
        let guild = self.guild(guild_id)?;
        let member = self.member(guild_id, user_id)?;
        Ok(channel_permissions(&guild, &channel, &member))
    }

    /// Display color of a user in a channel.
    ///
    /// Returns [`NO_COLOR`] both when nothing is cached for the user and when
    /// the resolved color is genuinely zero. The two cases are
    /// indistinguishable.
    pub fn user_color(&self, user_id: Id<UserMarker>, channel_id: Id<ChannelMarker>) -> u32 {
        let Ok(guild) = self.channel_guild(channel_id) else {
            return NO_COLOR;
        };
        self.member(guild.id, user_id)
            .map_or(NO_COLOR, |member| member_color(&guild, &member))
    }
}
