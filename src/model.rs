//! Read-only projections of platform entities
//!
//! Records deserialize from Discord's wire JSON (which is also what the
//! twilight payload types serialize to), so the shard caches only depend on
//! the fields they actually use.

use serde::{Deserialize, Deserializer, Serialize};
use twilight_model::channel::ChannelType;
use twilight_model::guild::Permissions;
use twilight_model::id::marker::{
    ChannelMarker, GenericMarker, GuildMarker, MessageMarker, RoleMarker, UserMarker,
};
use twilight_model::id::Id;

const CDN_BASE: &str = "https://cdn.discordapp.com";

/// Overwrite target is a role
pub const OVERWRITE_ROLE: u8 = 0;
/// Overwrite target is a member
pub const OVERWRITE_MEMBER: u8 = 1;

/// A user as seen on message authors, members and mentions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Id<UserMarker>,
    #[serde(rename = "username")]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub bot: bool,
}

impl UserRecord {
    /// CDN avatar URL, or the default embed avatar when no hash is set
    pub fn avatar_url(&self) -> String {
        match &self.avatar {
            Some(hash) if !hash.is_empty() => {
                format!("{CDN_BASE}/avatars/{}/{hash}.png", self.id)
            }
            _ => format!(
                "{CDN_BASE}/embed/avatars/{}.png",
                (self.id.get() >> 22) % 6
            ),
        }
    }
}

/// Guild role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: Id<RoleMarker>,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub position: i64,
    #[serde(default = "Permissions::empty")]
    pub permissions: Permissions,
}

/// Guild member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub user: UserRecord,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub roles: Vec<Id<RoleMarker>>,
}

impl MemberRecord {
    /// Per-guild nickname when set and non-empty
    pub fn nickname(&self) -> Option<&str> {
        self.nick.as_deref().filter(|nick| !nick.is_empty())
    }
}

/// Channel permission overwrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverwriteRecord {
    pub id: Id<GenericMarker>,
    #[serde(rename = "type")]
    pub kind: u8,
    pub allow: Permissions,
    pub deny: Permissions,
}

/// Guild or private channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: Id<ChannelMarker>,
    #[serde(default)]
    pub guild_id: Option<Id<GuildMarker>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: ChannelType,
    #[serde(default, deserialize_with = "nullable")]
    pub permission_overwrites: Vec<OverwriteRecord>,
}

impl ChannelRecord {
    /// Display name, empty for unnamed (private) channels
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// True for one-to-one direct message channels
    pub fn is_private(&self) -> bool {
        self.kind == ChannelType::Private
    }

    /// Stub for a DM channel first seen through a message
    pub fn private(id: Id<ChannelMarker>) -> Self {
        Self {
            id,
            guild_id: None,
            name: None,
            kind: ChannelType::Private,
            permission_overwrites: Vec::new(),
        }
    }
}

/// Guild as delivered on GUILD_CREATE
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GuildRecord {
    pub id: Id<GuildMarker>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Id<UserMarker>>,
    #[serde(default, deserialize_with = "nullable")]
    pub roles: Vec<RoleRecord>,
    #[serde(default, deserialize_with = "nullable")]
    pub channels: Vec<ChannelRecord>,
    #[serde(default, deserialize_with = "nullable")]
    pub members: Vec<MemberRecord>,
    #[serde(default)]
    pub unavailable: Option<bool>,
}

/// Guild-level fields held in a shard cache
///
/// Members live in their own map keyed by (guild, user).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedGuild {
    pub id: Id<GuildMarker>,
    pub name: String,
    pub owner_id: Option<Id<UserMarker>>,
    pub roles: Vec<RoleRecord>,
}

impl CachedGuild {
    /// Role lookup by id
    pub fn role(&self, id: Id<RoleMarker>) -> Option<&RoleRecord> {
        self.roles.iter().find(|role| role.id == id)
    }
}

impl From<&GuildRecord> for CachedGuild {
    fn from(record: &GuildRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone().unwrap_or_default(),
            owner_id: record.owner_id,
            roles: record.roles.clone(),
        }
    }
}

/// Inbound message payload (create, update or delete)
///
/// Delete payloads only carry the ids; every other field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: Id<MessageMarker>,
    pub channel_id: Id<ChannelMarker>,
    #[serde(default)]
    pub guild_id: Option<Id<GuildMarker>>,
    #[serde(default)]
    pub author: Option<UserRecord>,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub mentions: Vec<UserRecord>,
}

impl RawMessage {
    /// True when the author is flagged as an automated account
    pub fn is_bot_authored(&self) -> bool {
        self.author.as_ref().is_some_and(|author| author.bot)
    }
}

/// Outbound rich embed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: String,
    pub color: Option<u32>,
}

impl Embed {
    /// Embed with only a description
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Set the accent color
    pub fn with_color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }
}

/// Treats an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
