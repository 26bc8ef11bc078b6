//! Gateway dispatch decoding
//!
//! Projects dispatch payloads, keyed by their Discord event name, into the
//! records the shard caches and the dispatcher consume.

use crate::error::GatewayError;
use crate::events::envelope::MessageKind;
use crate::model::{ChannelRecord, GuildRecord, MemberRecord, RawMessage, RoleRecord, UserRecord};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, RoleMarker, UserMarker};
use twilight_model::id::Id;

/// Event produced by one shard connection
#[derive(Debug, Clone)]
pub enum ShardEvent {
    Ready { user: UserRecord },
    Resumed,
    HeartbeatAck,
    GuildAvailable(GuildRecord),
    GuildUpdated(GuildPatch),
    GuildRemoved {
        guild_id: Id<GuildMarker>,
        unavailable: bool,
    },
    ChannelUpsert(ChannelRecord),
    ChannelRemoved {
        channel_id: Id<ChannelMarker>,
    },
    RoleUpsert {
        guild_id: Id<GuildMarker>,
        role: RoleRecord,
    },
    RoleRemoved {
        guild_id: Id<GuildMarker>,
        role_id: Id<RoleMarker>,
    },
    MemberUpsert {
        guild_id: Id<GuildMarker>,
        member: MemberRecord,
    },
    MembersChunk {
        guild_id: Id<GuildMarker>,
        members: Vec<MemberRecord>,
    },
    MemberRemoved {
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
    },
    Message {
        kind: MessageKind,
        message: RawMessage,
    },
}

impl ShardEvent {
    /// Static label for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::Resumed => "resumed",
            Self::HeartbeatAck => "heartbeat_ack",
            Self::GuildAvailable(_) => "guild_create",
            Self::GuildUpdated(_) => "guild_update",
            Self::GuildRemoved { .. } => "guild_delete",
            Self::ChannelUpsert(_) => "channel_upsert",
            Self::ChannelRemoved { .. } => "channel_delete",
            Self::RoleUpsert { .. } => "role_upsert",
            Self::RoleRemoved { .. } => "role_delete",
            Self::MemberUpsert { .. } => "member_upsert",
            Self::MembersChunk { .. } => "member_chunk",
            Self::MemberRemoved { .. } => "member_remove",
            Self::Message { kind, .. } => match kind {
                MessageKind::Create => "message_create",
                MessageKind::Update => "message_update",
                MessageKind::Delete => "message_delete",
            },
        }
    }

    /// Decode a dispatch payload by its event name.
    ///
    /// Returns `Ok(None)` for events the client does not track and for
    /// unavailable-guild creates.
    pub fn from_dispatch(name: &str, data: Value) -> Result<Option<Self>, GatewayError> {
        let event = match name {
            "READY" => {
                let ready: ReadyPayload = decode(name, data)?;
                Self::Ready { user: ready.user }
            }
            "RESUMED" => Self::Resumed,
            "GUILD_CREATE" => {
                let mut guild: GuildRecord = decode(name, data)?;
                if guild.unavailable == Some(true) {
                    return Ok(None);
                }
                for channel in &mut guild.channels {
                    channel.guild_id.get_or_insert(guild.id);
                }
                Self::GuildAvailable(guild)
            }
            "GUILD_UPDATE" => Self::GuildUpdated(decode(name, data)?),
            "GUILD_DELETE" => {
                let removed: GuildDeletePayload = decode(name, data)?;
                Self::GuildRemoved {
                    guild_id: removed.id,
                    unavailable: removed.unavailable.unwrap_or(false),
                }
            }
            "CHANNEL_CREATE" | "CHANNEL_UPDATE" => Self::ChannelUpsert(decode(name, data)?),
            "CHANNEL_DELETE" => {
                let channel: ChannelRecord = decode(name, data)?;
                Self::ChannelRemoved {
                    channel_id: channel.id,
                }
            }
            "GUILD_ROLE_CREATE" | "GUILD_ROLE_UPDATE" => {
                let payload: RolePayload = decode(name, data)?;
                Self::RoleUpsert {
                    guild_id: payload.guild_id,
                    role: payload.role,
                }
            }
            "GUILD_ROLE_DELETE" => {
                let payload: RoleDeletePayload = decode(name, data)?;
                Self::RoleRemoved {
                    guild_id: payload.guild_id,
                    role_id: payload.role_id,
                }
            }
            "GUILD_MEMBER_ADD" | "GUILD_MEMBER_UPDATE" => {
                let payload: MemberPayload = decode(name, data)?;
                Self::MemberUpsert {
                    guild_id: payload.guild_id,
                    member: payload.member,
                }
            }
            "GUILD_MEMBERS_CHUNK" => {
                let payload: MemberChunkPayload = decode(name, data)?;
                Self::MembersChunk {
                    guild_id: payload.guild_id,
                    members: payload.members,
                }
            }
            "GUILD_MEMBER_REMOVE" => {
                let payload: MemberRemovePayload = decode(name, data)?;
                Self::MemberRemoved {
                    guild_id: payload.guild_id,
                    user_id: payload.user.id,
                }
            }
            "MESSAGE_CREATE" => Self::Message {
                kind: MessageKind::Create,
                message: decode(name, data)?,
            },
            "MESSAGE_UPDATE" => Self::Message {
                kind: MessageKind::Update,
                message: decode(name, data)?,
            },
            "MESSAGE_DELETE" => Self::Message {
                kind: MessageKind::Delete,
                message: decode(name, data)?,
            },
            _ => return Ok(None),
        };

        Ok(Some(event))
    }
}

/// Partial guild delivered on GUILD_UPDATE
#[derive(Debug, Clone, Deserialize)]
pub struct GuildPatch {
    pub id: Id<GuildMarker>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Id<UserMarker>>,
    #[serde(default)]
    pub roles: Option<Vec<RoleRecord>>,
}

#[derive(Deserialize)]
struct ReadyPayload {
    user: UserRecord,
}

#[derive(Deserialize)]
struct GuildDeletePayload {
    id: Id<GuildMarker>,
    #[serde(default)]
    unavailable: Option<bool>,
}

#[derive(Deserialize)]
struct RolePayload {
    guild_id: Id<GuildMarker>,
    role: RoleRecord,
}

#[derive(Deserialize)]
struct RoleDeletePayload {
    guild_id: Id<GuildMarker>,
    role_id: Id<RoleMarker>,
}

#[derive(Deserialize)]
struct MemberPayload {
    guild_id: Id<GuildMarker>,
    #[serde(flatten)]
    member: MemberRecord,
}

#[derive(Deserialize)]
struct MemberChunkPayload {
    guild_id: Id<GuildMarker>,
    members: Vec<MemberRecord>,
}

#[derive(Deserialize)]
struct MemberRemovePayload {
    guild_id: Id<GuildMarker>,
    user: UserRecord,
}

fn decode<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, GatewayError> {
    serde_json::from_value(data).map_err(|source| GatewayError::Decode {
        event: event.to_string(),
        source,
    })
}
