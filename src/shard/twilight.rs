//! Twilight-backed shard connections

use crate::error::{GatewayError, Result};
use crate::events::ShardEvent;
use crate::shard::connector::{ReceiveError, ShardConnector, ShardStream};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use twilight_gateway::error::ReceiveMessageErrorType;
use twilight_gateway::{Config, EventTypeFlags, Intents, Shard, StreamExt as _};
use twilight_http::Client;
use twilight_model::gateway::event::Event;
use twilight_model::gateway::ShardId;

/// Connector over `twilight_gateway::Shard`
pub struct TwilightConnector {
    http: Arc<Client>,
    token: String,
    intents: Intents,
}

impl TwilightConnector {
    /// `http` is the client shared with the outbound transport
    pub fn new(http: Arc<Client>, token: String, intents: Intents) -> Self {
        Self {
            http,
            token,
            intents,
        }
    }
}

#[async_trait]
impl ShardConnector for TwilightConnector {
    async fn recommended_shards(&self) -> Result<u32> {
        let info = self
            .http
            .gateway()
            .authed()
            .await
            .map_err(|e| GatewayError::ShardDiscovery(Box::new(e)))?
            .model()
            .await
            .map_err(|e| GatewayError::ShardDiscovery(Box::new(e)))?;

        info!(
            shards = info.shards,
            max_concurrency = info.session_start_limit.max_concurrency,
            "Recommended shard count fetched"
        );
        Ok(info.shards)
    }

    fn connect(&self, shard_id: u32, total: u32) -> Result<Box<dyn ShardStream>> {
        let id = ShardId::new_checked(shard_id, total).ok_or(GatewayError::ShardConstruction {
            shard_id,
            total,
            source: None,
        })?;
        let config = Config::new(self.token.clone(), self.intents);

        Ok(Box::new(TwilightStream {
            shard: Shard::with_config(id, config),
        }))
    }
}

struct TwilightStream {
    shard: Shard,
}

#[async_trait]
impl ShardStream for TwilightStream {
    async fn next_event(&mut self) -> Option<std::result::Result<ShardEvent, ReceiveError>> {
        loop {
            match self.shard.next_event(EventTypeFlags::all()).await? {
                Ok(event) => match project(event) {
                    Ok(Some(event)) => return Some(Ok(event)),
                    Ok(None) => continue,
                    Err(e) => {
                        let shard_id = self.shard.id().number();
                        warn!(shard_id, error = %e, "Dropping undecodable dispatch");
                    }
                },
                Err(source) => {
                    let fatal = matches!(source.kind(), ReceiveMessageErrorType::Reconnect);
                    return Some(Err(ReceiveError {
                        fatal,
                        source: Box::new(source),
                    }));
                }
            }
        }
    }
}

/// Map a twilight event onto its dispatch name and wire JSON
fn project(event: Event) -> Result<Option<ShardEvent>> {
    let (name, data) = match event {
        Event::Resumed => return Ok(Some(ShardEvent::Resumed)),
        Event::GatewayHeartbeatAck => return Ok(Some(ShardEvent::HeartbeatAck)),
        Event::Ready(ready) => ("READY", wire("READY", &ready)?),
        Event::GuildCreate(guild) => ("GUILD_CREATE", wire("GUILD_CREATE", &guild)?),
        Event::GuildUpdate(guild) => ("GUILD_UPDATE", wire("GUILD_UPDATE", &guild)?),
        Event::GuildDelete(guild) => ("GUILD_DELETE", wire("GUILD_DELETE", &guild)?),
        Event::ChannelCreate(channel) => ("CHANNEL_CREATE", wire("CHANNEL_CREATE", &channel)?),
        Event::ChannelUpdate(channel) => ("CHANNEL_UPDATE", wire("CHANNEL_UPDATE", &channel)?),
        Event::ChannelDelete(channel) => ("CHANNEL_DELETE", wire("CHANNEL_DELETE", &channel)?),
        Event::RoleCreate(role) => ("GUILD_ROLE_CREATE", wire("GUILD_ROLE_CREATE", &role)?),
        Event::RoleUpdate(role) => ("GUILD_ROLE_UPDATE", wire("GUILD_ROLE_UPDATE", &role)?),
        Event::RoleDelete(role) => ("GUILD_ROLE_DELETE", wire("GUILD_ROLE_DELETE", &role)?),
        Event::MemberAdd(member) => ("GUILD_MEMBER_ADD", wire("GUILD_MEMBER_ADD", &member)?),
        Event::MemberUpdate(member) => {
            ("GUILD_MEMBER_UPDATE", wire("GUILD_MEMBER_UPDATE", &member)?)
        }
        Event::MemberRemove(member) => {
            ("GUILD_MEMBER_REMOVE", wire("GUILD_MEMBER_REMOVE", &member)?)
        }
        Event::MemberChunk(chunk) => ("GUILD_MEMBERS_CHUNK", wire("GUILD_MEMBERS_CHUNK", &chunk)?),
        Event::MessageCreate(message) => ("MESSAGE_CREATE", wire("MESSAGE_CREATE", &message)?),
        Event::MessageUpdate(message) => ("MESSAGE_UPDATE", wire("MESSAGE_UPDATE", &message)?),
        Event::MessageDelete(message) => ("MESSAGE_DELETE", wire("MESSAGE_DELETE", &message)?),
        _ => return Ok(None),
    };

    ShardEvent::from_dispatch(name, data)
}

fn wire<T: Serialize>(event: &str, payload: &T) -> Result<serde_json::Value> {
    serde_json::to_value(payload).map_err(|source| GatewayError::Decode {
        event: event.to_string(),
        source,
    })
}
