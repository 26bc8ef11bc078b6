//! `Transport` over `twilight_http`

use crate::actions::transport::Transport;
use crate::error::{GatewayError, Result};
use crate::model::{Embed, RawMessage};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use twilight_http::Client;
use twilight_model::channel::message::Embed as TwilightEmbed;
use twilight_model::channel::Message;
use twilight_model::http::attachment::Attachment;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};
use twilight_model::id::Id;

/// REST transport sharing the client built at startup
pub struct TwilightTransport {
    http: Arc<Client>,
}

impl TwilightTransport {
    pub fn new(http: Arc<Client>) -> Self {
        Self { http }
    }
}

fn http_error(operation: &'static str) -> impl FnOnce(twilight_http::Error) -> GatewayError {
    move |e| GatewayError::Http {
        operation,
        source: Box::new(e),
    }
}

fn body_error(operation: &'static str) -> impl FnOnce(twilight_http::response::DeserializeBodyError) -> GatewayError {
    move |e| GatewayError::Http {
        operation,
        source: Box::new(e),
    }
}

fn to_twilight_embed(embed: &Embed) -> Result<TwilightEmbed> {
    let mut value = json!({
        "type": "rich",
        "description": embed.description,
        "fields": [],
    });
    if let Some(title) = &embed.title {
        value["title"] = json!(title);
    }
    if let Some(color) = embed.color {
        value["color"] = json!(color);
    }
    serde_json::from_value(value).map_err(|e| GatewayError::Http {
        operation: "send_embed",
        source: Box::new(e),
    })
}

fn to_raw(messages: Vec<Message>) -> Result<Vec<RawMessage>> {
    messages
        .iter()
        .map(|message| {
            serde_json::to_value(message)
                .and_then(serde_json::from_value)
                .map_err(|source| GatewayError::Decode {
                    event: "channel_messages".to_string(),
                    source,
                })
        })
        .collect()
}

#[async_trait]
impl Transport for TwilightTransport {
    async fn send_text(&self, channel: Id<ChannelMarker>, text: &str) -> Result<()> {
        self.http
            .create_message(channel)
            .content(text)
            .await
            .map_err(http_error("send_text"))?;
        Ok(())
    }

    async fn send_embed(&self, channel: Id<ChannelMarker>, embed: &Embed) -> Result<()> {
        let embeds = [to_twilight_embed(embed)?];
        self.http
            .create_message(channel)
            .embeds(&embeds)
            .await
            .map_err(http_error("send_embed"))?;
        Ok(())
    }

    async fn send_file(&self, channel: Id<ChannelMarker>, name: &str, data: Vec<u8>) -> Result<()> {
        let attachments = [Attachment::from_bytes(name.to_string(), data, 0)];
        self.http
            .create_message(channel)
            .attachments(&attachments)
            .await
            .map_err(http_error("send_file"))?;
        Ok(())
    }

    async fn delete_message(&self, channel: Id<ChannelMarker>, message: Id<MessageMarker>) -> Result<()> {
        self.http
            .delete_message(channel, message)
            .await
            .map_err(http_error("delete_message"))?;
        Ok(())
    }

    async fn ban(
        &self,
        guild: Id<GuildMarker>,
        user: Id<UserMarker>,
        delete_message_seconds: u32,
    ) -> Result<()> {
        self.http
            .create_ban(guild, user)
            .delete_message_seconds(delete_message_seconds)
            .await
            .map_err(http_error("ban"))?;
        Ok(())
    }

    async fn unban(&self, guild: Id<GuildMarker>, user: Id<UserMarker>) -> Result<()> {
        self.http
            .delete_ban(guild, user)
            .await
            .map_err(http_error("unban"))?;
        Ok(())
    }

    async fn typing(&self, channel: Id<ChannelMarker>) -> Result<()> {
        self.http
            .create_typing_trigger(channel)
            .await
            .map_err(http_error("typing"))?;
        Ok(())
    }

    async fn create_private_channel(&self, user: Id<UserMarker>) -> Result<Id<ChannelMarker>> {
        let channel = self
            .http
            .create_private_channel(user)
            .await
            .map_err(http_error("create_private_channel"))?
            .model()
            .await
            .map_err(body_error("create_private_channel"))?;
        Ok(channel.id)
    }

    async fn invite_guild(&self, code: &str) -> Result<Option<Id<GuildMarker>>> {
        let invite = self
            .http
            .invite(code)
            .await
            .map_err(http_error("invite"))?
            .model()
            .await
            .map_err(body_error("invite"))?;
        Ok(invite.guild.map(|guild| guild.id))
    }

    /// Bot accounts cannot accept invites over the REST API
    async fn accept_invite(&self, _code: &str) -> Result<()> {
        Err(GatewayError::Unsupported {
            operation: "accept_invite",
        })
    }

    async fn fetch_messages(
        &self,
        channel: Id<ChannelMarker>,
        limit: u16,
        before: Option<Id<MessageMarker>>,
    ) -> Result<Vec<RawMessage>> {
        let request = self.http.channel_messages(channel).limit(limit);
        let response = match before {
            Some(before) => request.before(before).await,
            None => request.await,
        }
        .map_err(http_error("fetch_messages"))?;

        let messages = response
            .models()
            .await
            .map_err(body_error("fetch_messages"))?;
        to_raw(messages)
    }
}
