//! Outbound REST seam

use crate::error::Result;
use crate::model::{Embed, RawMessage};
use async_trait::async_trait;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};
use twilight_model::id::Id;

/// Outbound calls against the chat platform.
///
/// Every call runs to completion or failure; there are no retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, channel: Id<ChannelMarker>, text: &str) -> Result<()>;

    async fn send_embed(&self, channel: Id<ChannelMarker>, embed: &Embed) -> Result<()>;

    async fn send_file(&self, channel: Id<ChannelMarker>, name: &str, data: Vec<u8>) -> Result<()>;

    async fn delete_message(&self, channel: Id<ChannelMarker>, message: Id<MessageMarker>) -> Result<()>;

    /// Ban `user`, deleting their messages from the last `delete_message_seconds`
    async fn ban(
        &self,
        guild: Id<GuildMarker>,
        user: Id<UserMarker>,
        delete_message_seconds: u32,
    ) -> Result<()>;

    async fn unban(&self, guild: Id<GuildMarker>, user: Id<UserMarker>) -> Result<()>;

    async fn typing(&self, channel: Id<ChannelMarker>) -> Result<()>;

    /// Open (or reuse) the DM channel with a user
    async fn create_private_channel(&self, user: Id<UserMarker>) -> Result<Id<ChannelMarker>>;

    /// Guild an invite points at, if any
    async fn invite_guild(&self, code: &str) -> Result<Option<Id<GuildMarker>>>;

    async fn accept_invite(&self, code: &str) -> Result<()>;

    /// Channel history, newest first
    async fn fetch_messages(
        &self,
        channel: Id<ChannelMarker>,
        limit: u16,
        before: Option<Id<MessageMarker>>,
    ) -> Result<Vec<RawMessage>>;
}
