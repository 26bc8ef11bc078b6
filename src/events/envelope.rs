//! Uniform message envelope handed to consumers

use crate::aggregator::StateAggregator;
use crate::error::GatewayError;
use crate::model::RawMessage;
use crate::normalize::{display_name, normalize_content};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, OnceLock};
use twilight_model::id::marker::{ChannelMarker, MessageMarker, UserMarker};
use twilight_model::id::Id;
use twilight_model::util::Timestamp;
use uuid::Uuid;

/// Which gateway event produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Create,
    Update,
    Delete,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability set exposed to the command layer
pub trait ChatMessage: Send + Sync {
    /// Channel the message was posted in
    fn channel(&self) -> Id<ChannelMarker>;
    /// Nickname in the channel's guild, else username; empty without an author
    fn user_name(&self) -> &str;
    fn user_id(&self) -> Option<Id<UserMarker>>;
    /// Avatar URL; empty without an author
    fn user_avatar(&self) -> String;
    /// Body with mention tokens rewritten to readable names
    fn content(&self) -> &str;
    fn raw_content(&self) -> &str;
    fn message_id(&self) -> Id<MessageMarker>;
    fn kind(&self) -> MessageKind;
    fn timestamp(&self) -> Result<Timestamp, GatewayError>;
}

/// The single `ChatMessage` implementation.
///
/// Immutable apart from the display name and normalized content, each
/// computed at most once on first access and reused afterwards.
pub struct MessageEnvelope {
    event_id: Uuid,
    shard_id: u32,
    kind: MessageKind,
    raw: RawMessage,
    state: Arc<StateAggregator>,
    display_name: OnceLock<String>,
    content: OnceLock<String>,
}

impl MessageEnvelope {
    pub fn new(shard_id: u32, kind: MessageKind, raw: RawMessage, state: Arc<StateAggregator>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            shard_id,
            kind,
            raw,
            state,
            display_name: OnceLock::new(),
            content: OnceLock::new(),
        }
    }

    /// Correlation id for logs
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Shard that received the event
    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    pub fn raw(&self) -> &RawMessage {
        &self.raw
    }
}

impl ChatMessage for MessageEnvelope {
    fn channel(&self) -> Id<ChannelMarker> {
        self.raw.channel_id
    }

    fn user_name(&self) -> &str {
        let Some(author) = &self.raw.author else {
            return "";
        };
        self.display_name
            .get_or_init(|| display_name(&self.state, author.id, &author.name, self.raw.channel_id))
    }

    fn user_id(&self) -> Option<Id<UserMarker>> {
        self.raw.author.as_ref().map(|author| author.id)
    }

    fn user_avatar(&self) -> String {
        self.raw
            .author
            .as_ref()
            .map(|author| author.avatar_url())
            .unwrap_or_default()
    }

    fn content(&self) -> &str {
        self.content
            .get_or_init(|| normalize_content(&self.state, &self.raw))
    }

    fn raw_content(&self) -> &str {
        &self.raw.content
    }

    fn message_id(&self) -> Id<MessageMarker> {
        self.raw.id
    }

    fn kind(&self) -> MessageKind {
        self.kind
    }

    fn timestamp(&self) -> Result<Timestamp, GatewayError> {
        let raw = self
            .raw
            .timestamp
            .as_deref()
            .ok_or(GatewayError::MissingTimestamp)?;
        Timestamp::parse(raw).map_err(|e| GatewayError::InvalidTimestamp(Box::new(e)))
    }
}

impl fmt::Debug for MessageEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEnvelope")
            .field("event_id", &self.event_id)
            .field("shard_id", &self.shard_id)
            .field("kind", &self.kind)
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}
