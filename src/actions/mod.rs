//! Action gateway
//!
//! Outbound operations for the command layer. Identifiers arrive as strings
//! the way the command layer sees them and are validated here before any
//! call reaches the transport.
//!
//! Send-family operations treat an empty channel id as a no-op success:
//! nothing is sent and a warning is logged.

mod transport;
mod twilight;

pub use transport::Transport;
pub use twilight::TwilightTransport;

use crate::aggregator::StateAggregator;
use crate::error::{GatewayError, Result};
use crate::events::{MessageEnvelope, MessageKind};
use crate::metrics::GatewayMetrics;
use crate::model::Embed;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use twilight_model::guild::Permissions;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};
use twilight_model::id::Id;

/// Parse a snowflake id, rejecting zero and non-numeric input
pub fn parse_id<M>(kind: &'static str, raw: &str) -> Result<Id<M>> {
    raw.parse::<u64>()
        .ok()
        .and_then(Id::new_checked)
        .ok_or_else(|| GatewayError::InvalidId {
            kind,
            value: raw.to_string(),
        })
}

/// Outbound façade over a `Transport`
#[derive(Clone)]
pub struct ActionGateway {
    transport: Arc<dyn Transport>,
    state: Arc<StateAggregator>,
    metrics: Arc<GatewayMetrics>,
}

impl ActionGateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        state: Arc<StateAggregator>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            transport,
            state,
            metrics,
        }
    }

    /// Run one transport call, logging and counting its outcome
    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = fut.await;
        match &result {
            Ok(_) => {
                debug!(operation, "Outbound call succeeded");
                self.metrics.record_outbound(operation, "ok", start.elapsed());
            }
            Err(e) => {
                warn!(operation, error = %e, "Outbound call failed");
                self.metrics
                    .record_outbound(operation, e.error_type_label(), start.elapsed());
            }
        }
        result
    }

    /// `None` for an empty channel id (the no-op case)
    fn target(&self, operation: &'static str, channel: &str) -> Result<Option<Id<ChannelMarker>>> {
        if channel.is_empty() {
            warn!(operation, "Empty channel, nothing sent");
            self.metrics
                .record_outbound(operation, "skipped", std::time::Duration::ZERO);
            return Ok(None);
        }
        parse_id("channel", channel).map(Some)
    }

    pub async fn send_text(&self, channel: &str, text: &str) -> Result<()> {
        let Some(channel) = self.target("send_text", channel)? else {
            return Ok(());
        };
        self.call("send_text", self.transport.send_text(channel, text))
            .await
    }

    pub async fn send_embed(&self, channel: &str, embed: &Embed) -> Result<()> {
        let Some(channel) = self.target("send_embed", channel)? else {
            return Ok(());
        };
        self.call("send_embed", self.transport.send_embed(channel, embed))
            .await
    }

    pub async fn send_file(&self, channel: &str, name: &str, data: Vec<u8>) -> Result<()> {
        let Some(channel) = self.target("send_file", channel)? else {
            return Ok(());
        };
        self.call("send_file", self.transport.send_file(channel, name, data))
            .await
    }

    /// Smart send: an embed colored like the bot's role when the bot may
    /// embed links in the channel, plain text otherwise or when its
    /// permissions cannot be resolved.
    pub async fn send_action(&self, channel: &str, text: &str) -> Result<()> {
        let Some(channel_id) = self.target("send_action", channel)? else {
            return Ok(());
        };

        let Some(me) = self.state.current_user() else {
            debug!("Bot identity unknown, sending plain text");
            return self.call("send_text", self.transport.send_text(channel_id, text)).await;
        };

        match self.state.user_channel_permissions(me.id, channel_id) {
            Ok(permissions) if permissions.contains(Permissions::EMBED_LINKS) => {
                let color = self.state.user_color(me.id, channel_id);
                let embed = Embed::new(text).with_color(color);
                self.call("send_embed", self.transport.send_embed(channel_id, &embed))
                    .await
            }
            Ok(_) => self.call("send_text", self.transport.send_text(channel_id, text)).await,
            Err(e) => {
                debug!(error = %e, "Permissions unresolved, sending plain text");
                self.call("send_text", self.transport.send_text(channel_id, text))
                    .await
            }
        }
    }

    pub async fn delete_message(&self, channel: &str, message: &str) -> Result<()> {
        let channel = parse_id::<ChannelMarker>("channel", channel)?;
        let message = parse_id::<MessageMarker>("message", message)?;
        self.call("delete_message", self.transport.delete_message(channel, message))
            .await
    }

    /// Ban a user from a guild without deleting their messages
    pub async fn ban(&self, guild: &str, user: &str) -> Result<()> {
        self.ban_with_history(guild, user, 0).await
    }

    /// Ban a user and delete their messages from the last `delete_message_seconds`
    pub async fn ban_with_history(
        &self,
        guild: &str,
        user: &str,
        delete_message_seconds: u32,
    ) -> Result<()> {
        let guild = parse_id::<GuildMarker>("guild", guild)?;
        let user = parse_id::<UserMarker>("user", user)?;
        self.call("ban", self.transport.ban(guild, user, delete_message_seconds))
            .await
    }

    pub async fn unban(&self, guild: &str, user: &str) -> Result<()> {
        let guild = parse_id::<GuildMarker>("guild", guild)?;
        let user = parse_id::<UserMarker>("user", user)?;
        self.call("unban", self.transport.unban(guild, user)).await
    }

    pub async fn typing(&self, channel: &str) -> Result<()> {
        let channel = parse_id::<ChannelMarker>("channel", channel)?;
        self.call("typing", self.transport.typing(channel)).await
    }

    /// Open a DM channel with `user` and send `text` there
    pub async fn private_message(&self, user: &str, text: &str) -> Result<()> {
        let user = parse_id::<UserMarker>("user", user)?;
        let channel = self
            .call(
                "create_private_channel",
                self.transport.create_private_channel(user),
            )
            .await?;
        self.call("send_text", self.transport.send_text(channel, text))
            .await
    }

    /// Join a guild by invite code.
    ///
    /// Fails with `AlreadyJoined` when the invite points at a guild already
    /// in some shard cache; nothing is accepted in that case. An invite that
    /// cannot be looked up is still offered to `accept_invite`.
    pub async fn join(&self, code: &str) -> Result<()> {
        match self.call("invite", self.transport.invite_guild(code)).await {
            Ok(Some(guild_id)) if self.state.guild(guild_id).is_ok() => {
                debug!(guild_id = %guild_id, "Invite points at a joined guild");
                return Err(GatewayError::AlreadyJoined);
            }
            Ok(_) | Err(_) => {}
        }
        self.call("accept_invite", self.transport.accept_invite(code))
            .await
    }

    /// Channel history as Create-tagged envelopes, newest first
    pub async fn fetch_messages(
        &self,
        channel: &str,
        limit: u16,
        before: Option<&str>,
    ) -> Result<Vec<MessageEnvelope>> {
        let channel = parse_id::<ChannelMarker>("channel", channel)?;
        let before = before
            .filter(|id| !id.is_empty())
            .map(|id| parse_id::<MessageMarker>("message", id))
            .transpose()?;

        let messages = self
            .call(
                "fetch_messages",
                self.transport.fetch_messages(channel, limit, before),
            )
            .await?;

        // Uncached channels report shard 0, which receives direct messages
        let shard_id = self.state.channel_shard(channel).unwrap_or(0);
        Ok(messages
            .into_iter()
            .map(|raw| {
                MessageEnvelope::new(shard_id, MessageKind::Create, raw, Arc::clone(&self.state))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChatMessage;
    use crate::fixtures::{self, dispatch};
    use crate::model::RawMessage;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every call; `fail` makes every call error
    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<String>>,
        invite_guild: Option<u64>,
        fail: bool,
    }

    impl RecordingTransport {
        fn record(&self, call: String) -> Result<()> {
            self.calls.lock().unwrap().push(call);
            if self.fail {
                return Err(GatewayError::Http {
                    operation: "test",
                    source: "boom".into(),
                });
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_text(&self, channel: Id<ChannelMarker>, text: &str) -> Result<()> {
            self.record(format!("text {channel} {text}"))
        }
        async fn send_embed(&self, channel: Id<ChannelMarker>, embed: &Embed) -> Result<()> {
            self.record(format!(
                "embed {channel} {} {:?}",
                embed.description, embed.color
            ))
        }
        async fn send_file(&self, channel: Id<ChannelMarker>, name: &str, data: Vec<u8>) -> Result<()> {
            self.record(format!("file {channel} {name} {}", data.len()))
        }
        async fn delete_message(&self, channel: Id<ChannelMarker>, message: Id<MessageMarker>) -> Result<()> {
            self.record(format!("delete {channel} {message}"))
        }
        async fn ban(&self, guild: Id<GuildMarker>, user: Id<UserMarker>, secs: u32) -> Result<()> {
            self.record(format!("ban {guild} {user} {secs}"))
        }
        async fn unban(&self, guild: Id<GuildMarker>, user: Id<UserMarker>) -> Result<()> {
            self.record(format!("unban {guild} {user}"))
        }
        async fn typing(&self, channel: Id<ChannelMarker>) -> Result<()> {
            self.record(format!("typing {channel}"))
        }
        async fn create_private_channel(&self, user: Id<UserMarker>) -> Result<Id<ChannelMarker>> {
            self.record(format!("dm {user}"))?;
            Ok(Id::new(900))
        }
        async fn invite_guild(&self, code: &str) -> Result<Option<Id<GuildMarker>>> {
            self.record(format!("invite {code}"))?;
            Ok(self.invite_guild.map(Id::new))
        }
        async fn accept_invite(&self, code: &str) -> Result<()> {
            self.record(format!("accept {code}"))
        }
        async fn fetch_messages(
            &self,
            channel: Id<ChannelMarker>,
            limit: u16,
            before: Option<Id<MessageMarker>>,
        ) -> Result<Vec<RawMessage>> {
            self.record(format!("history {channel} {limit} {before:?}"))?;
            Ok(vec![fixtures::guild_message(fixtures::ALICE, "alice", "<#102>")])
        }
    }

    fn gateway(transport: &Arc<RecordingTransport>, state: Arc<StateAggregator>) -> ActionGateway {
        let transport: Arc<dyn Transport> = transport.clone();
        ActionGateway::new(transport, state, Arc::new(GatewayMetrics::detached()))
    }

    fn bot_ready(state: &StateAggregator, bot: u64) {
        state.apply(
            0,
            dispatch(
                "READY",
                json!({ "user": { "id": bot.to_string(), "username": "bridge", "bot": true } }),
            ),
        );
    }

    #[tokio::test]
    async fn empty_channel_sends_nothing() {
        let transport = Arc::new(RecordingTransport::default());
        let actions = gateway(&transport, fixtures::state(1));

        actions.send_text("", "hi").await.unwrap();
        actions.send_embed("", &Embed::new("hi")).await.unwrap();
        actions.send_file("", "a.txt", vec![1, 2]).await.unwrap();
        actions.send_action("", "hi").await.unwrap();

        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_ids_never_reach_transport() {
        let transport = Arc::new(RecordingTransport::default());
        let actions = gateway(&transport, fixtures::state(1));

        let err = actions.send_text("general", "hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidId { kind: "channel", .. }));
        assert!(actions.delete_message("101", "0").await.is_err());
        assert!(actions.ban("100", "-3").await.is_err());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn send_family_calls_transport() {
        let transport = Arc::new(RecordingTransport::default());
        let actions = gateway(&transport, fixtures::state(1));

        actions.send_text("101", "hi").await.unwrap();
        actions.send_file("101", "a.txt", vec![1, 2, 3]).await.unwrap();
        actions.delete_message("101", "5").await.unwrap();
        actions.ban("100", "3").await.unwrap();
        actions.ban_with_history("100", "3", 3600).await.unwrap();
        actions.unban("100", "3").await.unwrap();
        actions.typing("101").await.unwrap();

        assert_eq!(
            transport.calls(),
            vec![
                "text 101 hi",
                "file 101 a.txt 3",
                "delete 101 5",
                "ban 100 3 0",
                "ban 100 3 3600",
                "unban 100 3",
                "typing 101",
            ]
        );
    }

    #[tokio::test]
    async fn smart_send_uses_colored_embed_with_embed_links() {
        let state = fixtures::state(1);
        state.apply(0, fixtures::test_guild());
        // Alice holds Admins (administrator, colored)
        bot_ready(&state, fixtures::ALICE);
        let transport = Arc::new(RecordingTransport::default());
        let actions = gateway(&transport, state);

        actions.send_action("101", "hello").await.unwrap();
        assert_eq!(
            transport.calls(),
            vec![format!("embed 101 hello Some({})", fixtures::ADMINS_COLOR)]
        );
    }

    #[tokio::test]
    async fn smart_send_falls_back_to_text() {
        let state = fixtures::state(1);
        state.apply(0, fixtures::test_guild());
        // Bob only has @everyone (view + send, no embed links)
        bot_ready(&state, fixtures::BOB);
        let transport = Arc::new(RecordingTransport::default());
        let actions = gateway(&transport, Arc::clone(&state));

        actions.send_action("101", "hello").await.unwrap();
        // Unknown channel: permission resolution fails
        actions.send_action("555", "again").await.unwrap();

        assert_eq!(transport.calls(), vec!["text 101 hello", "text 555 again"]);
    }

    #[tokio::test]
    async fn smart_send_without_identity_sends_text() {
        let transport = Arc::new(RecordingTransport::default());
        let actions = gateway(&transport, fixtures::state(1));
        actions.send_action("101", "hello").await.unwrap();
        assert_eq!(transport.calls(), vec!["text 101 hello"]);
    }

    #[tokio::test]
    async fn join_known_guild_is_already_joined() {
        let state = fixtures::state(1);
        state.apply(0, fixtures::test_guild());
        let transport = Arc::new(RecordingTransport {
            invite_guild: Some(fixtures::GUILD),
            ..Default::default()
        });
        let actions = gateway(&transport, state);

        let err = actions.join("abc").await.unwrap_err();
        assert!(matches!(err, GatewayError::AlreadyJoined));
        assert_eq!(transport.calls(), vec!["invite abc"]);
    }

    #[tokio::test]
    async fn join_new_guild_accepts() {
        let state = fixtures::state(1);
        state.apply(0, fixtures::test_guild());
        let transport = Arc::new(RecordingTransport {
            invite_guild: Some(777),
            ..Default::default()
        });
        let actions = gateway(&transport, state);

        actions.join("abc").await.unwrap();
        assert_eq!(transport.calls(), vec!["invite abc", "accept abc"]);
    }

    #[tokio::test]
    async fn outbound_failures_are_returned() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let actions = gateway(&transport, fixtures::state(1));

        let err = actions.send_text("101", "hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::Http { .. }));
        // Lookup failure still falls through to accept
        assert!(actions.join("abc").await.is_err());
        assert_eq!(transport.calls(), vec!["text 101 hi", "invite abc", "accept abc"]);
    }

    #[tokio::test]
    async fn private_message_opens_dm_then_sends() {
        let transport = Arc::new(RecordingTransport::default());
        let actions = gateway(&transport, fixtures::state(1));

        actions.private_message("3", "psst").await.unwrap();
        assert_eq!(transport.calls(), vec!["dm 3", "text 900 psst"]);
    }

    #[tokio::test]
    async fn fetched_history_becomes_create_envelopes() {
        let state = fixtures::state(2);
        state.apply(1, fixtures::test_guild());
        let transport = Arc::new(RecordingTransport::default());
        let actions = gateway(&transport, state);

        let history = actions.fetch_messages("101", 50, Some("4000")).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].shard_id(), 1);
        assert_eq!(history[0].kind(), MessageKind::Create);
        assert_eq!(history[0].content(), "#random");
        assert_eq!(
            transport.calls(),
            vec![format!("history 101 50 {:?}", Some(Id::<MessageMarker>::new(4000)))]
        );

        actions.fetch_messages("101", 10, Some("")).await.unwrap();
        assert_eq!(transport.calls()[1], "history 101 10 None");
    }
}
