//! Fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use shardbridge::error::{GatewayError, Result};
use shardbridge::events::ShardEvent;
use shardbridge::model::{Embed, RawMessage};
use shardbridge::shard::ReceiveError;
use shardbridge::{
    Client, ClientConfig, EventQueue, GatewayMetrics, MessageEnvelope, ShardConnector,
    ShardStream, Transport,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};
use twilight_model::id::Id;

pub type Item = std::result::Result<ShardEvent, ReceiveError>;

pub const GUILD: u64 = 100;
pub const GENERAL: u64 = 101;
pub const RANDOM: u64 = 102;
pub const OWNER: u64 = 1;
pub const ALICE: u64 = 2;
pub const BOB: u64 = 3;
pub const BOT: u64 = 9;

/// Connector whose shard streams are fed by the test
pub struct FakeConnector {
    recommended: Option<u32>,
    fail_shard: Option<u32>,
    senders: Vec<mpsc::UnboundedSender<Item>>,
    receivers: Mutex<Vec<Option<mpsc::UnboundedReceiver<Item>>>>,
    discovery_calls: AtomicUsize,
}

impl FakeConnector {
    pub fn new(shards: u32) -> Self {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..shards)
            .map(|_| {
                let (tx, rx) = mpsc::unbounded_channel();
                (tx, Some(rx))
            })
            .unzip();
        Self {
            recommended: Some(shards),
            fail_shard: None,
            senders,
            receivers: Mutex::new(receivers),
            discovery_calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            recommended: None,
            ..Self::new(0)
        }
    }

    pub fn failing_shard(shards: u32, failing: u32) -> Self {
        Self {
            fail_shard: Some(failing),
            ..Self::new(shards)
        }
    }

    pub fn discovery_calls(&self) -> usize {
        self.discovery_calls.load(Ordering::SeqCst)
    }

    /// Push a raw item onto one shard's stream
    pub fn push(&self, shard_id: u32, item: Item) {
        self.senders[shard_id as usize]
            .send(item)
            .expect("shard stream dropped");
    }

    /// Push a dispatch payload onto one shard's stream
    pub fn dispatch(&self, shard_id: u32, name: &str, data: Value) {
        let event = ShardEvent::from_dispatch(name, data)
            .unwrap()
            .unwrap_or_else(|| panic!("{name} decoded to nothing"));
        self.push(shard_id, Ok(event));
    }
}

#[async_trait]
impl ShardConnector for FakeConnector {
    async fn recommended_shards(&self) -> Result<u32> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);
        self.recommended
            .ok_or_else(|| GatewayError::ShardDiscovery("gateway unreachable".into()))
    }

    fn connect(&self, shard_id: u32, total: u32) -> Result<Box<dyn ShardStream>> {
        if self.fail_shard == Some(shard_id) {
            return Err(GatewayError::ShardConstruction {
                shard_id,
                total,
                source: Some("bad shard config".into()),
            });
        }
        let rx = self
            .receivers
            .lock()
            .unwrap()
            .get_mut(shard_id as usize)
            .and_then(Option::take)
            .ok_or(GatewayError::ShardConstruction {
                shard_id,
                total,
                source: None,
            })?;
        Ok(Box::new(FakeStream { rx }))
    }
}

struct FakeStream {
    rx: mpsc::UnboundedReceiver<Item>,
}

#[async_trait]
impl ShardStream for FakeStream {
    async fn next_event(&mut self) -> Option<Item> {
        self.rx.recv().await
    }
}

/// Transport recording every outbound call
#[derive(Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<String>>,
    invite_guild: Option<u64>,
}

impl FakeTransport {
    /// Transport whose invite lookups resolve to `guild`
    pub fn with_invite_guild(guild: u64) -> Self {
        Self {
            invite_guild: Some(guild),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_text(&self, channel: Id<ChannelMarker>, text: &str) -> Result<()> {
        self.record(format!("send_text {channel} {text}"));
        Ok(())
    }
    async fn send_embed(&self, channel: Id<ChannelMarker>, embed: &Embed) -> Result<()> {
        self.record(format!("send_embed {channel} {}", embed.description));
        Ok(())
    }
    async fn send_file(&self, channel: Id<ChannelMarker>, name: &str, _data: Vec<u8>) -> Result<()> {
        self.record(format!("send_file {channel} {name}"));
        Ok(())
    }
    async fn delete_message(&self, channel: Id<ChannelMarker>, message: Id<MessageMarker>) -> Result<()> {
        self.record(format!("delete_message {channel} {message}"));
        Ok(())
    }
    async fn ban(&self, guild: Id<GuildMarker>, user: Id<UserMarker>, secs: u32) -> Result<()> {
        self.record(format!("ban {guild} {user} {secs}"));
        Ok(())
    }
    async fn unban(&self, guild: Id<GuildMarker>, user: Id<UserMarker>) -> Result<()> {
        self.record(format!("unban {guild} {user}"));
        Ok(())
    }
    async fn typing(&self, channel: Id<ChannelMarker>) -> Result<()> {
        self.record(format!("typing {channel}"));
        Ok(())
    }
    async fn create_private_channel(&self, user: Id<UserMarker>) -> Result<Id<ChannelMarker>> {
        self.record(format!("create_private_channel {user}"));
        Ok(Id::new(700))
    }
    async fn invite_guild(&self, code: &str) -> Result<Option<Id<GuildMarker>>> {
        self.record(format!("invite {code}"));
        Ok(self.invite_guild.map(Id::new))
    }
    async fn accept_invite(&self, code: &str) -> Result<()> {
        self.record(format!("accept_invite {code}"));
        Ok(())
    }
    async fn fetch_messages(
        &self,
        channel: Id<ChannelMarker>,
        limit: u16,
        _before: Option<Id<MessageMarker>>,
    ) -> Result<Vec<RawMessage>> {
        self.record(format!("fetch_messages {channel} {limit}"));
        Ok(Vec::new())
    }
}

pub fn config(shard_count: Option<u32>) -> ClientConfig {
    ClientConfig::from_lookup(|key| match key {
        "DISCORD_TOKEN" => Some("test-token".to_string()),
        "OWNER_USER_ID" => Some(BOB.to_string()),
        "SHARD_QUEUE_CAPACITY" => Some("4".to_string()),
        "EVENT_QUEUE_CAPACITY" => Some("8".to_string()),
        "SHARD_COUNT" => shard_count.map(|n| n.to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn client(
    connector: &Arc<FakeConnector>,
    transport: &Arc<FakeTransport>,
    shard_count: Option<u32>,
) -> Client {
    let connector: Arc<dyn ShardConnector> = connector.clone();
    let transport: Arc<dyn Transport> = transport.clone();
    Client::new(
        config(shard_count),
        connector,
        transport,
        Arc::new(GatewayMetrics::detached()),
    )
}

/// Next envelope, failing the test instead of hanging
pub async fn next(queue: &mut EventQueue) -> MessageEnvelope {
    tokio::time::timeout(Duration::from_secs(5), queue.recv())
        .await
        .expect("timed out waiting for an envelope")
        .expect("event queue closed")
}

pub fn ready(bot: u64) -> Value {
    json!({ "user": { "id": bot.to_string(), "username": "bridge", "bot": true } })
}

pub fn guild() -> Value {
    json!({
        "id": GUILD.to_string(),
        "name": "Test Guild",
        "owner_id": OWNER.to_string(),
        "roles": [
            { "id": GUILD.to_string(), "name": "@everyone", "position": 0, "permissions": "3072" },
            { "id": "200", "name": "Admins", "position": 2, "color": 3447003, "permissions": "8" },
            { "id": "300", "name": "Plain", "position": 1, "color": 0, "permissions": "0" }
        ],
        "channels": [
            { "id": GENERAL.to_string(), "type": 0, "name": "general" },
            { "id": RANDOM.to_string(), "type": 0, "name": "random" }
        ],
        "members": [
            { "user": { "id": OWNER.to_string(), "username": "owner" }, "roles": [] },
            { "user": { "id": ALICE.to_string(), "username": "alice" }, "nick": "Ally", "roles": ["200"] },
            { "user": { "id": BOB.to_string(), "username": "bob" }, "roles": ["300"] },
            { "user": { "id": BOT.to_string(), "username": "bridge", "bot": true }, "roles": ["200"] }
        ]
    })
}

/// MESSAGE_CREATE / MESSAGE_UPDATE payload in #general
pub fn message(id: u64, author: u64, content: &str, bot: bool) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": GENERAL.to_string(),
        "guild_id": GUILD.to_string(),
        "author": { "id": author.to_string(), "username": format!("user{author}"), "bot": bot },
        "content": content,
        "timestamp": "2024-03-01T12:00:00.000000+00:00"
    })
}

pub fn deleted(id: u64) -> Value {
    json!({ "id": id.to_string(), "channel_id": GENERAL.to_string(), "guild_id": GUILD.to_string() })
}
