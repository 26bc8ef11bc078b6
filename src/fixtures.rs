//! Shared unit-test fixtures

use crate::aggregator::StateAggregator;
use crate::events::decode::ShardEvent;
use crate::model::RawMessage;
use serde_json::{json, Value};
use std::sync::Arc;

pub const GUILD: u64 = 100;
pub const GENERAL: u64 = 101;
pub const RANDOM: u64 = 102;
pub const ADMINS_ROLE: u64 = 200;
pub const MODS_ROLE: u64 = 300;
pub const ADMINS_COLOR: u32 = 3447003;

/// Guild owner
pub const OWNER: u64 = 1;
/// Nickname "Ally", Admins role
pub const ALICE: u64 = 2;
/// Empty nickname, no roles
pub const BOB: u64 = 3;
/// Mods role
pub const CAROL: u64 = 4;

pub fn state(shards: u32) -> Arc<StateAggregator> {
    let state = StateAggregator::new();
    state.install(shards).unwrap();
    Arc::new(state)
}

pub fn dispatch(name: &str, data: Value) -> ShardEvent {
    ShardEvent::from_dispatch(name, data)
        .unwrap()
        .unwrap_or_else(|| panic!("{name} decoded to nothing"))
}

pub fn raw_message(data: Value) -> RawMessage {
    serde_json::from_value(data).unwrap()
}

pub fn test_guild() -> ShardEvent {
    dispatch(
        "GUILD_CREATE",
        json!({
            "id": GUILD.to_string(),
            "name": "Test Guild",
            "owner_id": OWNER.to_string(),
            "roles": [
                { "id": GUILD.to_string(), "name": "@everyone", "position": 0, "permissions": "3072" },
                { "id": ADMINS_ROLE.to_string(), "name": "Admins", "position": 2, "color": ADMINS_COLOR, "permissions": "8" },
                { "id": MODS_ROLE.to_string(), "name": "Mods", "position": 1, "permissions": "16" }
            ],
            "channels": [
                { "id": GENERAL.to_string(), "type": 0, "name": "general" },
                { "id": RANDOM.to_string(), "type": 0, "name": "random" }
            ],
            "members": [
                { "user": { "id": OWNER.to_string(), "username": "owner" }, "roles": [] },
                { "user": { "id": ALICE.to_string(), "username": "alice" }, "nick": "Ally", "roles": [ADMINS_ROLE.to_string()] },
                { "user": { "id": BOB.to_string(), "username": "bob" }, "nick": "", "roles": [] },
                { "user": { "id": CAROL.to_string(), "username": "carol" }, "roles": [MODS_ROLE.to_string()] }
            ]
        }),
    )
}

/// Guild message from `author` in #general
pub fn guild_message(author: u64, username: &str, content: &str) -> RawMessage {
    raw_message(json!({
        "id": "5000",
        "channel_id": GENERAL.to_string(),
        "guild_id": GUILD.to_string(),
        "author": { "id": author.to_string(), "username": username },
        "content": content,
        "timestamp": "2021-01-01T01:01:01.010000+00:00"
    }))
}
