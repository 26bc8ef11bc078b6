//! Client configuration module
//!
//! Loaded once at startup from environment variables and passed explicitly
//! to every component that needs it.

use crate::error::GatewayError;
use std::env;
use std::str::FromStr;
use twilight_gateway::Intents;
use twilight_model::id::{marker::UserMarker, Id};

/// Default bound of each per-shard queue
pub const DEFAULT_SHARD_QUEUE_CAPACITY: usize = 256;

/// Default bound of the merged output queue
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Discord bot token
    pub discord_token: String,

    /// Bot owner, for the owner/moderator predicates
    pub owner_user_id: Option<Id<UserMarker>>,

    /// Overrides the shard count recommended by Discord
    pub shard_count: Option<u32>,

    /// Bound of each per-shard queue feeding the fan-in stage
    pub shard_queue_capacity: usize,

    /// Bound of the merged output queue handed to consumers
    pub event_queue_capacity: usize,

    /// Command prefix advertised to the command layer
    pub command_prefix: String,

    /// Health/metrics HTTP port
    pub http_port: u16,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .or_else(|| lookup("DISCORD_BOT_TOKEN"))
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                GatewayError::Config("DISCORD_TOKEN or DISCORD_BOT_TOKEN must be set".to_string())
            })?;

        let owner_user_id = match lookup("OWNER_USER_ID").filter(|v| !v.is_empty()) {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .ok()
                    .and_then(Id::new_checked)
                    .ok_or_else(|| {
                        GatewayError::Config(format!("OWNER_USER_ID must be a user id, got '{raw}'"))
                    })?,
            ),
            None => None,
        };

        let shard_count = match lookup("SHARD_COUNT") {
            Some(raw) => {
                let count: u32 = parse_var("SHARD_COUNT", &raw)?;
                if count == 0 {
                    return Err(GatewayError::Config(
                        "SHARD_COUNT must be at least 1".to_string(),
                    ));
                }
                Some(count)
            }
            None => None,
        };

        let shard_queue_capacity = capacity(
            "SHARD_QUEUE_CAPACITY",
            lookup("SHARD_QUEUE_CAPACITY"),
            DEFAULT_SHARD_QUEUE_CAPACITY,
        )?;
        let event_queue_capacity = capacity(
            "EVENT_QUEUE_CAPACITY",
            lookup("EVENT_QUEUE_CAPACITY"),
            DEFAULT_EVENT_QUEUE_CAPACITY,
        )?;

        let command_prefix = lookup("COMMAND_PREFIX").unwrap_or_else(|| "?".to_string());

        let http_port = parse_var(
            "HTTP_PORT",
            &lookup("HTTP_PORT")
                .or_else(|| lookup("METRICS_PORT")) // Backwards compat
                .unwrap_or_else(|| "9090".to_string()),
        )?;

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            discord_token,
            owner_user_id,
            shard_count,
            shard_queue_capacity,
            event_queue_capacity,
            command_prefix,
            http_port,
            log_level,
        })
    }

    /// Get configured Discord intents
    ///
    /// - GUILDS: guild, channel and role lifecycle for the shard caches
    /// - GUILD_MEMBERS: member events for display names and permissions (privileged)
    /// - GUILD_MESSAGES / DIRECT_MESSAGES: the message stream
    /// - MESSAGE_CONTENT: raw content for normalization (privileged)
    pub fn intents() -> Intents {
        Intents::GUILDS
            | Intents::GUILD_MEMBERS
            | Intents::GUILD_MESSAGES
            | Intents::DIRECT_MESSAGES
            | Intents::MESSAGE_CONTENT
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, GatewayError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| GatewayError::Config(format!("{key} must be a valid number: {e}")))
}

fn capacity(key: &str, raw: Option<String>, default: usize) -> Result<usize, GatewayError> {
    let value = match raw {
        Some(raw) => parse_var(key, &raw)?,
        None => default,
    };
    if value == 0 {
        return Err(GatewayError::Config(format!("{key} must be at least 1")));
    }
    Ok(value)
}
