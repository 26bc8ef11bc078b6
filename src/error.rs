//! Domain error types for the shard client
//!
//! main.rs is the ONLY module allowed to use anyhow::Result (process boundary).
//! All library code returns Result<T, GatewayError>.

use thiserror::Error;

/// Boxed source error from an external collaborator (gateway, HTTP).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shard client domain errors
///
/// Every variant carries structured context fields for diagnostics.
/// Callers pattern-match on the variant to tell an expected outcome
/// (`NotFound`, `AlreadyJoined`) from a genuine failure.
///
/// Example log output:
/// ```text
/// GatewayError::ShardCircuitBroken { shard_id: 3, count: 10, max: 10 }
/// → "shard 3 exceeded consecutive error threshold (10/10)"
/// ```
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Recommended shard count could not be fetched
    #[error("shard count discovery failed")]
    ShardDiscovery(#[source] BoxError),

    /// Discovery or configuration produced an unusable shard count
    #[error("invalid shard count {count}")]
    InvalidShardCount { count: u32 },

    /// A shard connection object could not be constructed
    #[error("shard {shard_id}/{total} could not be constructed")]
    ShardConstruction {
        shard_id: u32,
        total: u32,
        #[source]
        source: Option<BoxError>,
    },

    /// Shard exceeded consecutive error threshold (circuit breaker tripped)
    #[error("shard {shard_id} exceeded consecutive error threshold ({count}/{max})")]
    ShardCircuitBroken { shard_id: u32, count: u32, max: u32 },

    /// Shard reconnection failed (fatal, shard marked dead)
    #[error("shard {shard_id} reconnection failed")]
    ShardReconnectFailed {
        shard_id: u32,
        #[source]
        source: BoxError,
    },

    /// `open()` was called on a client that is already open
    #[error("client is already open")]
    AlreadyOpen,

    /// Lookup missed every shard cache
    #[error("{resource} {id} not found in any shard cache")]
    NotFound { resource: &'static str, id: u64 },

    /// Invite points at a guild the client is already a member of
    #[error("already joined")]
    AlreadyJoined,

    /// Identifier string is not a valid snowflake
    #[error("invalid {kind} id '{value}'")]
    InvalidId { kind: &'static str, value: String },

    /// Outbound REST call failed
    #[error("{operation} request failed")]
    Http {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// The transport cannot perform this operation
    #[error("{operation} is not supported by this transport")]
    Unsupported { operation: &'static str },

    /// Gateway payload could not be projected into a cache record
    #[error("failed to decode {event} payload")]
    Decode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// Message carries no timestamp (delete events)
    #[error("message has no timestamp")]
    MissingTimestamp,

    /// Message timestamp is malformed
    #[error("invalid message timestamp")]
    InvalidTimestamp(#[source] BoxError),

    /// Configuration error (environment variable missing or invalid)
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Returns a static label string suitable for Prometheus metrics.
    ///
    /// Used as the `error_type` label on `gateway_errors_total` and
    /// `gateway_outbound_total` counters.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            Self::ShardDiscovery(_) => "shard_discovery",
            Self::InvalidShardCount { .. } => "invalid_shard_count",
            Self::ShardConstruction { .. } => "shard_construction",
            Self::ShardCircuitBroken { .. } => "circuit_broken",
            Self::ShardReconnectFailed { .. } => "reconnect_failed",
            Self::AlreadyOpen => "already_open",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyJoined => "already_joined",
            Self::InvalidId { .. } => "invalid_id",
            Self::Http { .. } => "http",
            Self::Unsupported { .. } => "unsupported",
            Self::Decode { .. } => "decode",
            Self::MissingTimestamp => "missing_timestamp",
            Self::InvalidTimestamp(_) => "invalid_timestamp",
            Self::Config(_) => "config",
        }
    }

    /// Shorthand for a cache miss.
    pub(crate) fn not_found(resource: &'static str, id: u64) -> Self {
        Self::NotFound { resource, id }
    }

    /// True for a lookup miss, which callers treat as "render unresolved".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;
