//! Multi-shard Discord client core
//!
//! - Runs one gateway connection per shard and keeps a cache fragment for each
//! - Aggregates the fragments behind one lookup surface with O(1) routing
//! - Normalizes message events into envelopes on one bounded, ordered queue
//! - Mediates outbound actions and authorization checks
//!
//! Library code returns [`error::GatewayError`]; the binary is the only
//! place that converts to `anyhow`.

pub mod actions;
pub mod aggregator;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod shard;

#[cfg(test)]
mod fixtures;

pub use actions::{ActionGateway, Transport, TwilightTransport};
pub use aggregator::{StateAggregator, NO_COLOR};
pub use auth::Authorizer;
pub use client::Client;
pub use config::ClientConfig;
pub use error::{GatewayError, Result};
pub use events::{ChatMessage, EventQueue, MessageEnvelope, MessageKind, ShardEvent};
pub use metrics::GatewayMetrics;
pub use shard::{ShardConnector, ShardHealth, ShardState, ShardStream, TwilightConnector};
