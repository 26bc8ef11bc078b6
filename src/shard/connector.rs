//! Connection seams
//!
//! The pool only talks to shards through these traits. The twilight
//! implementation lives in `shard::twilight`; tests drive the pool with
//! scripted streams.

use crate::error::{BoxError, Result};
use crate::events::ShardEvent;
use async_trait::async_trait;
use std::fmt;

/// Creates shard connections
#[async_trait]
pub trait ShardConnector: Send + Sync {
    /// Shard count recommended by the platform
    async fn recommended_shards(&self) -> Result<u32>;

    /// Construct the connection for one shard.
    ///
    /// Construction only; the connection is established lazily when the
    /// stream is first polled.
    fn connect(&self, shard_id: u32, total: u32) -> Result<Box<dyn ShardStream>>;
}

/// Event stream of one shard connection
#[async_trait]
pub trait ShardStream: Send {
    /// Next decoded event. `None` when the connection is closed for good.
    async fn next_event(&mut self) -> Option<std::result::Result<ShardEvent, ReceiveError>>;
}

/// Failure to receive the next event
#[derive(Debug)]
pub struct ReceiveError {
    /// The connection cannot recover
    pub fatal: bool,
    pub source: BoxError,
}

impl ReceiveError {
    pub fn transient(source: impl Into<BoxError>) -> Self {
        Self {
            fatal: false,
            source: source.into(),
        }
    }

    pub fn fatal(source: impl Into<BoxError>) -> Self {
        Self {
            fatal: true,
            source: source.into(),
        }
    }
}

impl fmt::Display for ReceiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fatal {
            write!(f, "fatal receive error: {}", self.source)
        } else {
            write!(f, "receive error: {}", self.source)
        }
    }
}

impl std::error::Error for ReceiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}
