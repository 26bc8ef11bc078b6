//! Shard management module
//!
//! One connection per shard, run as independent tasks behind the
//! `ShardConnector` seam.

mod connector;
mod pool;
mod state;
mod twilight;

pub use connector::{ReceiveError, ShardConnector, ShardStream};
pub use pool::{PoolHandle, ShardPool, MAX_CONSECUTIVE_ERRORS};
pub use state::{ShardHealth, ShardSnapshot, ShardState};
pub use twilight::TwilightConnector;
