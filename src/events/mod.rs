//! Event handling module
//!
//! Decodes shard dispatches, wraps message events in envelopes and feeds
//! them through the filter into the consumer queue.

pub mod decode;
pub mod dispatch;
pub mod envelope;

pub use decode::{GuildPatch, ShardEvent};
pub use dispatch::{admit, Dispatcher, DropReason, EventQueue, ShardMessage};
pub use envelope::{ChatMessage, MessageEnvelope, MessageKind};
