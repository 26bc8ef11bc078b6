//! Shard state tracking
//!
//! Health and counters for each shard, shared between the shard tasks, the
//! fan-in stage and the health endpoints.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Health status for a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardHealth {
    /// Shard is connecting
    Connecting,
    /// Shard is ready and receiving events
    Ready,
    /// Shard is resuming after disconnect
    Resuming,
    /// Transient receive error, twilight is reconnecting
    Disconnected,
    /// Shard task stopped on a fatal error
    Dead,
    /// Shard task stopped by shutdown or end of stream
    Stopped,
}

impl ShardHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ShardHealth::Ready | ShardHealth::Resuming)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ShardHealth::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShardHealth::Connecting => "connecting",
            ShardHealth::Ready => "ready",
            ShardHealth::Resuming => "resuming",
            ShardHealth::Disconnected => "disconnected",
            ShardHealth::Dead => "dead",
            ShardHealth::Stopped => "stopped",
        }
    }
}

#[derive(Debug)]
struct ShardStateEntry {
    health: ShardHealth,
    guilds: u64,
    events_received: AtomicU64,
    events_dispatched: AtomicU64,
    events_filtered: AtomicU64,
    last_heartbeat: Option<Instant>,
    connected_at: Option<Instant>,
}

impl Default for ShardStateEntry {
    fn default() -> Self {
        Self {
            health: ShardHealth::Connecting,
            guilds: 0,
            events_received: AtomicU64::new(0),
            events_dispatched: AtomicU64::new(0),
            events_filtered: AtomicU64::new(0),
            last_heartbeat: None,
            connected_at: None,
        }
    }
}

/// Point-in-time view of one shard
#[derive(Debug, Clone, Serialize)]
pub struct ShardSnapshot {
    pub shard_id: u32,
    pub health: ShardHealth,
    pub guilds: u64,
    pub events_received: u64,
    pub events_dispatched: u64,
    pub events_filtered: u64,
    /// Milliseconds since the last heartbeat ack
    pub heartbeat_age_ms: Option<u64>,
}

/// Shared state across all shards of a client
#[derive(Debug, Clone)]
pub struct ShardState {
    inner: Arc<ShardStateInner>,
}

#[derive(Debug)]
struct ShardStateInner {
    shards: DashMap<u32, ShardStateEntry>,
    total_shards: u32,
}

impl ShardState {
    pub fn new(shard_ids: impl IntoIterator<Item = u32>, total_shards: u32) -> Self {
        let shards = shard_ids
            .into_iter()
            .map(|id| (id, ShardStateEntry::default()))
            .collect();

        Self {
            inner: Arc::new(ShardStateInner {
                shards,
                total_shards,
            }),
        }
    }

    pub fn total_shards(&self) -> u32 {
        self.inner.total_shards
    }

    pub fn set_health(&self, shard_id: u32, health: ShardHealth) {
        if let Some(mut entry) = self.inner.shards.get_mut(&shard_id) {
            entry.health = health;
            if health == ShardHealth::Ready && entry.connected_at.is_none() {
                entry.connected_at = Some(Instant::now());
            }
        }
    }

    pub fn set_guilds(&self, shard_id: u32, count: u64) {
        if let Some(mut entry) = self.inner.shards.get_mut(&shard_id) {
            entry.guilds = count;
        }
    }

    pub fn record_event(&self, shard_id: u32) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            entry.events_received.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Message event delivered to the output queue
    pub fn record_dispatch(&self, shard_id: u32) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            entry.events_dispatched.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Message event dropped by the filter
    pub fn record_filtered(&self, shard_id: u32) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            entry.events_filtered.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_heartbeat(&self, shard_id: u32) {
        if let Some(mut entry) = self.inner.shards.get_mut(&shard_id) {
            entry.last_heartbeat = Some(Instant::now());
        }
    }

    pub fn get_health(&self, shard_id: u32) -> Option<ShardHealth> {
        self.inner.shards.get(&shard_id).map(|e| e.health)
    }

    pub fn snapshot(&self, shard_id: u32) -> Option<ShardSnapshot> {
        self.inner.shards.get(&shard_id).map(|e| ShardSnapshot {
            shard_id,
            health: e.health,
            guilds: e.guilds,
            events_received: e.events_received.load(Ordering::Relaxed),
            events_dispatched: e.events_dispatched.load(Ordering::Relaxed),
            events_filtered: e.events_filtered.load(Ordering::Relaxed),
            heartbeat_age_ms: e
                .last_heartbeat
                .map(|at| u64::try_from(at.elapsed().as_millis()).unwrap_or(u64::MAX)),
        })
    }

    /// Snapshots ordered by shard id
    pub fn snapshots(&self) -> Vec<ShardSnapshot> {
        let mut ids: Vec<u32> = self.inner.shards.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids.into_iter().filter_map(|id| self.snapshot(id)).collect()
    }

    pub fn total_events_received(&self) -> u64 {
        self.sum(|e| e.events_received.load(Ordering::Relaxed))
    }

    pub fn total_events_dispatched(&self) -> u64 {
        self.sum(|e| e.events_dispatched.load(Ordering::Relaxed))
    }

    pub fn total_events_filtered(&self) -> u64 {
        self.sum(|e| e.events_filtered.load(Ordering::Relaxed))
    }

    pub fn total_guilds(&self) -> u64 {
        self.sum(|e| e.guilds)
    }

    fn sum(&self, field: impl Fn(&ShardStateEntry) -> u64) -> u64 {
        self.inner.shards.iter().map(|e| field(e.value())).sum()
    }

    pub fn ready_shards(&self) -> usize {
        self.count(ShardHealth::is_ready)
    }

    /// Ready or resuming
    pub fn healthy_shards(&self) -> usize {
        self.count(ShardHealth::is_healthy)
    }

    pub fn dead_shards(&self) -> usize {
        self.count(|h| *h == ShardHealth::Dead)
    }

    fn count(&self, pred: impl Fn(&ShardHealth) -> bool) -> usize {
        self.inner
            .shards
            .iter()
            .filter(|e| pred(&e.health))
            .count()
    }

    pub fn shard_count(&self) -> usize {
        self.inner.shards.len()
    }

    /// At least one shard ready
    pub fn is_ready(&self) -> bool {
        self.ready_shards() > 0
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy_shards() == self.shard_count()
    }
}
