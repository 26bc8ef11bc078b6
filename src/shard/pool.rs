//! Shard pool implementation
//!
//! Discovers the shard count, constructs every shard connection up front
//! (fail-fast), then runs one task per shard. Each task folds its events
//! into the shard's cache and queues message events for the fan-in stage.

use crate::aggregator::StateAggregator;
use crate::error::{GatewayError, Result};
use crate::events::{Dispatcher, MessageEnvelope, ShardEvent, ShardMessage};
use crate::metrics::GatewayMetrics;
use crate::shard::connector::{ShardConnector, ShardStream};
use crate::shard::state::{ShardHealth, ShardState};

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Consecutive receive errors after which a shard is marked dead
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Constructed but not yet running shards
pub struct ShardPool {
    streams: Vec<Box<dyn ShardStream>>,
    state: Arc<StateAggregator>,
    shard_state: ShardState,
    metrics: Arc<GatewayMetrics>,
    queue_capacity: usize,
}

impl ShardPool {
    /// Create every shard connection.
    ///
    /// `shard_count` overrides discovery. Any discovery or construction
    /// failure aborts the whole pool; the aggregator is only installed once
    /// every shard exists.
    pub async fn new(
        connector: &dyn ShardConnector,
        shard_count: Option<u32>,
        state: Arc<StateAggregator>,
        metrics: Arc<GatewayMetrics>,
        queue_capacity: usize,
    ) -> Result<Self> {
        let total = match shard_count {
            Some(count) => {
                info!(shard_count = count, "Using configured shard count");
                count
            }
            None => connector.recommended_shards().await?,
        };

        if total == 0 {
            return Err(GatewayError::InvalidShardCount { count: total });
        }

        info!(shard_count = total, "Creating shard pool");

        let mut streams = Vec::with_capacity(total as usize);
        for shard_id in 0..total {
            let stream = connector.connect(shard_id, total).inspect_err(|e| {
                error!(shard_id, total, error = %e, "Shard construction failed");
            })?;
            streams.push(stream);
        }

        state.install(total)?;

        Ok(Self {
            streams,
            state,
            shard_state: ShardState::new(0..total, total),
            metrics,
            queue_capacity: queue_capacity.max(1),
        })
    }

    /// Shared health state (for health checks)
    pub fn state(&self) -> ShardState {
        self.shard_state.clone()
    }

    /// Spawn the shard tasks and the fan-in stage feeding `output`
    pub fn start(self, output: mpsc::Sender<MessageEnvelope>) -> PoolHandle {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut inputs = Vec::with_capacity(self.streams.len());
        let mut shards = Vec::with_capacity(self.streams.len());

        for (shard_id, stream) in (0u32..).zip(self.streams) {
            let (tx, rx) = mpsc::channel(self.queue_capacity);
            inputs.push(rx);

            let runner = ShardRunner {
                shard_id,
                state: Arc::clone(&self.state),
                shard_state: self.shard_state.clone(),
                metrics: Arc::clone(&self.metrics),
                queue: tx,
            };
            let mut shutdown_rx = shutdown_tx.subscribe();

            shards.push(tokio::spawn(async move {
                let shard_state = runner.shard_state.clone();
                tokio::select! {
                    result = runner.run(stream) => {
                        match result {
                            Ok(()) => shard_state.set_health(shard_id, ShardHealth::Stopped),
                            Err(e) => error!(shard_id, error = %e, "Shard task failed"),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!(shard_id, "Shard received shutdown signal");
                        shard_state.set_health(shard_id, ShardHealth::Stopped);
                    }
                }
            }));
        }

        let fan_in = Dispatcher::new(self.state, self.shard_state.clone(), self.metrics)
            .spawn(inputs, output, shutdown_tx.subscribe());

        PoolHandle {
            shutdown_tx,
            shards,
            fan_in,
            shard_state: self.shard_state,
        }
    }
}

/// Running pool
pub struct PoolHandle {
    shutdown_tx: broadcast::Sender<()>,
    shards: Vec<JoinHandle<()>>,
    fan_in: JoinHandle<()>,
    shard_state: ShardState,
}

impl PoolHandle {
    /// Signal shutdown to all shards
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn state(&self) -> ShardState {
        self.shard_state.clone()
    }

    /// Wait for every shard task and the fan-in stage to finish.
    ///
    /// Only returns promptly after `shutdown`; otherwise it waits for the
    /// shard streams to end.
    pub async fn join(self) {
        for handle in self.shards {
            if let Err(e) = handle.await {
                warn!(error = %e, "Shard task panicked");
            }
        }
        if let Err(e) = self.fan_in.await {
            warn!(error = %e, "Fan-in task panicked");
        }
        info!("Shard pool shut down");
    }
}

/// Event loop of one shard
struct ShardRunner {
    shard_id: u32,
    state: Arc<StateAggregator>,
    shard_state: ShardState,
    metrics: Arc<GatewayMetrics>,
    queue: mpsc::Sender<ShardMessage>,
}

impl ShardRunner {
    async fn run(&self, mut stream: Box<dyn ShardStream>) -> Result<()> {
        let shard_id = self.shard_id;
        self.shard_state.set_health(shard_id, ShardHealth::Connecting);
        info!(shard_id, "Shard starting");

        let mut consecutive_errors: u32 = 0;

        while let Some(item) = stream.next_event().await {
            let event = match item {
                Ok(event) => {
                    consecutive_errors = 0;
                    event
                }
                Err(source) => {
                    consecutive_errors += 1;
                    warn!(shard_id, error = %source, consecutive = consecutive_errors, "Error receiving event");

                    if source.fatal {
                        let err = GatewayError::ShardReconnectFailed {
                            shard_id,
                            source: source.source,
                        };
                        return Err(self.kill(err));
                    }

                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        let err = GatewayError::ShardCircuitBroken {
                            shard_id,
                            count: consecutive_errors,
                            max: MAX_CONSECUTIVE_ERRORS,
                        };
                        return Err(self.kill(err));
                    }

                    self.metrics.record_error(shard_id, "receive_error");
                    self.shard_state.set_health(shard_id, ShardHealth::Disconnected);
                    continue;
                }
            };

            self.shard_state.record_event(shard_id);
            self.metrics.record_event(shard_id, event.label());

            if !self.handle(event).await {
                info!(shard_id, "Shard queue closed, stopping shard");
                return Ok(());
            }
        }

        info!(shard_id, "Shard event stream ended");
        Ok(())
    }

    /// Apply one event. Returns false once the fan-in stage is gone.
    async fn handle(&self, event: ShardEvent) -> bool {
        let shard_id = self.shard_id;

        match &event {
            ShardEvent::Ready { user } => {
                self.shard_state.set_health(shard_id, ShardHealth::Ready);
                info!(shard_id, user_id = %user.id, user = %user.name, "Shard ready");
            }
            ShardEvent::Resumed => {
                self.shard_state.set_health(shard_id, ShardHealth::Ready);
                info!(shard_id, "Shard resumed");
            }
            ShardEvent::HeartbeatAck => {
                self.shard_state.record_heartbeat(shard_id);
                self.metrics.record_heartbeat(shard_id);
            }
            ShardEvent::GuildAvailable(guild) => {
                debug!(shard_id, guild_id = %guild.id, "Guild available");
            }
            ShardEvent::GuildRemoved {
                guild_id,
                unavailable,
            } => {
                debug!(shard_id, guild_id = %guild_id, unavailable, "Guild removed");
            }
            _ => {}
        }

        let touches_guilds = matches!(
            event,
            ShardEvent::GuildAvailable(_) | ShardEvent::GuildRemoved { .. }
        );

        match event {
            ShardEvent::Message { kind, message } => {
                self.state.observe_message(shard_id, &message);
                let queued = ShardMessage {
                    shard_id,
                    kind,
                    message,
                };
                return self.queue.send(queued).await.is_ok();
            }
            other => self.state.apply(shard_id, other),
        }

        if touches_guilds {
            let guilds = self.state.shard_guild_count(shard_id);
            self.shard_state.set_guilds(shard_id, guilds as u64);
            self.metrics.set_guilds(shard_id, guilds);
        }
        true
    }

    fn kill(&self, err: GatewayError) -> GatewayError {
        self.metrics.record_error(self.shard_id, err.error_type_label());
        self.shard_state.set_health(self.shard_id, ShardHealth::Dead);
        error!(shard_id = self.shard_id, error = %err, "Shard dead");
        err
    }
}
