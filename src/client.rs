//! Top-level client
//!
//! Owns the state aggregator, the action gateway and the authorizer, and
//! runs the shard pool once `open` succeeds.

use crate::actions::{ActionGateway, Transport};
use crate::aggregator::StateAggregator;
use crate::auth::Authorizer;
use crate::config::ClientConfig;
use crate::error::{GatewayError, Result};
use crate::events::{ChatMessage, EventQueue};
use crate::metrics::GatewayMetrics;
use crate::model::UserRecord;
use crate::shard::{PoolHandle, ShardConnector, ShardPool, ShardState};
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, Mutex};
use tracing::info;

pub struct Client {
    config: ClientConfig,
    connector: Arc<dyn ShardConnector>,
    state: Arc<StateAggregator>,
    actions: ActionGateway,
    auth: Authorizer,
    metrics: Arc<GatewayMetrics>,
    pool: Mutex<Option<PoolHandle>>,
    shard_state: OnceLock<ShardState>,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        connector: Arc<dyn ShardConnector>,
        transport: Arc<dyn Transport>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        let state = Arc::new(StateAggregator::new());
        let actions = ActionGateway::new(transport, Arc::clone(&state), Arc::clone(&metrics));
        let auth = Authorizer::new(Arc::clone(&state), config.owner_user_id);

        Self {
            config,
            connector,
            state,
            actions,
            auth,
            metrics,
            pool: Mutex::new(None),
            shard_state: OnceLock::new(),
        }
    }

    /// Start every shard and return the consumer queue.
    ///
    /// Discovery or construction failures abort before any shard runs and
    /// may be retried. Once a call succeeds, later calls fail with
    /// `AlreadyOpen`.
    pub async fn open(&self) -> Result<EventQueue> {
        let mut pool_slot = self.pool.lock().await;
        if pool_slot.is_some() || self.shard_state.get().is_some() {
            return Err(GatewayError::AlreadyOpen);
        }

        let pool = ShardPool::new(
            self.connector.as_ref(),
            self.config.shard_count,
            Arc::clone(&self.state),
            Arc::clone(&self.metrics),
            self.config.shard_queue_capacity,
        )
        .await?;

        let (tx, rx) = mpsc::channel(self.config.event_queue_capacity.max(1));
        let handle = pool.start(tx);
        let _ = self.shard_state.set(handle.state());

        info!(
            shard_count = self.state.shard_count(),
            event_queue_capacity = self.config.event_queue_capacity,
            "Client open"
        );

        *pool_slot = Some(handle);
        Ok(EventQueue::new(rx))
    }

    /// Stop every shard task and the fan-in stage and wait for them.
    ///
    /// Returns even when the event queue is full and unread. Envelopes
    /// already queued stay readable, then the queue reports end of stream;
    /// events not yet dispatched are discarded.
    pub async fn shutdown(&self) {
        let handle = self.pool.lock().await.take();
        if let Some(handle) = handle {
            info!("Shutting down shards");
            handle.shutdown();
            handle.join().await;
        }
    }

    /// Shard health; `None` before `open`
    pub fn shard_state(&self) -> Option<ShardState> {
        self.shard_state.get().cloned()
    }

    pub fn state(&self) -> &Arc<StateAggregator> {
        &self.state
    }

    pub fn actions(&self) -> &ActionGateway {
        &self.actions
    }

    pub fn auth(&self) -> &Authorizer {
        &self.auth
    }

    /// Bot identity from the latest READY
    pub fn current_user(&self) -> Option<UserRecord> {
        self.state.current_user()
    }

    pub fn is_me(&self, message: &dyn ChatMessage) -> bool {
        self.auth.is_me(message)
    }

    /// Display name of the message author
    pub fn nickname<'a>(&self, message: &'a dyn ChatMessage) -> &'a str {
        message.user_name()
    }

    /// Number of guilds across all shards
    pub fn channel_count(&self) -> usize {
        self.state.guilds().len()
    }

    pub fn command_prefix(&self) -> &str {
        &self.config.command_prefix
    }
}
