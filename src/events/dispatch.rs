//! Event dispatch
//!
//! Each shard task pushes its message events into its own bounded queue.
//! A single fan-in task merges those queues, drops events that must not
//! reach consumers, wraps survivors in `MessageEnvelope`s and forwards them
//! to the bounded output queue.
//!
//! Backpressure policy: bounded-with-block. A full output queue blocks the
//! fan-in task; the shard queues then fill and block their shard tasks.
//! Nothing is dropped for lack of capacity. Order is preserved per shard;
//! events from different shards interleave in receipt order.

use crate::aggregator::StateAggregator;
use crate::events::envelope::{ChatMessage, MessageEnvelope, MessageKind};
use crate::metrics::GatewayMetrics;
use crate::model::RawMessage;
use crate::shard::ShardState;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

/// Message event as queued by a shard task
#[derive(Debug, Clone)]
pub struct ShardMessage {
    pub shard_id: u32,
    pub kind: MessageKind,
    pub message: RawMessage,
}

/// Why an event was kept from the output queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    EmptyContent,
    BotAuthor,
}

impl DropReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::EmptyContent => "empty_content",
            Self::BotAuthor => "bot_author",
        }
    }
}

/// Filter policy: create/update events need content and a human author.
/// Delete events always pass.
pub fn admit(kind: MessageKind, message: &RawMessage) -> Result<(), DropReason> {
    if kind == MessageKind::Delete {
        return Ok(());
    }
    if message.content.is_empty() {
        return Err(DropReason::EmptyContent);
    }
    if message.is_bot_authored() {
        return Err(DropReason::BotAuthor);
    }
    Ok(())
}

/// Receive side of the output queue
#[derive(Debug)]
pub struct EventQueue {
    rx: mpsc::Receiver<MessageEnvelope>,
}

impl EventQueue {
    pub(crate) fn new(rx: mpsc::Receiver<MessageEnvelope>) -> Self {
        Self { rx }
    }

    /// Next envelope; `None` once every shard has stopped
    pub async fn recv(&mut self) -> Option<MessageEnvelope> {
        self.rx.recv().await
    }

    /// Consume the queue as a `Stream`
    pub fn into_stream(self) -> ReceiverStream<MessageEnvelope> {
        ReceiverStream::new(self.rx)
    }
}

/// Shared context for the fan-in stage
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<StateAggregator>,
    shard_state: ShardState,
    metrics: Arc<GatewayMetrics>,
}

impl Dispatcher {
    pub fn new(
        state: Arc<StateAggregator>,
        shard_state: ShardState,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            state,
            shard_state,
            metrics,
        }
    }

    /// Spawn the fan-in task merging `inputs` into `output`.
    ///
    /// Ends when every input closes, the output receiver is dropped or
    /// `shutdown` fires. Shutdown also interrupts a send blocked on a full
    /// output queue; events still waiting in the shard queues are discarded.
    pub fn spawn(
        self,
        inputs: Vec<mpsc::Receiver<ShardMessage>>,
        output: mpsc::Sender<MessageEnvelope>,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(inputs, output, shutdown).await })
    }

    async fn run(
        self,
        inputs: Vec<mpsc::Receiver<ShardMessage>>,
        output: mpsc::Sender<MessageEnvelope>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut merged = stream::select_all(inputs.into_iter().map(ReceiverStream::new));

        loop {
            let item = tokio::select! {
                item = merged.next() => item,
                _ = shutdown.recv() => {
                    info!("Fan-in received shutdown signal");
                    return;
                }
            };
            let Some(item) = item else { break };

            let Some(envelope) = self.envelope(item) else {
                continue;
            };
            let (shard_id, kind) = (envelope.shard_id(), envelope.kind());
            tokio::select! {
                sent = output.send(envelope) => {
                    if sent.is_err() {
                        info!("Event queue receiver dropped, stopping fan-in");
                        return;
                    }
                }
                _ = shutdown.recv() => {
                    info!("Fan-in received shutdown signal while the event queue was full");
                    return;
                }
            }
            self.shard_state.record_dispatch(shard_id);
            self.metrics.record_dispatch(shard_id, kind.as_str());
        }

        info!("All shard queues closed, fan-in finished");
    }

    /// Apply the filter policy and wrap a survivor
    fn envelope(&self, item: ShardMessage) -> Option<MessageEnvelope> {
        let ShardMessage {
            shard_id,
            kind,
            message,
        } = item;

        if let Err(reason) = admit(kind, &message) {
            debug!(
                shard_id,
                kind = kind.as_str(),
                message_id = %message.id,
                reason = reason.label(),
                "Message event filtered"
            );
            self.shard_state.record_filtered(shard_id);
            self.metrics.record_filtered(kind.as_str(), reason.label());
            return None;
        }

        Some(MessageEnvelope::new(
            shard_id,
            kind,
            message,
            Arc::clone(&self.state),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use serde_json::json;

    fn message(content: &str, bot: Option<bool>) -> RawMessage {
        let mut data = json!({ "id": "1", "channel_id": "101", "content": content });
        if let Some(bot) = bot {
            data["author"] = json!({ "id": "2", "username": "someone", "bot": bot });
        }
        fixtures::raw_message(data)
    }

    #[test]
    fn create_and_update_need_content_and_human_author() {
        for kind in [MessageKind::Create, MessageKind::Update] {
            assert_eq!(admit(kind, &message("hello", Some(false))), Ok(()));
            assert_eq!(admit(kind, &message("hello", None)), Ok(()));
            assert_eq!(
                admit(kind, &message("", Some(false))),
                Err(DropReason::EmptyContent)
            );
            assert_eq!(
                admit(kind, &message("hello", Some(true))),
                Err(DropReason::BotAuthor)
            );
        }
    }

    #[test]
    fn delete_is_never_filtered() {
        assert_eq!(admit(MessageKind::Delete, &message("", None)), Ok(()));
        assert_eq!(admit(MessageKind::Delete, &message("", Some(true))), Ok(()));
    }

    fn shard_message(shard_id: u32, kind: MessageKind, id: u64, content: &str) -> ShardMessage {
        ShardMessage {
            shard_id,
            kind,
            message: fixtures::raw_message(json!({
                "id": id.to_string(),
                "channel_id": "101",
                "content": content,
                "author": { "id": "2", "username": "alice" }
            })),
        }
    }

    #[tokio::test]
    async fn fan_in_filters_and_preserves_per_shard_order() {
        let state = fixtures::state(2);
        let shard_state = ShardState::new([0, 1], 2);
        let dispatcher = Dispatcher::new(
            state,
            shard_state.clone(),
            Arc::new(GatewayMetrics::detached()),
        );

        let (tx0, rx0) = mpsc::channel(8);
        let (tx1, rx1) = mpsc::channel(8);
        let (out_tx, out_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = dispatcher.spawn(vec![rx0, rx1], out_tx, shutdown_rx);

        tx0.send(shard_message(0, MessageKind::Create, 1, "a")).await.unwrap();
        tx1.send(shard_message(1, MessageKind::Create, 10, "x")).await.unwrap();
        tx0.send(shard_message(0, MessageKind::Update, 2, "")).await.unwrap();
        tx0.send(shard_message(0, MessageKind::Delete, 3, "")).await.unwrap();
        tx1.send(shard_message(1, MessageKind::Update, 11, "y")).await.unwrap();
        drop((tx0, tx1));

        let mut queue = EventQueue::new(out_rx);
        let mut received = Vec::new();
        while let Some(envelope) = queue.recv().await {
            received.push((envelope.shard_id(), envelope.message_id().get(), envelope.kind()));
        }
        handle.await.unwrap();

        let shard0: Vec<_> = received.iter().filter(|r| r.0 == 0).map(|r| r.1).collect();
        let shard1: Vec<_> = received.iter().filter(|r| r.0 == 1).map(|r| r.1).collect();
        assert_eq!(shard0, vec![1, 3]);
        assert_eq!(shard1, vec![10, 11]);
        assert_eq!(received.len(), 4);

        assert_eq!(shard_state.total_events_dispatched(), 4);
        assert_eq!(shard_state.total_events_filtered(), 1);
    }

    #[tokio::test]
    async fn fan_in_stops_when_consumer_goes_away() {
        let dispatcher = Dispatcher::new(
            fixtures::state(1),
            ShardState::new([0], 1),
            Arc::new(GatewayMetrics::detached()),
        );
        let (tx, rx) = mpsc::channel(4);
        let (out_tx, out_rx) = mpsc::channel(1);
        drop(out_rx);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = dispatcher.spawn(vec![rx], out_tx, shutdown_rx);

        tx.send(shard_message(0, MessageKind::Create, 1, "a")).await.unwrap();
        handle.await.unwrap();
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn shutdown_unblocks_send_on_full_queue() {
        let shard_state = ShardState::new([0], 1);
        let dispatcher = Dispatcher::new(
            fixtures::state(1),
            shard_state.clone(),
            Arc::new(GatewayMetrics::detached()),
        );
        let (tx, rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = dispatcher.spawn(vec![rx], out_tx, shutdown_rx);

        // First fills the output queue, second blocks the fan-in in send
        tx.send(shard_message(0, MessageKind::Create, 1, "a")).await.unwrap();
        tx.send(shard_message(0, MessageKind::Create, 2, "b")).await.unwrap();
        while shard_state.total_events_dispatched() < 1 || tx.capacity() < tx.max_capacity() {
            tokio::task::yield_now().await;
        }

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("fan-in ignored shutdown")
            .unwrap();

        assert_eq!(out_rx.recv().await.unwrap().message_id().get(), 1);
        assert!(out_rx.recv().await.is_none());
        assert_eq!(shard_state.total_events_dispatched(), 1);
    }
}
