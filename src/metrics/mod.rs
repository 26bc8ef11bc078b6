//! Prometheus metrics module

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Gateway metrics collector
#[derive(Clone)]
pub struct GatewayMetrics {
    handle: Arc<PrometheusHandle>,
}

impl GatewayMetrics {
    /// Install the global Prometheus recorder
    pub fn install() -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        Self::register_metrics();

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Collector not bound to the global recorder.
    ///
    /// Recording calls become no-ops unless some other recorder is installed;
    /// `render` yields an empty exposition. Used by tests and embedders that
    /// run their own recorder.
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: Arc::new(recorder.handle()),
        }
    }

    fn register_metrics() {
        describe_counter!(
            "gateway_events_received_total",
            Unit::Count,
            "Total dispatch events received from Discord"
        );
        describe_counter!(
            "gateway_messages_dispatched_total",
            Unit::Count,
            "Message events delivered to the consumer queue"
        );
        describe_counter!(
            "gateway_messages_filtered_total",
            Unit::Count,
            "Message events dropped by the filter"
        );
        describe_counter!("gateway_errors_total", Unit::Count, "Total gateway errors");
        describe_counter!(
            "gateway_outbound_total",
            Unit::Count,
            "Outbound REST actions by operation and outcome"
        );

        describe_histogram!(
            "gateway_outbound_duration_seconds",
            Unit::Seconds,
            "Latency of outbound REST actions"
        );

        describe_gauge!(
            "gateway_shards_ready",
            Unit::Count,
            "Number of shards in ready state"
        );
        describe_gauge!(
            "gateway_guilds_total",
            Unit::Count,
            "Guilds held in each shard cache"
        );
        describe_gauge!(
            "gateway_last_heartbeat_timestamp",
            Unit::Seconds,
            "Unix time of the last heartbeat ack"
        );
    }

    /// Record a dispatch event received by a shard
    pub fn record_event(&self, shard_id: u32, event_type: &'static str) {
        counter!(
            "gateway_events_received_total",
            "shard_id" => shard_id.to_string(),
            "event_type" => event_type
        )
        .increment(1);
    }

    pub fn record_dispatch(&self, shard_id: u32, kind: &'static str) {
        counter!(
            "gateway_messages_dispatched_total",
            "shard_id" => shard_id.to_string(),
            "kind" => kind
        )
        .increment(1);
    }

    pub fn record_filtered(&self, kind: &'static str, reason: &'static str) {
        counter!(
            "gateway_messages_filtered_total",
            "kind" => kind,
            "reason" => reason
        )
        .increment(1);
    }

    /// Record gateway error with an `error_type` label
    pub fn record_error(&self, shard_id: u32, error_type: &'static str) {
        counter!(
            "gateway_errors_total",
            "shard_id" => shard_id.to_string(),
            "error_type" => error_type
        )
        .increment(1);
    }

    /// Record the outcome of one outbound action.
    ///
    /// `outcome` is `"ok"`, `"skipped"` or an error type label.
    pub fn record_outbound(&self, operation: &'static str, outcome: &'static str, duration: Duration) {
        counter!(
            "gateway_outbound_total",
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);

        histogram!(
            "gateway_outbound_duration_seconds",
            "operation" => operation
        )
        .record(duration.as_secs_f64());
    }

    pub fn record_heartbeat(&self, shard_id: u32) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64());
        gauge!(
            "gateway_last_heartbeat_timestamp",
            "shard_id" => shard_id.to_string()
        )
        .set(now);
    }

    pub fn set_guilds(&self, shard_id: u32, count: usize) {
        gauge!(
            "gateway_guilds_total",
            "shard_id" => shard_id.to_string()
        )
        .set(count as f64);
    }

    pub fn set_shards_ready(&self, count: usize) {
        gauge!("gateway_shards_ready").set(count as f64);
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
