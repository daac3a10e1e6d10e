//! Prometheus metrics for the simulation.
//!
//! All metrics are recorded through the [`Metrics`] struct.

use cell::{Action, Outcome};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Aggregated metrics for cells and the relayer.
///
/// Metrics are registered with the global metrics registry on creation; without
/// an installed recorder every call is a no-op.
#[derive(Debug, Clone)]
pub struct Metrics {
    _private: (),
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance and register all metric descriptions.
    pub fn new() -> Self {
        Self::register_descriptions();
        Self { _private: () }
    }

    fn register_descriptions() {
        // Cell metrics
        describe_counter!(
            "cell_operations_initiated_total",
            "Total number of operations initiated"
        );
        describe_counter!("cell_hops_total", "Total hops executed by action");
        describe_counter!(
            "cell_deliveries_total",
            "Total operations finished by delivering or bridging to the receiver"
        );
        describe_counter!(
            "cell_rollbacks_total",
            "Total operations refunded to the rollback receiver"
        );
        describe_counter!(
            "cell_stranded_total",
            "Total operations whose funds stayed in a cell"
        );
        describe_counter!(
            "cell_salvaged_total",
            "Total operations finished with the un-swapped token"
        );

        // Relayer metrics
        describe_counter!(
            "relayer_messages_total",
            "Total bridge messages relayed by status"
        );
        describe_histogram!(
            "relayer_delivery_duration_seconds",
            "Time to deliver one bridge message, retries included"
        );
    }

    /// Record an accepted initiation.
    pub fn record_initiated(&self) {
        counter!("cell_operations_initiated_total").increment(1);
    }

    /// Record one hop executed by a cell, and how the cell finished it.
    pub fn record_hop(&self, action: Action, outcome: &Outcome) {
        counter!("cell_hops_total", "action" => action.to_string()).increment(1);

        match outcome {
            Outcome::Delivered { .. } | Outcome::Bridged { .. } => {
                counter!("cell_deliveries_total").increment(1);
            }
            Outcome::RolledBack { .. } => counter!("cell_rollbacks_total").increment(1),
            Outcome::Salvaged { .. } => counter!("cell_salvaged_total").increment(1),
            Outcome::Stranded { .. } => counter!("cell_stranded_total").increment(1),
            Outcome::Forwarded { .. } => {}
        }
    }

    /// Record one relayed message.
    pub fn record_message(&self, status: &'static str, duration: Duration) {
        counter!("relayer_messages_total", "status" => status).increment(1);
        histogram!("relayer_delivery_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Install the Prometheus metrics exporter and start the HTTP server.
///
/// Returns an error if the server fails to bind to the specified port.
pub fn install_prometheus_exporter(port: u16) -> eyre::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::SocketAddr;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| eyre::eyre!("Failed to install Prometheus exporter: {}", e))?;

    Ok(())
}
