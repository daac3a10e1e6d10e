//! Off-chain side of a cell network.
//!
//! Assembles simulated chains from a [`config::NetworkConfig`], plans
//! operations against their swap venues and relays bridge messages between
//! them.

pub mod config;
pub mod metrics;
pub mod plan;
pub mod relayer;
pub mod simulation;

pub use plan::{LegSpec, Plan, PlanRequest, Planner};
pub use relayer::{deliver_with_retry, Relayed, Relayer, RetryPolicy};
pub use simulation::{Chain, Simulation, Submitted, Venue};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber, `info` unless `RUST_LOG` says otherwise.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
