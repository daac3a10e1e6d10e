use cellsim::{config::Config, init_tracing, metrics::install_prometheus_exporter, Simulation};
use clap::Parser;
use config::NetworkConfig;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "cellsim")]
#[command(about = "Run cell operations against a simulated multi-chain network")]
struct Cli {
    /// Path to the scenario file
    #[arg(short, long, default_value = "cellsim.toml")]
    config: String,

    /// Serve Prometheus metrics on this port and keep running until interrupted
    #[arg(long, env = "CELLSIM_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    info!("Loading scenario: {}", cli.config);
    let config = Config::from_file(&cli.config)?;
    let network = match &config.network {
        Some(path) => NetworkConfig::from_file(path)?,
        None => NetworkConfig::local(),
    };

    let metrics_port = cli.metrics_port.or(config.metrics_port);
    if let Some(port) = metrics_port {
        install_prometheus_exporter(port)?;
        info!(port, "Serving metrics");
    }

    let (sim, mut relayer) = Simulation::from_config(network)?;
    info!(
        chains = sim.chains().len(),
        operations = config.operations.len(),
        "Simulation ready"
    );

    for operation in &config.operations {
        let submitted = match sim.submit(&operation.request) {
            Ok(submitted) => submitted,
            Err(e) => {
                error!(operation = %operation.name, error = %e, "Operation rejected");
                continue;
            }
        };
        info!(
            operation = %operation.name,
            outcome = submitted.outcome.name(),
            destination = %submitted.plan.destination,
            expected_out = %submitted.plan.amount_out,
            "Operation initiated"
        );

        for relayed in relayer.run_until_idle().await {
            if let Some(outcome) = relayed.outcome() {
                info!(
                    operation = %operation.name,
                    message_id = %relayed.message.id,
                    outcome = outcome.name(),
                    "Hop finished"
                );
            }
        }
        if relayer.pending() > 0 {
            warn!(
                operation = %operation.name,
                held = relayer.pending(),
                "Messages held back, retrying with the next operation"
            );
        }

        let events = sim.take_events();
        let destination = sim.chain(&submitted.plan.destination)?;
        let receiver = submitted.plan.instructions.receiver;
        info!(
            operation = %operation.name,
            events = events.len(),
            %receiver,
            token = %submitted.plan.token_out,
            balance = %destination.balance(receiver, submitted.plan.token_out),
            "Operation settled"
        );
    }

    if metrics_port.is_some() {
        info!("All operations settled, press Ctrl-C to exit");
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}
