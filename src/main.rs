use clap::Parser;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use murmur::cli;
use murmur::gossip::Payload;
use murmur::simulator::Simulator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse args and env vars
    let args = cli::Cli::parse();
    let settings = args.into_settings();
    let simulator = Simulator::from_settings(settings)
        .await
        .inspect_err(|e| error!("Failed to start simulation ({}): {}", e.error_type(), e))?;
    if let Some(seed) = simulator.settings().seed {
        info!("Using seed {}", seed);
    }

    let mut payload = Payload::new();
    payload.insert(args.key.clone(), json!(args.value));
    simulator
        .broadcast_from(&args.origin, payload)
        .inspect_err(|e| error!("Failed to broadcast ({}): {}", e.error_type(), e))?;

    let converged = simulator
        .wait_for_convergence(&args.key, args.timeout())
        .await;
    let report = simulator.report(&args.key).await?;
    simulator.shutdown().await;

    if converged {
        info!(
            "Converged on '{}': {}/{} nodes",
            args.key, report.convergence.count, report.node_count
        );
    } else {
        warn!(
            "Did not converge on '{}' within {}ms: {}/{} nodes",
            args.key, args.timeout_ms, report.convergence.count, report.node_count
        );
    }
    info!(
        "Network: {} sends, {} dropped, {} delivered",
        report.network.total,
        report.network.dropped,
        report.network.delivered()
    );

    if args.json {
        println!("{}", report.to_json()?);
    }

    Ok(())
}
