//! ws-gateway binary entry point

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ws_gateway::cli::Cli;
use ws_gateway::{wait_for_signal, Gateway};

// Single-threaded: child output is relayed from one task in arrival order
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays free
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.default_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting ws-gateway {}", env!("CARGO_PKG_VERSION"));

    let gateway = match Gateway::start(cli.into_config()).await {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!("Failed to start gateway: {}", e);
            std::process::exit(1);
        }
    };

    let trigger = gateway.shutdown_trigger();
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        trigger.signal(signal);
    });

    let code = gateway.run().await;
    std::process::exit(code);
}
