//! Gossip ledger node binary.
//!
//! Starts a peer listening on `--port`, dials any `--connect` peers, and
//! reads operator commands from stdin until `/exit`, end of input or Ctrl+C.

use meshledger::console::{parse_endpoint, run_console, Cli};
use meshledger::node::PeerNode;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    info!("Mesh ledger node v{}", env!("CARGO_PKG_VERSION"));

    let node = match PeerNode::new(cli.node_config()) {
        Ok(node) => node,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = node.start_listening(cli.port).await {
        error!(error = %e, "Could not start server");
        std::process::exit(1);
    }

    for endpoint in &cli.connect {
        let result = match parse_endpoint(endpoint) {
            Ok((host, port)) => node.connect(&host, port).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            warn!(%endpoint, error = %e, "Startup connection failed");
        }
    }

    let console = run_console(
        node.clone(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    );

    tokio::select! {
        result = console => {
            if let Err(e) = result {
                error!(error = %e, "Console stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected, initiating shutdown");
        }
    }

    node.shutdown().await;

    // A pending stdin read would otherwise hold the runtime open
    std::process::exit(0);
}
