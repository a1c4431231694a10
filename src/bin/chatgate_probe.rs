// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

// chatgate-probe: check provider credentials from the command line.
//
// Usage:
//   chatgate-probe
//   chatgate-probe --config /etc/chatgate/chatgate.yaml
//
// Creates a throwaway conversation and exits 0 on success, 1 otherwise.

use clap::Parser;

use chatgate::config;
use chatgate::gateway;

#[derive(Parser)]
#[command(
    name = "chatgate-probe",
    about = "Verify that chatgate can reach the provider with its configured credentials."
)]
struct Cli {
    /// Path to the chatgate.yaml config file
    #[arg(long, default_value = "chatgate.yaml", env = "CHATGATE_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let source = config::FileSource::new(cli.config);
    let config = match config::load_config(&source) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let gateway = match gateway::build_gateway(&config) {
        Ok(g) => g,
        Err(e) => {
            tracing::error!("failed to build provider transport: {e}");
            std::process::exit(1);
        }
    };

    match gateway.probe().await {
        Ok(()) => {
            println!("ok: connected to {}", config.provider.base_url);
        }
        Err(e) => {
            let cause = std::error::Error::source(&e)
                .map(|c| c.to_string())
                .unwrap_or_default();
            eprintln!("failed ({}): {}", e.kind(), e);
            if !cause.is_empty() {
                eprintln!("  cause: {cause}");
            }
            std::process::exit(1);
        }
    }
}
