// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use chatgate::config;
use chatgate::gateway;
use chatgate::proxy;
use chatgate::session::SessionStore as _;

use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "chatgate", about = "Conversation gateway for a hosted AI provider")]
struct Cli {
    /// Path to the chatgate.yaml config file
    #[arg(long, default_value = "chatgate.yaml", env = "CHATGATE_CONFIG")]
    config: String,

    /// Port to listen on
    #[arg(long, default_value_t = proxy::BIND_ADDR.1, env = "CHATGATE_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let addr = SocketAddr::from((proxy::BIND_ADDR.0, cli.port));
    tracing::info!(%addr, "chatgate starting");

    let source = config::FileSource::new(cli.config);
    let config = match config::load_config(&source) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(
                source = %config::ConfigSource::describe(&source),
                "failed to load config: {e}"
            );
            std::process::exit(1);
        }
    };

    tracing::info!(
        base_url = %config.provider.base_url,
        credentials_present = config.provider.project_id.is_some() && config.provider.api_key.is_some(),
        rule_version = %config.rules.version(),
        rule_hash = %config.rules.hash(),
        rules = config.rules.len(),
        "config loaded"
    );

    let gateway = match gateway::build_gateway(&config) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            tracing::error!("failed to build provider transport: {e}");
            std::process::exit(1);
        }
    };

    spawn_session_sweeper(gateway.clone(), &config.session);

    let app = match proxy::build_router(gateway, &config.server) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("invalid caller header: {e}");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, "failed to bind to address: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "chatgate listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}

/// Periodically drop sessions idle past the TTL.
fn spawn_session_sweeper(
    gateway: Arc<gateway::ConversationGateway>,
    settings: &config::SessionSettings,
) {
    let ttl = settings.ttl;
    let mut interval = tokio::time::interval(settings.sweep_interval);
    tokio::spawn(async move {
        loop {
            interval.tick().await;
            let sessions = gateway.sessions();
            let before = sessions.len();
            sessions.cleanup(ttl);
            let swept = before.saturating_sub(sessions.len());
            if swept > 0 {
                tracing::info!(swept, remaining = sessions.len(), "expired sessions swept");
            }
        }
    });
}
