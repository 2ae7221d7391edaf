use clap::Parser;
use forgemesh_core::api::{self, ApiState};
use forgemesh_core::config::Config;
use forgemesh_core::Node;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "forgemesh-node", about = "ForgeMesh cluster coordination node")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let node = Arc::new(Node::start(config.clone()).await?);
    tracing::info!(agent_id = %node.agent_id, "node started");

    let host = if cli.host != "127.0.0.1" { cli.host } else { config.api.host.clone() };
    let port = cli.port.unwrap_or(config.api.port);

    let state = Arc::new(ApiState {
        agents: node.agents.clone(),
        tasks: node.tasks.clone(),
        locks: node.locks.clone(),
        orchestrator: node.orchestrator.clone(),
        tool_ctx: node.tool_ctx.clone(),
        bearer_token: config.api.bearer_token.clone(),
    });
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!(%host, port, "listening");

    let background_node = node.clone();
    let background = tokio::spawn(async move { background_node.run_background_loops().await });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    background.abort();
    node.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
