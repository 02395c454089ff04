use tracing::info;

mod dispatcher;
mod gateway;
mod http;
mod job_runner;
mod providers;
mod tools;

use gateway::Gateway;

const DEFAULT_CONFIG_PATH: &str = "relay.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "relay_gateway=info".into()),
        )
        .init();

    let config_path = std::env::var("RELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    // A missing/malformed config file aborts startup (§7) — never fall
    // back to `RelayConfig::default()` here.
    let config = relay_core::RelayConfig::load(&config_path)?;

    let gateway = Gateway::start(config).await?;
    info!(agents = ?gateway.agent_ids(), "relay gateway running");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    gateway.stop().await;

    Ok(())
}
