use anyhow::Context;
use waitlist_server::{Config, Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before the config reads the environment
    dotenv::dotenv().ok();

    let config = Config::from_env();
    let _log_guard = setup_environment(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        location_id = %config.location_id,
        "Waitlist server starting..."
    );

    let state = ServerState::initialize(&config).context("failed to initialize server state")?;
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "Server error");
        return Err(e.into());
    }

    Ok(())
}
