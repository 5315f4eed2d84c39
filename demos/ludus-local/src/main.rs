//! Runs a complete arena in one process: broker, a kalaha engine host, and
//! two random bots. Plays a single game and exits.
//!
//! ```sh
//! RUST_LOG=info cargo run -p ludus-local
//! ```

use std::sync::Arc;
use std::time::Duration;

use ludus::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), LudusError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (hub, listener) = Hub::channel();
    let store = Arc::new(Store::default());
    let verifier = KeyVerifier::new(Arc::clone(&store), OPERATOR_MARKER);
    let broker =
        Broker::new(hub.clone(), listener, Arc::clone(&store), verifier);
    tokio::spawn(broker.run());

    let mut host_config = HostConfig::new(GameName::from("Kalaha"));
    host_config.run_once = true;
    let host = EngineHost::connect(&hub, host_config).await?;
    let host_task = tokio::spawn(host.run());

    let mut agents = Vec::new();
    for name in ["demo-bot-one", "demo-bot-two"] {
        let bot = store.create_bot(name)?;
        let mut config = AgentConfig::new(bot.api_key);
        config.player_name = name.to_string();
        config.run_once = true;
        config.relist_delay = Duration::from_millis(200);
        let runner = AgentRunner::connect(&hub, config).await?;
        agents.push(tokio::spawn(runner.run()));
    }

    for agent in agents {
        if let Err(e) = agent.await.expect("agent task panicked") {
            tracing::error!(error = %e, "agent ended with error");
        }
    }
    host_task.await.expect("host task panicked")?;

    tracing::info!("demo game finished");
    Ok(())
}
