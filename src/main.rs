use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use triviabot::{config, discord, store::TriviaStore};

#[actix_rt::main]
async fn main() -> miette::Result<()> {
    // Set up logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "triviabot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Trivia Discord Bot");

    // Load configuration
    let config = config::load_config()?;

    // Open the question bank and statistics store
    let store = TriviaStore::open(&config.store).await?;

    tokio::select! {
        result = discord::setup_bot(config, store) => result,
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping bot");
            Ok(())
        }
    }
}
