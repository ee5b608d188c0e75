//! Shiftwatch Monitor
//!
//! Samples the configured instruments on a fixed interval and posts market
//! structure shift alerts to Discord. Runs until the process is killed.

use dotenvy::dotenv;
use shiftwatch::config::{self, Config, ConfigError};
use shiftwatch::core::orchestrator::{CycleOrchestrator, CycleSettings};
use shiftwatch::core::scheduler::{Scheduler, SchedulerSettings};
use shiftwatch::logging;
use shiftwatch::services::market_data::MarketDataProvider;
use shiftwatch::services::notifications::{DiscordNotifier, Notifier, RetryingNotifier};
use shiftwatch::services::yahoo::YahooMarketDataProvider;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    let config_path = config::get_config_path();
    let (config, problems) = Config::load_or_default(&config_path);

    logging::init_logging(config.logging.level);

    info!("Initializing Market Structure Tracker...");
    info!(environment = %config::get_environment(), "Environment");
    for problem in &problems {
        match problem {
            ConfigError::Io(_) | ConfigError::Yaml(_) => warn!(
                path = %config_path,
                error = %problem,
                "Config unavailable, continuing with defaults (no instruments)"
            ),
            _ => warn!(error = %problem, "Ignoring environment override"),
        }
    }

    let instruments = config.instruments();
    if instruments.is_empty() {
        warn!("No instruments configured - cycles will have nothing to analyse");
    } else {
        let names: Vec<&str> = instruments.iter().map(|i| i.as_str()).collect();
        info!(symbols = ?names, "Monitoring {} instruments", names.len());
    }

    let provider: Arc<dyn MarketDataProvider> =
        Arc::new(YahooMarketDataProvider::new(&config.provider)?);

    let discord = DiscordNotifier::from_config(&config.notification.discord);
    if !discord.is_configured() {
        warn!("No Discord webhook configured - alerts will only be logged");
    }
    let retry = &config.notification.discord.retry;
    let notifier: Arc<dyn Notifier> = if retry.max_attempts > 0 {
        info!(max_attempts = retry.max_attempts, "Retrying failed notifications with backoff");
        Arc::new(RetryingNotifier::from_config(discord, retry))
    } else {
        Arc::new(discord)
    };

    let orchestrator = Arc::new(CycleOrchestrator::new(
        provider,
        notifier,
        instruments,
        CycleSettings::from_config(&config),
    ));

    info!(
        interval = %config.interval,
        start = ?config.schedule.start,
        "Scheduling market structure analysis every {}",
        config.interval
    );
    let scheduler = Scheduler::new(orchestrator, SchedulerSettings::from_config(&config))?;
    scheduler.run().await;

    Ok(())
}
