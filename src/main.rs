mod analyzer;
mod config;
mod memory;
mod metrics;
mod model;
mod narrative;
mod notifier;
mod orchestrator;
mod provider;
mod resolver;
mod scheduler;
mod storage;

use analyzer::AnomalyScanner;
use config::{AppConfig, load_config};
use memory::ConversationMemory;
use narrative::GeminiClient;
use notifier::{TelegramBot, TelegramNotifier};
use orchestrator::AnalysisOrchestrator;
use provider::YahooProvider;
use resolver::TickerResolver;
use scheduler::ScanScheduler;
use std::sync::Arc;
use std::time::Duration;
use storage::WatchlistStore;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration from file
    let config: Arc<AppConfig> = match load_config("config.json") {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Config load error: {e}");
            return;
        }
    };

    // Shared core components
    let resolver = Arc::new(TickerResolver::new(&config.aliases));
    let provider = Arc::new(YahooProvider::new());
    let narrative = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));
    let memory = Arc::new(ConversationMemory::new(config.thresholds.memory_capacity));
    let watchlist = Arc::new(WatchlistStore::new(&config.watchlist_path));
    let notifier = Arc::new(TelegramNotifier::new(
        config.telegram_bot_token.clone(),
        config.telegram_chat_id,
    ));

    let scheduler = Arc::new(ScanScheduler::new(
        AnomalyScanner::new(config.thresholds.clone()),
        provider.clone(),
        watchlist.clone(),
        notifier.clone(),
        memory.clone(),
        config.telegram_chat_id,
        Duration::from_secs(config.scan_interval_seconds),
    ));

    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        resolver.clone(),
        provider.clone(),
        narrative.clone(),
        memory.clone(),
        config.thresholds.clone(),
    ));

    // Interactive surface
    let bot = Arc::new(TelegramBot {
        notifier: notifier.clone(),
        scheduler: scheduler.clone(),
        orchestrator,
        watchlist,
        memory,
        narrative,
        resolver,
    });
    if let Err(e) = notifier.set_my_commands().await {
        warn!("Failed to register bot commands: {e}");
    }
    TelegramBot::spawn_listener(bot);

    info!("Sending startup message...");
    if let Err(e) = notifier.notify_alert("🚀 Pollux Radar started!").await {
        warn!("Startup notification failed: {e}");
    }

    // The scheduled scan loop owns the main task from here on.
    scheduler.run_loop().await;
}
