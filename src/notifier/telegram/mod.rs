pub mod command_handler;
pub mod listener;
pub mod sender;

use crate::memory::ConversationMemory;
use crate::model::NotifyError;
use crate::narrative::NarrativeClient;
use crate::notifier::NotificationSink;
use crate::orchestrator::AnalysisOrchestrator;
use crate::resolver::TickerResolver;
use crate::scheduler::ScanScheduler;
use crate::storage::WatchlistStore;
use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::time::Instant;

/// Thin Telegram sender: the alert sink plus the plumbing the listener uses
/// to reply into arbitrary chats.
pub struct TelegramNotifier {
    pub bot_token: String,
    pub chat_id: i64,
    pub client: Client,
    pub offset: Arc<AtomicI64>,
    pub start_time: Instant,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: i64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            bot_token,
            chat_id,
            client,
            offset: Arc::new(AtomicI64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Sends to the configured alert chat.
    pub async fn notify_alert(&self, text: &str) -> Result<(), NotifyError> {
        sender::send_text(self, self.chat_id, text).await
    }

    /// Replies into the chat a message came from.
    pub async fn reply(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        sender::send_text(self, chat_id, text).await
    }

    pub async fn set_my_commands(&self) -> Result<(), reqwest::Error> {
        let url = format!(
            "https://api.telegram.org/bot{}/setMyCommands",
            self.bot_token
        );
        let commands = serde_json::json!({
            "commands": [
                { "command": "add", "description": "Add ticker to watchlist" },
                { "command": "remove", "description": "Remove ticker from watchlist" },
                { "command": "list", "description": "Show watchlist" },
                { "command": "scan", "description": "Force an anomaly scan" },
                { "command": "status", "description": "Show radar status" },
                { "command": "ping", "description": "Check connection" },
                { "command": "uptime", "description": "Service uptime" },
                { "command": "help", "description": "Command list" }
            ]
        });
        self.client.post(&url).json(&commands).send().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationSink for TelegramNotifier {
    async fn notify_text(&self, text: &str) -> Result<(), NotifyError> {
        self.notify_alert(text).await
    }
}

/// The interactive bot surface: long-polls for updates and routes them to
/// commands, on-demand analyses or free-text conversation.
pub struct TelegramBot {
    pub notifier: Arc<TelegramNotifier>,
    pub scheduler: Arc<ScanScheduler>,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub watchlist: Arc<WatchlistStore>,
    pub memory: Arc<ConversationMemory>,
    pub narrative: Arc<dyn NarrativeClient>,
    pub resolver: Arc<TickerResolver>,
}

impl TelegramBot {
    pub fn spawn_listener(bot: Arc<TelegramBot>) {
        tokio::spawn(async move {
            tracing::info!("Starting Telegram listener...");
            listener::listen_for_updates(bot).await;
        });
    }
}
