pub mod telegram;

pub use telegram::{TelegramBot, TelegramNotifier};

use crate::model::NotifyError;

/// Outbound alert destination. Fire-and-forget from the core's perspective:
/// callers log failures but never let them change scan or request state.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_text(&self, text: &str) -> Result<(), NotifyError>;
}
