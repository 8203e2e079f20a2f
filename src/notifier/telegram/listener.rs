use crate::narrative::{build_chat_prompt, clean_reply};
use crate::notifier::telegram::TelegramBot;
use crate::notifier::telegram::command_handler::{handle_command, run_analysis};
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::Ordering;
use tokio::time::{Duration, sleep};
use tracing::warn;

#[derive(Debug, Deserialize)]
struct TelegramApiResponse {
    #[serde(default)]
    result: Vec<TelegramUpdate>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

/// Words that match the ticker shape but are clearly questions.
const NON_TICKERS: &[&str] = &["WHY", "HOW", "WHAT", "TEST"];

fn ticker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9.\-]{2,10}$").expect("ticker regex"))
}

/// A single short symbol-shaped token runs the terminal; everything else is
/// treated as conversation.
pub fn looks_like_ticker(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.split_whitespace().count() != 1 {
        return false;
    }
    let upper = trimmed.to_uppercase();
    ticker_pattern().is_match(&upper) && !NON_TICKERS.contains(&upper.as_str())
}

/// Polls getUpdates and dispatches each incoming message. Analyses run in
/// their own task so a slow provider call never stalls the poll loop.
pub async fn listen_for_updates(bot: Arc<TelegramBot>) {
    let url = format!(
        "https://api.telegram.org/bot{}/getUpdates",
        bot.notifier.bot_token
    );
    loop {
        let current_offset = bot.notifier.offset.load(Ordering::SeqCst);
        let response = bot
            .notifier
            .client
            .get(&url)
            .query(&[("offset", (current_offset + 1).to_string())])
            .send()
            .await;
        if let Ok(resp) = response {
            if let Ok(api_response) = resp.json::<TelegramApiResponse>().await {
                for update in api_response.result {
                    if let Some(message) = &update.message {
                        if let Some(text) = message.text.as_deref() {
                            dispatch(bot.clone(), message.chat.id, text).await;
                        }
                    }
                    bot.notifier
                        .offset
                        .store(update.update_id + 1, Ordering::SeqCst);
                }
            }
        }
        sleep(Duration::from_secs(1)).await;
    }
}

async fn dispatch(bot: Arc<TelegramBot>, chat_id: i64, text: &str) {
    if text.starts_with('/') {
        // A scan pass holds the provider for its whole duration, so it gets
        // its own task; the remaining commands are cheap and stay inline.
        if text.trim_start().starts_with("/scan") {
            let command = text.to_string();
            tokio::spawn(async move {
                handle_command(&command, chat_id, &bot).await;
            });
        } else {
            handle_command(text, chat_id, &bot).await;
        }
    } else if looks_like_ticker(text) {
        let input = text.trim().to_string();
        tokio::spawn(async move {
            run_analysis(&bot, chat_id, &input).await;
        });
    } else {
        let question = text.to_string();
        tokio::spawn(async move {
            converse(&bot, chat_id, &question).await;
        });
    }
}

/// Free-text reply grounded in the per-chat memory snapshot.
async fn converse(bot: &TelegramBot, chat_id: i64, question: &str) {
    let history = bot.memory.snapshot(chat_id);
    let prompt = build_chat_prompt(&history, question);
    match bot.narrative.generate(&prompt).await {
        Ok(reply) => {
            let reply = clean_reply(&reply, 800);
            if let Err(e) = bot.notifier.reply(chat_id, &reply).await {
                warn!("Conversation reply failed: {e}");
            }
        }
        Err(e) => {
            warn!("Narrative service error in conversation: {e}");
            let _ = bot
                .notifier
                .reply(chat_id, "❌ Narrative service error. Try again later.")
                .await;
        }
    }
}
