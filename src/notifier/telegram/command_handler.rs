use crate::model::{AnalysisError, ScanError};
use crate::notifier::telegram::TelegramBot;
use crate::notifier::telegram::sender::format_analysis;
use tracing::{info, warn};

/// Handles one slash command and replies into the chat it came from.
pub async fn handle_command(command_text: &str, chat_id: i64, bot: &TelegramBot) {
    info!("Handling command: {command_text}");
    let mut parts = command_text.split_whitespace();
    let command = parts.next().unwrap_or("");
    let argument = parts.next();

    match command {
        "/add" => match argument {
            Some(raw) => {
                let symbol = bot.resolver.resolve(raw);
                match bot.watchlist.add(&symbol) {
                    Ok(true) => reply(bot, chat_id, &format!("✅ {symbol} added.")).await,
                    Ok(false) => reply(bot, chat_id, &format!("⚠️ {symbol} already present.")).await,
                    Err(e) => reply(bot, chat_id, &format!("❌ Watchlist error: {e}")).await,
                }
            }
            None => reply(bot, chat_id, "Usage: /add <ticker>").await,
        },
        "/remove" => match argument {
            Some(raw) => {
                let symbol = bot.resolver.resolve(raw);
                match bot.watchlist.remove(&symbol) {
                    Ok(true) => reply(bot, chat_id, &format!("🗑️ {symbol} removed.")).await,
                    Ok(false) => reply(bot, chat_id, &format!("⚠️ {symbol} not on the list.")).await,
                    Err(e) => reply(bot, chat_id, &format!("❌ Watchlist error: {e}")).await,
                }
            }
            None => reply(bot, chat_id, "Usage: /remove <ticker>").await,
        },
        "/list" => match bot.watchlist.load() {
            Ok(list) if !list.is_empty() => {
                reply(bot, chat_id, &format!("📋 Watchlist: {}", list.join(", "))).await;
            }
            Ok(_) => reply(bot, chat_id, "📋 Watchlist is empty.").await,
            Err(e) => reply(bot, chat_id, &format!("❌ Watchlist error: {e}")).await,
        },
        "/scan" => {
            reply(bot, chat_id, "🛠️ Anomaly scan started...").await;
            match bot.scheduler.try_scan().await {
                Ok(0) => reply(bot, chat_id, "✅ Scan finished: nothing flagged.").await,
                Ok(n) => reply(bot, chat_id, &format!("✅ Scan finished: {n} instruments flagged.")).await,
                Err(ScanError::AlreadyRunning) => {
                    reply(bot, chat_id, "⏳ A scan is already running. Not starting another.").await;
                }
                Err(e) => {
                    warn!("Manual scan failed: {e}");
                    reply(bot, chat_id, &format!("❌ Scan failed: {e}")).await;
                }
            }
        }
        "/status" => {
            let watching = bot.watchlist.load().map(|l| l.len()).unwrap_or(0);
            reply(
                bot,
                chat_id,
                &format!("📊 Radar is running. Watching {watching} instruments."),
            )
            .await;
        }
        "/ping" => reply(bot, chat_id, "✅ I am online!").await,
        "/uptime" => {
            let uptime = bot.notifier.start_time.elapsed();
            reply(
                bot,
                chat_id,
                &format!(
                    "⏱ Uptime: {:02}:{:02}:{:02}",
                    uptime.as_secs() / 3600,
                    (uptime.as_secs() % 3600) / 60,
                    uptime.as_secs() % 60
                ),
            )
            .await;
        }
        "/help" => {
            let help_msg = "📋 Available commands:\n\
                /add <ticker> — add to watchlist\n\
                /remove <ticker> — remove from watchlist\n\
                /list — show watchlist\n\
                /scan — force an anomaly scan\n\
                /status — radar status\n\
                /ping — check connection\n\
                /uptime — service uptime\n\
                /help — this list\n\n\
                Type a bare symbol (e.g. MSFT) to run the terminal.";
            reply(bot, chat_id, help_msg).await;
        }
        _ => {
            reply(bot, chat_id, "🤖 Unknown command. Type /help for a list of commands.").await;
        }
    }
}

/// Full on-demand analysis flow for one chat message.
pub async fn run_analysis(bot: &TelegramBot, chat_id: i64, input: &str) {
    reply(bot, chat_id, &format!("🔄 Terminal: {}...", input.to_uppercase())).await;
    match bot.orchestrator.analyze(input, chat_id).await {
        Ok(analysis) => {
            reply(bot, chat_id, &format_analysis(&analysis)).await;
        }
        Err(AnalysisError::NoData { symbol }) => {
            reply(bot, chat_id, &format!("❌ No data for {symbol}.")).await;
        }
        Err(e) => {
            warn!("Analysis failed for {input}: {e}");
            reply(bot, chat_id, "❌ Internal analysis error. Try again later.").await;
        }
    }
}

async fn reply(bot: &TelegramBot, chat_id: i64, text: &str) {
    if let Err(e) = bot.notifier.reply(chat_id, text).await {
        warn!("Reply failed: {e}");
    }
}
