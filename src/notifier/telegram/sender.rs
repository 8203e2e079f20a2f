use crate::model::{Fundamentals, NotifyError};
use crate::notifier::telegram::TelegramNotifier;
use crate::orchestrator::Analysis;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Sends a plain text message to one chat.
pub async fn send_text(
    notifier: &TelegramNotifier,
    chat_id: i64,
    text: &str,
) -> Result<(), NotifyError> {
    let url = format!(
        "https://api.telegram.org/bot{}/sendMessage",
        notifier.bot_token
    );
    let params = [("chat_id", chat_id.to_string()), ("text", text.to_string())];
    let response = match timeout(
        Duration::from_secs(10),
        notifier.client.post(&url).form(&params).send(),
    )
    .await
    {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            warn!("Telegram send failed: {e}");
            return Err(NotifyError::ApiError(format!("send failed: {e}")));
        }
        Err(_) => {
            warn!("Telegram send timed out");
            return Err(NotifyError::Unreachable);
        }
    };
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_else(|_| "unknown".into());
        warn!("Telegram API responded [{status}]: {body}");
        return Err(NotifyError::Unreachable);
    }
    debug!("Telegram message sent [{status}]");
    Ok(())
}

/// Renders one completed analysis as the terminal-style text block.
pub fn format_analysis(analysis: &Analysis) -> String {
    let snapshot = &analysis.snapshot;
    let narrative = &analysis.narrative;

    let mut out = format!(
        "💠 {} | Institutional Desk\nMacro: {}\n\n{}\n\n\
         PRICE : ${:.2}\nTREND : {}\nRSI   : {:.1}\n",
        analysis.symbol,
        analysis.macro_context,
        narrative.summary,
        snapshot.price,
        snapshot.trend.label(),
        snapshot.rsi,
    );
    if snapshot.squeeze {
        out.push_str("SQUEZ : ⚠️ YES\n");
    }

    match &snapshot.fundamentals {
        Fundamentals::Cryptocurrency {
            market_cap,
            volume_24h,
        } => {
            out.push_str(&format!(
                "CAP   : ${:.1}B\nVOL24 : ${:.1}B\n",
                market_cap.unwrap_or(0.0) / 1e9,
                volume_24h.unwrap_or(0.0) / 1e9,
            ));
        }
        Fundamentals::Etf {
            yield_pct,
            total_assets,
        } => {
            out.push_str(&format!(
                "YIELD : {:.2}%\nASSETS: ${:.1}B\n",
                yield_pct.unwrap_or(0.0),
                total_assets.unwrap_or(0.0) / 1e9,
            ));
        }
        Fundamentals::Equity { pe, fair_value, .. } => {
            out.push_str(&format!(
                "FAIR  : ${:.2}\nP/E   : {:.1}x\n",
                fair_value.unwrap_or(0.0),
                pe.unwrap_or(0.0),
            ));
        }
    }

    let pc = analysis
        .smart_money
        .put_call_ratio
        .map(|r| format!("{r:.2}"))
        .unwrap_or_else(|| "N/A".to_string());
    let earnings = analysis
        .smart_money
        .earnings_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    out.push_str(&format!(
        "MAX DD: {:.1}%\nWHALE : {:.2}\nP/C   : {}\nEARN  : {}\n\n\
         SENTIMENT: {}/100 | POL RISK: {}/10\n\n\
         THESIS: {}\nDRIVERS: {}\nRISKS: {}\nVERDICT: {}",
        snapshot.max_drawdown * 100.0,
        snapshot.volume_z,
        pc,
        earnings,
        narrative.sentiment,
        narrative.political_risk,
        narrative.thesis,
        narrative.drivers,
        narrative.risks,
        narrative.verdict,
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        InstrumentClass, InsiderStatus, MetricsSnapshot, SmartMoney, Trend,
    };
    use crate::narrative::Narrative;

    fn sample_analysis() -> Analysis {
        Analysis {
            symbol: "BTC-USD".to_string(),
            snapshot: MetricsSnapshot {
                price: 64_250.5,
                trend: Trend::Up,
                rsi: 61.2,
                sma50: Some(60_000.0),
                sma200: Some(52_000.0),
                bollinger_width: Some(0.03),
                squeeze: true,
                max_drawdown: -0.31,
                volume_z: 1.4,
                class: InstrumentClass::Cryptocurrency,
                sector: None,
                fundamentals: Fundamentals::Cryptocurrency {
                    market_cap: Some(1.2e12),
                    volume_24h: Some(3.1e10),
                },
            },
            smart_money: SmartMoney {
                insider: InsiderStatus::Neutral,
                put_call_ratio: None,
                earnings_date: None,
            },
            macro_context: "SPY: BULLISH | VIX: 14.20".to_string(),
            description: "The original cryptocurrency.".to_string(),
            narrative: Narrative::default(),
        }
    }

    #[test]
    fn analysis_block_contains_class_fields_and_squeeze_flag() {
        let text = format_analysis(&sample_analysis());
        assert!(text.contains("BTC-USD | Institutional Desk"));
        assert!(text.contains("SQUEZ : ⚠️ YES"));
        assert!(text.contains("CAP   : $1200.0B"));
        assert!(text.contains("P/C   : N/A"));
        assert!(text.contains("SENTIMENT: 50/100"));
    }
}
