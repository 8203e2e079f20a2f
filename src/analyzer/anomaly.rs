use crate::config::Thresholds;
use crate::metrics::MetricsEngine;
use crate::model::{AnomalyReport, InsiderStatus, MetricsSnapshot, SmartMoney};
use crate::provider::MarketDataProvider;
use chrono::NaiveDate;
use futures::future::join_all;
use tracing::warn;

/// Applies the fixed, ordered rule set to each watchlist symbol.
/// Rule order is part of the contract: whale volume, oversold, squeeze,
/// insider buying, imminent earnings. Report text preserves that order.
pub struct AnomalyScanner {
    thresholds: Thresholds,
}

impl AnomalyScanner {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluates every rule for one symbol. Returns None when nothing triggered.
    pub fn evaluate(
        &self,
        symbol: &str,
        snapshot: &MetricsSnapshot,
        smart_money: &SmartMoney,
        today: NaiveDate,
    ) -> Option<AnomalyReport> {
        let mut reasons = Vec::new();

        if snapshot.volume_z > self.thresholds.whale_z {
            reasons.push(format!("Whale volume (z: {:.1})", snapshot.volume_z));
        }
        if snapshot.rsi < self.thresholds.rsi_oversold {
            reasons.push(format!("Oversold (RSI: {:.1})", snapshot.rsi));
        }
        if snapshot.squeeze {
            reasons.push("Volatility squeeze (breakout risk)".to_string());
        }
        if smart_money.insider == InsiderStatus::Buying {
            reasons.push("Insider buying".to_string());
        }
        if let Some(earnings) = smart_money.earnings_date {
            let days = (earnings - today).num_days();
            if (0..=self.thresholds.earnings_window_days).contains(&days) {
                reasons.push(format!("Earnings in {days}d"));
            }
        }

        if reasons.is_empty() {
            None
        } else {
            Some(AnomalyReport {
                symbol: symbol.to_string(),
                price: snapshot.price,
                reasons,
            })
        }
    }

    /// Runs the rule set over one watchlist snapshot. Symbols are fetched and
    /// evaluated concurrently; a failing symbol is logged and skipped, never
    /// aborting the rest of the pass. Reports come back in watchlist order.
    pub async fn scan(
        &self,
        watchlist: &[String],
        provider: &dyn MarketDataProvider,
        today: NaiveDate,
    ) -> Vec<AnomalyReport> {
        let passes = watchlist
            .iter()
            .map(|symbol| self.scan_symbol(symbol, provider, today));
        join_all(passes).await.into_iter().flatten().collect()
    }

    async fn scan_symbol(
        &self,
        symbol: &str,
        provider: &dyn MarketDataProvider,
        today: NaiveDate,
    ) -> Option<AnomalyReport> {
        let series = match provider.fetch_series(symbol, "1y").await {
            Ok(series) if !series.is_empty() => series,
            Ok(_) => {
                warn!("Scan: empty series for {symbol}, skipping");
                return None;
            }
            Err(e) => {
                warn!("Scan: fetch failed for {symbol}: {e}");
                return None;
            }
        };
        let info = match provider.fetch_info(symbol).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Scan: info fetch failed for {symbol}: {e}");
                return None;
            }
        };
        let snapshot = MetricsEngine::snapshot(&series, &info, &self.thresholds);
        let smart_money = provider.fetch_smart_money(symbol, snapshot.class).await;
        self.evaluate(symbol, &snapshot, &smart_money, today)
    }
}
