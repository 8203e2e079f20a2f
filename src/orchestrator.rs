use crate::config::Thresholds;
use crate::memory::ConversationMemory;
use crate::metrics::MetricsEngine;
use crate::model::{AnalysisError, MetricsSnapshot, SmartMoney, Trend};
use crate::narrative::{AnalysisFacts, Narrative, NarrativeClient, build_analysis_prompt, parse_narrative};
use crate::provider::MarketDataProvider;
use crate::resolver::TickerResolver;
use std::sync::Arc;
use tracing::{info, warn};

/// A series shorter than this cannot support the indicator windows in any
/// meaningful way; the request fails with NoData before the narrative step.
pub const MIN_OBSERVATIONS: usize = 30;

/// Full result of one on-demand analysis. Rendering is the caller's concern.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub symbol: String,
    pub snapshot: MetricsSnapshot,
    pub smart_money: SmartMoney,
    pub macro_context: String,
    pub description: String,
    pub narrative: Narrative,
}

/// End-to-end per-request flow:
/// resolve -> fetch -> compute -> narrate -> memoize.
pub struct AnalysisOrchestrator {
    resolver: Arc<TickerResolver>,
    provider: Arc<dyn MarketDataProvider>,
    narrative: Arc<dyn NarrativeClient>,
    memory: Arc<ConversationMemory>,
    thresholds: Thresholds,
}

impl AnalysisOrchestrator {
    pub fn new(
        resolver: Arc<TickerResolver>,
        provider: Arc<dyn MarketDataProvider>,
        narrative: Arc<dyn NarrativeClient>,
        memory: Arc<ConversationMemory>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            resolver,
            provider,
            narrative,
            memory,
            thresholds,
        }
    }

    pub async fn analyze(
        &self,
        raw_input: &str,
        context_id: i64,
    ) -> Result<Analysis, AnalysisError> {
        let resolved = self.resolver.resolve(raw_input);
        info!("Analysis requested: {raw_input} -> {resolved}");

        let (symbol, series) = self.fetch_with_crypto_fallback(&resolved).await?;
        if series.len() < MIN_OBSERVATIONS {
            return Err(AnalysisError::NoData { symbol });
        }

        let info = self.provider.fetch_info(&symbol).await?;
        let snapshot = MetricsEngine::snapshot(&series, &info, &self.thresholds);
        let smart_money = self
            .provider
            .fetch_smart_money(&symbol, snapshot.class)
            .await;
        let macro_context = self.macro_context().await;

        let description = match info.description.as_deref() {
            Some(text) if text.len() >= 10 => truncate(text, 1000),
            _ => format!("N/A. INVENT 1 SHORT SENTENCE DESCRIBING {symbol}."),
        };

        let facts = AnalysisFacts {
            symbol: &symbol,
            snapshot: &snapshot,
            smart_money: &smart_money,
            macro_context: &macro_context,
            description: &description,
        };
        let reply = self.narrative.generate(&build_analysis_prompt(&facts)).await?;
        let narrative = parse_narrative(&reply);

        self.memory.append(
            context_id,
            format!(
                "[{symbol}]: P=${:.2}, RSI={:.1}, Info: {}",
                snapshot.price,
                snapshot.rsi,
                truncate(&narrative.summary, 100)
            ),
        );

        Ok(Analysis {
            symbol,
            snapshot,
            smart_money,
            macro_context,
            description,
            narrative,
        })
    }

    /// Fetches the series; an empty result for a bare symbol (no class
    /// suffix) is retried once as a crypto pair before giving up.
    async fn fetch_with_crypto_fallback(
        &self,
        symbol: &str,
    ) -> Result<(String, Vec<crate::model::Candle>), AnalysisError> {
        let series = self.provider.fetch_series(symbol, "1y").await?;
        if !series.is_empty() || symbol.contains('-') {
            return Ok((symbol.to_string(), series));
        }
        let crypto_symbol = format!("{symbol}-USD");
        info!("Empty series for {symbol}, retrying as {crypto_symbol}");
        let series = self.provider.fetch_series(&crypto_symbol, "1y").await?;
        Ok((crypto_symbol, series))
    }

    /// Broad market read: SPY close vs. its 200-day SMA plus the VIX level.
    /// Any failure degrades to "Macro N/A" instead of failing the request.
    async fn macro_context(&self) -> String {
        let spy = match self.provider.fetch_series("SPY", "1y").await {
            Ok(series) if !series.is_empty() => series,
            Ok(_) | Err(_) => {
                warn!("Macro context unavailable");
                return "Macro N/A".to_string();
            }
        };
        let closes: Vec<f64> = spy.iter().map(|c| c.close).collect();
        let last = closes[closes.len() - 1];
        let trend = match MetricsEngine::trend(last, MetricsEngine::sma(&closes, 200)) {
            Trend::Up => "BULLISH",
            Trend::Down => "BEARISH",
        };
        match self.provider.fetch_series("^VIX", "5d").await {
            Ok(vix) if !vix.is_empty() => {
                format!("SPY: {trend} | VIX: {:.2}", vix[vix.len() - 1].close)
            }
            Ok(_) | Err(_) => format!("SPY: {trend} | VIX: N/A"),
        }
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Candle, InstrumentClass, InstrumentInfo, NarrativeError, PriceSeries, ProviderError,
    };
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        series: HashMap<String, PriceSeries>,
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for StubProvider {
        async fn fetch_series(
            &self,
            symbol: &str,
            _range: &str,
        ) -> Result<PriceSeries, ProviderError> {
            Ok(self.series.get(symbol).cloned().unwrap_or_default())
        }

        async fn fetch_info(&self, _symbol: &str) -> Result<InstrumentInfo, ProviderError> {
            Ok(InstrumentInfo {
                quote_type: Some("EQUITY".to_string()),
                description: Some("A diversified widget manufacturer with global reach.".to_string()),
                ..Default::default()
            })
        }

        async fn fetch_smart_money(&self, _symbol: &str, _class: InstrumentClass) -> SmartMoney {
            SmartMoney::default()
        }
    }

    struct CountingNarrative {
        calls: AtomicUsize,
        reply: String,
    }

    #[async_trait::async_trait]
    impl NarrativeClient for CountingNarrative {
        async fn generate(&self, _prompt: &str) -> Result<String, NarrativeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn flat_series(len: usize) -> PriceSeries {
        (0..len)
            .map(|i| Candle {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i as u64),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + (i % 3) as f64,
                volume: 1_000.0 + i as f64,
            })
            .collect()
    }

    fn orchestrator(
        series: HashMap<String, PriceSeries>,
        narrative: Arc<CountingNarrative>,
        memory: Arc<ConversationMemory>,
    ) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(
            Arc::new(TickerResolver::new(&HashMap::new())),
            Arc::new(StubProvider { series }),
            narrative,
            memory,
            Thresholds::default(),
        )
    }

    fn counting(reply: &str) -> Arc<CountingNarrative> {
        Arc::new(CountingNarrative {
            calls: AtomicUsize::new(0),
            reply: reply.to_string(),
        })
    }

    #[tokio::test]
    async fn short_series_fails_with_no_data_before_narration() {
        let narrative = counting("[SUMMARY]: should never appear");
        let memory = Arc::new(ConversationMemory::new(5));
        let mut series = HashMap::new();
        series.insert("ZZQQ".to_string(), flat_series(10));
        let orch = orchestrator(series, narrative.clone(), memory.clone());

        let err = orch.analyze("zzqq", 1).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NoData { .. }));
        assert_eq!(narrative.calls.load(Ordering::SeqCst), 0);
        assert!(memory.snapshot(1).is_empty());
    }

    #[tokio::test]
    async fn bare_symbol_retries_with_crypto_suffix() {
        let narrative = counting("[SENTIMENT]: 60\n[SUMMARY]: Chain activity rising.");
        let memory = Arc::new(ConversationMemory::new(5));
        let mut series = HashMap::new();
        series.insert("FARTCOIN-USD".to_string(), flat_series(40));
        let orch = orchestrator(series, narrative, memory);

        let analysis = orch.analyze("fartcoin", 1).await.unwrap();
        assert_eq!(analysis.symbol, "FARTCOIN-USD");
    }

    #[tokio::test]
    async fn completed_analysis_appends_a_memory_entry() {
        let narrative = counting("[SENTIMENT]: 60\n[SUMMARY]: Steady compounder.");
        let memory = Arc::new(ConversationMemory::new(5));
        let mut series = HashMap::new();
        series.insert("AAPL".to_string(), flat_series(60));
        let orch = orchestrator(series, narrative, memory.clone());

        let analysis = orch.analyze("apple", 42).await.unwrap();
        assert_eq!(analysis.symbol, "AAPL");
        assert_eq!(analysis.narrative.sentiment, 60);
        let history = memory.snapshot(42);
        assert_eq!(history.len(), 1);
        assert!(history[0].starts_with("[AAPL]: P=$"));
        assert!(history[0].contains("Steady compounder."));
    }
}
