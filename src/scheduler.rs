use crate::analyzer::AnomalyScanner;
use crate::memory::ConversationMemory;
use crate::model::{AnomalyReport, ScanError};
use crate::notifier::NotificationSink;
use crate::provider::MarketDataProvider;
use crate::storage::WatchlistStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

/// Drives the anomaly scanner on a fixed interval and on manual trigger.
/// One guard enforces at most one running scan; a second start attempt is
/// rejected, never queued.
pub struct ScanScheduler {
    scanner: AnomalyScanner,
    provider: Arc<dyn MarketDataProvider>,
    watchlist: Arc<WatchlistStore>,
    sink: Arc<dyn NotificationSink>,
    memory: Arc<ConversationMemory>,
    /// Memory context the scan summary is appended to (the alert chat).
    alert_context: i64,
    interval: Duration,
    guard: Mutex<()>,
}

impl ScanScheduler {
    pub fn new(
        scanner: AnomalyScanner,
        provider: Arc<dyn MarketDataProvider>,
        watchlist: Arc<WatchlistStore>,
        sink: Arc<dyn NotificationSink>,
        memory: Arc<ConversationMemory>,
        alert_context: i64,
        interval: Duration,
    ) -> Self {
        Self {
            scanner,
            provider,
            watchlist,
            sink,
            memory,
            alert_context,
            interval,
            guard: Mutex::new(()),
        }
    }

    /// Runs one scan pass, or rejects when one is already in flight.
    /// The guard is released on every exit path; partial failures inside the
    /// pass (per-symbol skips) still count as a completed scan.
    pub async fn try_scan(&self) -> Result<usize, ScanError> {
        let _running = self.guard.try_lock().map_err(|_| ScanError::AlreadyRunning)?;

        // One snapshot per pass; concurrent watchlist edits do not affect it.
        let watchlist = self.watchlist.load().map_err(|e| {
            warn!("Scan aborted, watchlist unavailable: {e}");
            ScanError::WatchlistUnavailable(e)
        })?;
        info!("Scan started: {} symbols", watchlist.len());

        let today = Utc::now().date_naive();
        let reports = self
            .scanner
            .scan(&watchlist, self.provider.as_ref(), today)
            .await;

        if reports.is_empty() {
            info!("Scan finished: nothing flagged");
            return Ok(0);
        }

        let consolidated = consolidate(&reports);
        info!("Scan finished: {} instruments flagged", reports.len());
        if let Err(e) = self
            .sink
            .notify_text(&format!("🚨 Institutional Radar\n{consolidated}"))
            .await
        {
            warn!("Scan notification failed: {e}");
        }
        self.memory
            .append(self.alert_context, format!("[SCANNER]: {consolidated}"));
        Ok(reports.len())
    }

    /// Long-lived loop: sleep the configured interval, scan, repeat. Missed
    /// runs are not backfilled. Manual triggers go through try_scan directly
    /// and simply make the next timer pass a likely no-op.
    pub async fn run_loop(self: Arc<Self>) {
        info!(
            "Scan scheduler started, interval {}s",
            self.interval.as_secs()
        );
        loop {
            sleep(self.interval).await;
            info!("Timer triggered, starting scheduled scan");
            match self.try_scan().await {
                Ok(_) => {}
                Err(ScanError::AlreadyRunning) => {
                    info!("Scheduled scan skipped, another scan is running");
                }
                Err(e) => warn!("Scheduled scan failed: {e}"),
            }
        }
    }
}

/// One line per flagged instrument, watchlist order, rule order within a line.
fn consolidate(reports: &[AnomalyReport]) -> String {
    reports
        .iter()
        .map(|r| format!("{} (${:.2}) -> {}", r.symbol, r.price, r.reasons.join(" | ")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::model::{
        Candle, InstrumentClass, InstrumentInfo, NotifyError, PriceSeries, ProviderError,
        SmartMoney,
    };
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct BlockingProvider {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for BlockingProvider {
        async fn fetch_series(
            &self,
            _symbol: &str,
            _range: &str,
        ) -> Result<PriceSeries, ProviderError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Vec::new())
        }

        async fn fetch_info(&self, _symbol: &str) -> Result<InstrumentInfo, ProviderError> {
            Ok(InstrumentInfo::default())
        }

        async fn fetch_smart_money(&self, _symbol: &str, _class: InstrumentClass) -> SmartMoney {
            SmartMoney::default()
        }
    }

    struct SpikeProvider;

    #[async_trait::async_trait]
    impl MarketDataProvider for SpikeProvider {
        async fn fetch_series(
            &self,
            _symbol: &str,
            _range: &str,
        ) -> Result<PriceSeries, ProviderError> {
            // Flat tape with a final volume spike: triggers the whale rule.
            let mut series: PriceSeries = (0..40)
                .map(|i| Candle {
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                        + chrono::Days::new(i as u64),
                    open: 50.0,
                    high: 51.0,
                    low: 49.0,
                    close: 50.0 + (i % 5) as f64,
                    volume: 1_000.0 + (i % 7) as f64,
                })
                .collect();
            series.last_mut().unwrap().volume = 50_000.0;
            Ok(series)
        }

        async fn fetch_info(&self, _symbol: &str) -> Result<InstrumentInfo, ProviderError> {
            Ok(InstrumentInfo::default())
        }

        async fn fetch_smart_money(&self, _symbol: &str, _class: InstrumentClass) -> SmartMoney {
            SmartMoney::default()
        }
    }

    struct RecordingSink {
        sent: Arc<tokio::sync::Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify_text(&self, text: &str) -> Result<(), NotifyError> {
            self.sent.lock().await.push(text.to_string());
            Ok(())
        }
    }

    struct NullSink {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl NotificationSink for NullSink {
        async fn notify_text(&self, _text: &str) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn temp_watchlist(name: &str, symbols: &[&str]) -> Arc<WatchlistStore> {
        let path = std::env::temp_dir().join(format!(
            "pollux-sched-{name}-{}.json",
            std::process::id()
        ));
        let store = WatchlistStore::new(path);
        store
            .save(&symbols.iter().map(|s| s.to_string()).collect::<Vec<_>>())
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn second_scan_is_rejected_while_one_runs() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let scheduler = Arc::new(ScanScheduler::new(
            AnomalyScanner::new(Thresholds::default()),
            Arc::new(BlockingProvider {
                entered: entered.clone(),
                release: release.clone(),
            }),
            temp_watchlist("guard", &["AAPL"]),
            Arc::new(NullSink {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(ConversationMemory::new(5)),
            0,
            Duration::from_secs(3600),
        ));

        let first = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.try_scan().await })
        };
        // Wait until the first scan is inside the provider call, i.e. RUNNING.
        entered.notified().await;

        let second = scheduler.try_scan().await;
        assert!(matches!(second, Err(ScanError::AlreadyRunning)));

        release.notify_one();
        assert!(first.await.unwrap().is_ok());

        // Guard released after completion: a new scan may start again.
        let third = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.try_scan().await })
        };
        entered.notified().await;
        release.notify_one();
        assert!(third.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn flagged_scan_notifies_and_memoizes() {
        let sent = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let memory = Arc::new(ConversationMemory::new(5));
        let scheduler = ScanScheduler::new(
            AnomalyScanner::new(Thresholds::default()),
            Arc::new(SpikeProvider),
            temp_watchlist("spike", &["NVDA", "TSLA"]),
            Arc::new(RecordingSink { sent: sent.clone() }),
            memory.clone(),
            77,
            Duration::from_secs(3600),
        );

        let flagged = scheduler.try_scan().await.unwrap();
        assert_eq!(flagged, 2);

        let sent = sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Institutional Radar"));
        assert!(sent[0].contains("NVDA"));
        assert!(sent[0].contains("Whale volume"));

        let history = memory.snapshot(77);
        assert_eq!(history.len(), 1);
        assert!(history[0].starts_with("[SCANNER]:"));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_fires_a_scan_after_the_interval() {
        let sent = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let scheduler = Arc::new(ScanScheduler::new(
            AnomalyScanner::new(Thresholds::default()),
            Arc::new(SpikeProvider),
            temp_watchlist("loop", &["NVDA"]),
            Arc::new(RecordingSink { sent: sent.clone() }),
            Arc::new(ConversationMemory::new(5)),
            0,
            Duration::from_secs(86_400),
        ));

        let handle = tokio::spawn(scheduler.run_loop());
        // Let the loop reach its sleep, then step the paused clock past it.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::advance(Duration::from_secs(86_401)).await;
        for _ in 0..50 {
            tokio::task::yield_now().await;
            if !sent.lock().await.is_empty() {
                break;
            }
        }
        handle.abort();

        let sent = sent.lock().await;
        assert!(!sent.is_empty(), "scheduled pass should have notified");
        assert!(sent[0].contains("NVDA"));
    }

    #[tokio::test]
    async fn unreadable_watchlist_fails_the_scan() {
        let path = std::env::temp_dir().join(format!(
            "pollux-sched-corrupt-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "not json").unwrap();
        let sink = Arc::new(NullSink {
            calls: AtomicUsize::new(0),
        });
        let scheduler = ScanScheduler::new(
            AnomalyScanner::new(Thresholds::default()),
            Arc::new(SpikeProvider),
            Arc::new(WatchlistStore::new(path)),
            sink.clone(),
            Arc::new(ConversationMemory::new(5)),
            0,
            Duration::from_secs(3600),
        );

        let result = scheduler.try_scan().await;
        assert!(matches!(result, Err(ScanError::WatchlistUnavailable(_))));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn quiet_scan_sends_nothing() {
        let sink = Arc::new(NullSink {
            calls: AtomicUsize::new(0),
        });
        let memory = Arc::new(ConversationMemory::new(5));
        let scheduler = ScanScheduler::new(
            AnomalyScanner::new(Thresholds::default()),
            Arc::new(BlockingProvider {
                entered: Arc::new(Notify::new()),
                release: Arc::new(Notify::new()),
            }),
            temp_watchlist("quiet", &[]),
            sink.clone(),
            memory.clone(),
            0,
            Duration::from_secs(3600),
        );

        assert_eq!(scheduler.try_scan().await.unwrap(), 0);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
        assert!(memory.snapshot(0).is_empty());
    }
}
