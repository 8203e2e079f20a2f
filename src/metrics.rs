// Pure indicator math over one price series tail.
use crate::config::Thresholds;
use crate::model::{
    Candle, Fundamentals, InstrumentClass, InstrumentInfo, MetricsSnapshot, Trend,
};

pub const RSI_WINDOW: usize = 14;
pub const BOLLINGER_WINDOW: usize = 20;
pub const VOLUME_WINDOW: usize = 20;

pub struct MetricsEngine;

impl MetricsEngine {
    /// RSI over the trailing `window` deltas, simple averaging.
    /// Degrades to the neutral 50 when there is not enough history or when the
    /// series is flat (RS undefined); a loss-free window yields 100.
    pub fn rsi(closes: &[f64], window: usize) -> f64 {
        if window == 0 || closes.len() < window + 1 {
            return 50.0;
        }
        let tail = &closes[closes.len() - (window + 1)..];
        let mut gains = 0.0;
        let mut losses = 0.0;
        for w in tail.windows(2) {
            let delta = w[1] - w[0];
            if delta > 0.0 {
                gains += delta;
            } else {
                losses -= delta;
            }
        }
        let avg_gain = gains / window as f64;
        let avg_loss = losses / window as f64;
        if avg_loss == 0.0 {
            // Flat window has no defined RS; loss-free but moving means max strength.
            return if avg_gain == 0.0 { 50.0 } else { 100.0 };
        }
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }

    /// Arithmetic mean of the trailing `window` closes; None until enough points exist.
    pub fn sma(closes: &[f64], window: usize) -> Option<f64> {
        if window == 0 || closes.len() < window {
            return None;
        }
        let tail = &closes[closes.len() - window..];
        Some(tail.iter().sum::<f64>() / window as f64)
    }

    /// Normalized Bollinger band width: (upper - lower) / SMA with k sigma bands.
    pub fn bollinger_width(closes: &[f64], window: usize, k: f64) -> Option<f64> {
        let sma = Self::sma(closes, window)?;
        if sma == 0.0 {
            return None;
        }
        let tail = &closes[closes.len() - window..];
        let variance = tail.iter().map(|c| (c - sma).powi(2)).sum::<f64>() / window as f64;
        let sigma = variance.sqrt();
        Some(2.0 * k * sigma / sma)
    }

    /// Worst peak-to-trough decline as a fraction. Always <= 0, exactly 0 for a
    /// non-decreasing series.
    pub fn max_drawdown(closes: &[f64]) -> f64 {
        let mut running_max = f64::MIN;
        let mut worst: f64 = 0.0;
        for &close in closes {
            if close > running_max {
                running_max = close;
            }
            if running_max > 0.0 {
                worst = worst.min(close / running_max - 1.0);
            }
        }
        worst
    }

    /// Standard score of the latest volume against its trailing window
    /// (latest included, matching a rolling mean ending on the last bar).
    /// Zero whenever the window is short or its sigma is zero.
    pub fn volume_z(volumes: &[f64], window: usize) -> f64 {
        if window == 0 || volumes.len() < window {
            return 0.0;
        }
        let tail = &volumes[volumes.len() - window..];
        let mean = tail.iter().sum::<f64>() / window as f64;
        let variance = tail.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / window as f64;
        let sigma = variance.sqrt();
        if sigma == 0.0 {
            return 0.0;
        }
        (volumes[volumes.len() - 1] - mean) / sigma
    }

    /// Up when the last close sits above its 200-period SMA. Without enough
    /// history the close is compared against itself, which reads as Up.
    pub fn trend(last_close: f64, sma200: Option<f64>) -> Trend {
        match sma200 {
            Some(reference) if last_close <= reference => Trend::Down,
            _ => Trend::Up,
        }
    }

    /// Composes the full snapshot for one series tail plus descriptive info.
    /// Deterministic and non-failing for any series with at least one candle.
    pub fn snapshot(
        series: &[Candle],
        info: &InstrumentInfo,
        thresholds: &Thresholds,
    ) -> MetricsSnapshot {
        let closes: Vec<f64> = series.iter().map(|c| c.close).collect();
        let volumes: Vec<f64> = series.iter().map(|c| c.volume).collect();
        let price = closes.last().copied().unwrap_or(0.0);

        let sma200 = Self::sma(&closes, 200);
        let bollinger_width = Self::bollinger_width(&closes, BOLLINGER_WINDOW, 2.0);
        let squeeze = bollinger_width.is_some_and(|w| w < thresholds.squeeze_width);
        let class = info.class();

        MetricsSnapshot {
            price,
            trend: Self::trend(price, sma200),
            rsi: Self::rsi(&closes, RSI_WINDOW),
            sma50: Self::sma(&closes, 50),
            sma200,
            bollinger_width,
            squeeze,
            max_drawdown: Self::max_drawdown(&closes),
            volume_z: Self::volume_z(&volumes, VOLUME_WINDOW),
            class,
            sector: info.sector.clone(),
            fundamentals: Self::fundamentals(class, info),
        }
    }

    fn fundamentals(class: InstrumentClass, info: &InstrumentInfo) -> Fundamentals {
        match class {
            InstrumentClass::Cryptocurrency => Fundamentals::Cryptocurrency {
                market_cap: info.market_cap,
                volume_24h: info.volume_24h,
            },
            InstrumentClass::Etf => Fundamentals::Etf {
                yield_pct: info.yield_pct.map(|y| y * 100.0),
                total_assets: info.total_assets,
            },
            InstrumentClass::Equity => {
                // Graham number, defined only for positive earnings and book value.
                let fair_value = match (info.eps, info.book_value) {
                    (Some(eps), Some(book)) if eps > 0.0 && book > 0.0 => {
                        Some((22.5 * eps * book).sqrt())
                    }
                    _ => None,
                };
                Fundamentals::Equity {
                    pe: info.pe,
                    eps: info.eps,
                    book_value: info.book_value,
                    institutional_ownership: info.institutional_ownership.map(|p| p * 100.0),
                    fair_value,
                }
            }
        }
    }
}
