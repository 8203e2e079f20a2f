// Core structs: Candle, MetricsSnapshot, SmartMoney, AnomalyReport
use chrono::NaiveDate;
use thiserror::Error;

/// One daily bar of an instrument's price history.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered price history, strictly increasing by date.
pub type PriceSeries = Vec<Candle>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentClass {
    Equity,
    Etf,
    Cryptocurrency,
}

impl InstrumentClass {
    /// Maps a provider `quoteType` string; anything unknown is treated as an equity.
    pub fn from_quote_type(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "ETF" => Self::Etf,
            "CRYPTOCURRENCY" => Self::Cryptocurrency,
            _ => Self::Equity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    pub fn label(self) -> &'static str {
        match self {
            Trend::Up => "UP",
            Trend::Down => "DOWN",
        }
    }
}

/// Class-specific valuation fields carried alongside the technicals.
#[derive(Debug, Clone, PartialEq)]
pub enum Fundamentals {
    Equity {
        pe: Option<f64>,
        eps: Option<f64>,
        book_value: Option<f64>,
        institutional_ownership: Option<f64>,
        /// Graham number, only when eps and book value are both positive.
        fair_value: Option<f64>,
    },
    Etf {
        yield_pct: Option<f64>,
        total_assets: Option<f64>,
    },
    Cryptocurrency {
        market_cap: Option<f64>,
        volume_24h: Option<f64>,
    },
}

/// Immutable set of indicators derived from one series tail.
/// Pure function of the input: recomputed fresh on every request, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub price: f64,
    pub trend: Trend,
    pub rsi: f64,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub bollinger_width: Option<f64>,
    pub squeeze: bool,
    /// Peak-to-trough decline as a fraction, always <= 0.
    pub max_drawdown: f64,
    pub volume_z: f64,
    pub class: InstrumentClass,
    pub sector: Option<String>,
    pub fundamentals: Fundamentals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsiderStatus {
    Buying,
    Selling,
    Neutral,
}

impl InsiderStatus {
    pub fn label(self) -> &'static str {
        match self {
            InsiderStatus::Buying => "BUYING",
            InsiderStatus::Selling => "SELLING",
            InsiderStatus::Neutral => "NEUTRAL",
        }
    }
}

/// Collaborator-supplied flow signals. Every field degrades to a neutral value
/// when the provider has nothing for it.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartMoney {
    pub insider: InsiderStatus,
    pub put_call_ratio: Option<f64>,
    pub earnings_date: Option<NaiveDate>,
}

impl Default for SmartMoney {
    fn default() -> Self {
        Self {
            insider: InsiderStatus::Neutral,
            put_call_ratio: None,
            earnings_date: None,
        }
    }
}

/// Descriptive info returned by the data provider next to the price history.
#[derive(Debug, Clone, Default)]
pub struct InstrumentInfo {
    pub quote_type: Option<String>,
    pub sector: Option<String>,
    pub description: Option<String>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub yield_pct: Option<f64>,
    pub total_assets: Option<f64>,
    pub pe: Option<f64>,
    pub eps: Option<f64>,
    pub book_value: Option<f64>,
    pub institutional_ownership: Option<f64>,
}

impl InstrumentInfo {
    pub fn class(&self) -> InstrumentClass {
        self.quote_type
            .as_deref()
            .map(InstrumentClass::from_quote_type)
            .unwrap_or(InstrumentClass::Equity)
    }
}

/// One flagged instrument out of a scan pass. Only built when at least one
/// rule triggered; `reasons` keeps the fixed rule order.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyReport {
    pub symbol: String,
    pub price: f64,
    pub reasons: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("unexpected response for {symbol}: {reason}")]
    InvalidResponse { symbol: String, reason: String },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Http(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("narrative API error: {0}")]
    Api(String),
    #[error("narrative HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for NarrativeError {
    fn from(e: reqwest::Error) -> Self {
        NarrativeError::Http(e.to_string())
    }
}

/// Per-request failure of the on-demand analysis flow. Terminates only the
/// request it belongs to.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no data for {symbol}: series empty or below minimum length")]
    NoData { symbol: String },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Narrative(#[from] NarrativeError),
}

/// Why a scan pass did not produce results.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("a scan is already running")]
    AlreadyRunning,
    #[error("watchlist unavailable: {0}")]
    WatchlistUnavailable(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("watchlist I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("watchlist decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Telegram API error: {0}")]
    ApiError(String),
    #[error("Telegram unreachable")]
    Unreachable,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}
