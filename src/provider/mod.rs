// Market data provider seam. The scheduler and the orchestrator only see the
// trait; the Yahoo implementation lives in yahoo.rs.

pub mod yahoo;

use crate::model::{InstrumentClass, InstrumentInfo, PriceSeries, ProviderError, SmartMoney};

pub use yahoo::YahooProvider;

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily price history for `range` (e.g. "1y"), oldest candle first.
    async fn fetch_series(&self, symbol: &str, range: &str)
    -> Result<PriceSeries, ProviderError>;

    /// Descriptive info: instrument class, sector, description, fundamentals.
    async fn fetch_info(&self, symbol: &str) -> Result<InstrumentInfo, ProviderError>;

    /// Insider activity, put/call ratio and nearest earnings date. Never
    /// fails: each signal degrades to its neutral value independently.
    async fn fetch_smart_money(&self, symbol: &str, class: InstrumentClass) -> SmartMoney;
}
