use crate::model::{
    Candle, InstrumentClass, InstrumentInfo, InsiderStatus, PriceSeries, ProviderError, SmartMoney,
};
use crate::provider::MarketDataProvider;
use chrono::{DateTime, NaiveDate};
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Yahoo Finance JSON client. One shared HTTP client with a hard timeout, so
/// a stuck call is bounded and stays scoped to the request that made it.
pub struct YahooProvider {
    client: Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) PolluxRadar/0.1")
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    /// GET with one retry on transport errors, jittered so concurrent
    /// requests do not hammer the endpoint in lockstep.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ProviderError> {
        let mut last_err = None;
        for attempt in 0..2 {
            if attempt > 0 {
                let jitter = rand::rng().random_range(0..500u64);
                tokio::time::sleep(Duration::from_millis(500 + jitter)).await;
            }
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.json::<T>().await?);
                }
                Ok(response) => {
                    return Err(ProviderError::Http(format!(
                        "status {} for {url}",
                        response.status()
                    )));
                }
                Err(e) => {
                    debug!("attempt {attempt} failed for {url}: {e}");
                    last_err = Some(ProviderError::Http(e.to_string()));
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ProviderError::Http("unreachable".to_string())))
    }

    async fn fetch_earnings_date(&self, symbol: &str) -> Option<NaiveDate> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{symbol}?modules=calendarEvents",
            self.base_url
        );
        let body: QuoteSummaryResponse = match self.get_json(&url).await {
            Ok(body) => body,
            Err(e) => {
                debug!("earnings lookup failed for {symbol}: {e}");
                return None;
            }
        };
        let result = body.quote_summary?.result.into_iter().next()?;
        let stamp = result
            .calendar_events?
            .earnings?
            .earnings_date
            .into_iter()
            .next()?
            .raw?;
        DateTime::from_timestamp(stamp as i64, 0).map(|dt| dt.date_naive())
    }

    async fn fetch_insider_status(&self, symbol: &str) -> InsiderStatus {
        let url = format!(
            "{}/v10/finance/quoteSummary/{symbol}?modules=insiderTransactions",
            self.base_url
        );
        let body: QuoteSummaryResponse = match self.get_json(&url).await {
            Ok(body) => body,
            Err(e) => {
                debug!("insider lookup failed for {symbol}: {e}");
                return InsiderStatus::Neutral;
            }
        };
        let transactions = body
            .quote_summary
            .and_then(|qs| qs.result.into_iter().next())
            .and_then(|r| r.insider_transactions)
            .map(|t| t.transactions)
            .unwrap_or_default();

        // Same reading as the insider screens: ten most recent filings,
        // a clear buy majority is bullish, a heavy sell skew is bearish.
        let recent = transactions.iter().take(10);
        let mut buys = 0u32;
        let mut sells = 0u32;
        for tx in recent {
            let text = tx.text.as_deref().unwrap_or("").to_ascii_lowercase();
            if text.contains("purchase") {
                buys += 1;
            } else if text.contains("sale") {
                sells += 1;
            }
        }
        if buys > sells {
            InsiderStatus::Buying
        } else if sells > buys + 2 {
            InsiderStatus::Selling
        } else {
            InsiderStatus::Neutral
        }
    }

    async fn fetch_put_call_ratio(&self, symbol: &str) -> Option<f64> {
        let url = format!("{}/v7/finance/options/{symbol}", self.base_url);
        let body: OptionsResponse = match self.get_json(&url).await {
            Ok(body) => body,
            Err(e) => {
                debug!("options lookup failed for {symbol}: {e}");
                return None;
            }
        };
        let chain = body
            .option_chain?
            .result
            .into_iter()
            .next()?
            .options
            .into_iter()
            .next()?;
        let call_volume: f64 = chain.calls.iter().filter_map(|c| c.volume).sum();
        let put_volume: f64 = chain.puts.iter().filter_map(|p| p.volume).sum();
        if call_volume > 0.0 {
            Some(put_volume / call_volume)
        } else {
            None
        }
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooProvider {
    async fn fetch_series(
        &self,
        symbol: &str,
        range: &str,
    ) -> Result<PriceSeries, ProviderError> {
        let url = format!(
            "{}/v8/finance/chart/{symbol}?range={range}&interval=1d",
            self.base_url
        );
        let body: ChartResponse = self.get_json(&url).await?;
        let result = body
            .chart
            .and_then(|c| c.result)
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| ProviderError::InvalidResponse {
                symbol: symbol.to_string(),
                reason: "chart result missing".to_string(),
            })?;

        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse {
                symbol: symbol.to_string(),
                reason: "quote block missing".to_string(),
            })?;

        let mut series = Vec::with_capacity(result.timestamp.len());
        for (i, stamp) in result.timestamp.iter().enumerate() {
            // Yahoo pads unfinished sessions with nulls; skip those bars.
            let (Some(open), Some(high), Some(low), Some(close)) = (
                quote.open.get(i).copied().flatten(),
                quote.high.get(i).copied().flatten(),
                quote.low.get(i).copied().flatten(),
                quote.close.get(i).copied().flatten(),
            ) else {
                continue;
            };
            let Some(date) = DateTime::from_timestamp(*stamp, 0).map(|dt| dt.date_naive()) else {
                continue;
            };
            // Keep the series strictly increasing by date: on duplicate
            // sessions the later bar wins.
            if series.last().is_some_and(|prev: &Candle| prev.date >= date) {
                series.pop();
            }
            series.push(Candle {
                date,
                open,
                high,
                low,
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0.0),
            });
        }
        Ok(series)
    }

    async fn fetch_info(&self, symbol: &str) -> Result<InstrumentInfo, ProviderError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{symbol}?modules=price,assetProfile,summaryDetail,defaultKeyStatistics",
            self.base_url
        );
        let body: QuoteSummaryResponse = self.get_json(&url).await?;
        let result = body
            .quote_summary
            .and_then(|qs| qs.result.into_iter().next())
            .ok_or_else(|| ProviderError::InvalidResponse {
                symbol: symbol.to_string(),
                reason: "quoteSummary result missing".to_string(),
            })?;

        let price = result.price.unwrap_or_default();
        let profile = result.asset_profile.unwrap_or_default();
        let summary = result.summary_detail.unwrap_or_default();
        let stats = result.default_key_statistics.unwrap_or_default();

        Ok(InstrumentInfo {
            quote_type: price.quote_type,
            sector: profile.sector,
            description: profile.long_business_summary,
            market_cap: price.market_cap.and_then(|v| v.raw),
            volume_24h: summary.volume24_hr.and_then(|v| v.raw),
            yield_pct: summary.trailing_annual_dividend_yield.and_then(|v| v.raw),
            total_assets: summary.total_assets.and_then(|v| v.raw),
            pe: summary.trailing_pe.and_then(|v| v.raw),
            eps: stats.trailing_eps.and_then(|v| v.raw),
            book_value: stats.book_value.and_then(|v| v.raw),
            institutional_ownership: stats.held_percent_institutions.and_then(|v| v.raw),
        })
    }

    async fn fetch_smart_money(&self, symbol: &str, class: InstrumentClass) -> SmartMoney {
        // Flow data only exists for equities; crypto and ETFs read neutral.
        if class != InstrumentClass::Equity {
            if class == InstrumentClass::Etf {
                return SmartMoney {
                    put_call_ratio: self.fetch_put_call_ratio(symbol).await,
                    ..Default::default()
                };
            }
            return SmartMoney::default();
        }
        let smart_money = SmartMoney {
            insider: self.fetch_insider_status(symbol).await,
            put_call_ratio: self.fetch_put_call_ratio(symbol).await,
            earnings_date: self.fetch_earnings_date(symbol).await,
        };
        if smart_money == SmartMoney::default() {
            warn!("No flow data for {symbol}, using neutral signals");
        }
        smart_money
    }
}

// --- Yahoo wire format ---

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Option<ChartBlock>,
}

#[derive(Debug, Deserialize)]
struct ChartBlock {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteBars>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteBars {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: Option<QuoteSummaryBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBlock {
    #[serde(default)]
    result: Vec<QuoteSummaryResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    price: Option<PriceModule>,
    asset_profile: Option<AssetProfileModule>,
    summary_detail: Option<SummaryDetailModule>,
    default_key_statistics: Option<KeyStatisticsModule>,
    calendar_events: Option<CalendarEventsModule>,
    insider_transactions: Option<InsiderTransactionsModule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    quote_type: Option<String>,
    market_cap: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetProfileModule {
    sector: Option<String>,
    long_business_summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetailModule {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
    trailing_annual_dividend_yield: Option<RawValue>,
    total_assets: Option<RawValue>,
    #[serde(rename = "volume24Hr")]
    volume24_hr: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatisticsModule {
    trailing_eps: Option<RawValue>,
    book_value: Option<RawValue>,
    held_percent_institutions: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEventsModule {
    earnings: Option<EarningsBlock>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarningsBlock {
    #[serde(default)]
    earnings_date: Vec<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
struct InsiderTransactionsModule {
    #[serde(default)]
    transactions: Vec<InsiderTransaction>,
}

#[derive(Debug, Default, Deserialize)]
struct InsiderTransaction {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OptionsResponse {
    #[serde(rename = "optionChain")]
    option_chain: Option<OptionChainBlock>,
}

#[derive(Debug, Deserialize)]
struct OptionChainBlock {
    #[serde(default)]
    result: Vec<OptionChainResult>,
}

#[derive(Debug, Deserialize)]
struct OptionChainResult {
    #[serde(default)]
    options: Vec<OptionExpiry>,
}

#[derive(Debug, Deserialize)]
struct OptionExpiry {
    #[serde(default)]
    calls: Vec<OptionContract>,
    #[serde(default)]
    puts: Vec<OptionContract>,
}

#[derive(Debug, Deserialize)]
struct OptionContract {
    volume: Option<f64>,
}
