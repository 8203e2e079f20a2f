use std::collections::HashMap;

/// Common typos, company names, crypto shorthands and index nicknames mapped
/// to the canonical symbol the data provider understands.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("APPL", "AAPL"),
    ("APPLE", "AAPL"),
    ("FB", "META"),
    ("FACEBOOK", "META"),
    ("TWTR", "X"),
    ("TWITTER", "X"),
    ("GOOGLE", "GOOGL"),
    ("ALPHABET", "GOOGL"),
    ("GOOG", "GOOGL"),
    ("TESLA", "TSLA"),
    ("TELSLA", "TSLA"),
    ("MICROSOFT", "MSFT"),
    ("MACROSOFT", "MSFT"),
    ("NVIDIA", "NVDA"),
    ("NVDIA", "NVDA"),
    ("AMAZON", "AMZN"),
    ("AMZ", "AMZN"),
    ("NETFLIX", "NFLX"),
    ("ADVANCED MICRO DEVICES", "AMD"),
    ("INTEL", "INTC"),
    ("TSMC", "TSM"),
    ("TAIWAN SEMI", "TSM"),
    ("DISNEY", "DIS"),
    ("WALT DISNEY", "DIS"),
    ("PALANTIR", "PLTR"),
    ("COINBASE", "COIN"),
    ("AIRBNB", "ABNB"),
    ("SPOTIFY", "SPOT"),
    ("SHOPIFY", "SHOP"),
    ("PAYPAL", "PYPL"),
    ("SQUARE", "SQ"),
    ("BLOCK", "SQ"),
    ("GAMESTOP", "GME"),
    ("ALIBABA", "BABA"),
    ("RIVIAN", "RIVN"),
    ("LUCID", "LCID"),
    ("BRK.B", "BRK-B"),
    ("BRKB", "BRK-B"),
    ("BERKSHIRE", "BRK-B"),
    ("BTC", "BTC-USD"),
    ("BITCOIN", "BTC-USD"),
    ("ETH", "ETH-USD"),
    ("ETHEREUM", "ETH-USD"),
    ("XRP", "XRP-USD"),
    ("RIPPLE", "XRP-USD"),
    ("SOL", "SOL-USD"),
    ("SOLANA", "SOL-USD"),
    ("ADA", "ADA-USD"),
    ("CARDANO", "ADA-USD"),
    ("DOGE", "DOGE-USD"),
    ("DOGECOIN", "DOGE-USD"),
    ("SHIB", "SHIB-USD"),
    ("SHIBA", "SHIB-USD"),
    ("DOT", "DOT-USD"),
    ("POLKADOT", "DOT-USD"),
    ("LINK", "LINK-USD"),
    ("CHAINLINK", "LINK-USD"),
    ("AVAX", "AVAX-USD"),
    ("AVALANCHE", "AVAX-USD"),
    ("MATIC", "MATIC-USD"),
    ("POL", "MATIC-USD"),
    ("POLYGON", "MATIC-USD"),
    ("LTC", "LTC-USD"),
    ("LITECOIN", "LTC-USD"),
    ("BNB", "BNB-USD"),
    ("BINANCE", "BNB-USD"),
    ("SPX", "^GSPC"),
    ("S&P500", "SPY"),
    ("S&P", "SPY"),
    ("NDX", "^NDX"),
    ("NASDAQ", "QQQ"),
    ("VIX", "^VIX"),
    ("VOLATILITY", "^VIX"),
    ("DOW", "^DJI"),
    ("DOWJONES", "DIA"),
    ("RUT", "^RUT"),
    ("RUSSELL", "IWM"),
    ("GOLD", "GLD"),
    ("SILVER", "SLV"),
];

/// Static symbol normalizer, built once at startup and read-only after.
pub struct TickerResolver {
    aliases: HashMap<String, String>,
}

impl TickerResolver {
    /// Builds the table from the built-in aliases, with `extra` entries from
    /// the config layered on top (config wins on collision).
    pub fn new(extra: &HashMap<String, String>) -> Self {
        let mut aliases: HashMap<String, String> = BUILTIN_ALIASES
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        for (k, v) in extra {
            aliases.insert(k.trim().to_uppercase(), v.trim().to_uppercase());
        }
        Self { aliases }
    }

    /// Normalizes case and whitespace, then looks the token up in the alias
    /// table. Unknown input comes back normalized but otherwise unchanged.
    /// Total function: never fails, never blocks.
    pub fn resolve(&self, raw: &str) -> String {
        let normalized = raw.trim().to_uppercase();
        match self.aliases.get(&normalized) {
            Some(canonical) => canonical.clone(),
            None => normalized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> TickerResolver {
        TickerResolver::new(&HashMap::new())
    }

    #[test]
    fn resolves_crypto_shorthand() {
        assert_eq!(resolver().resolve("btc"), "BTC-USD");
        assert_eq!(resolver().resolve("  eth "), "ETH-USD");
    }

    #[test]
    fn resolves_common_typo() {
        assert_eq!(resolver().resolve("APPL"), "AAPL");
        assert_eq!(resolver().resolve("nvdia"), "NVDA");
    }

    #[test]
    fn unknown_symbol_passes_through_case_normalized() {
        assert_eq!(resolver().resolve("ZzqQ"), "ZZQQ");
    }

    #[test]
    fn config_aliases_override_builtins() {
        let mut extra = HashMap::new();
        extra.insert("btc".to_string(), "XBT-EUR".to_string());
        let r = TickerResolver::new(&extra);
        assert_eq!(r.resolve("BTC"), "XBT-EUR");
    }
}
