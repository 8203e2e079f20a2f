use crate::model::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

/// Numeric thresholds for anomaly detection. All of them are tunable from
/// config.json; the defaults mirror the values the rules were written with.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub rsi_oversold: f64,
    pub whale_z: f64,
    pub squeeze_width: f64,
    pub earnings_window_days: i64,
    pub memory_capacity: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            whale_z: 2.5,
            squeeze_width: 0.05,
            earnings_window_days: 7,
            memory_capacity: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub telegram_chat_id: i64,
    pub gemini_api_key: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_watchlist_path")]
    pub watchlist_path: String,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_seconds: u64,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Extra ticker aliases merged over the built-in table.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_watchlist_path() -> String {
    "watchlist.json".to_string()
}

fn default_scan_interval() -> u64 {
    86_400
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    if config.telegram_bot_token.is_empty() {
        return Err(ConfigError::MissingCredential("telegram_bot_token"));
    }
    if config.gemini_api_key.is_empty() {
        return Err(ConfigError::MissingCredential("gemini_api_key"));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_default_to_rule_constants() {
        let t = Thresholds::default();
        assert_eq!(t.rsi_oversold, 30.0);
        assert_eq!(t.whale_z, 2.5);
        assert_eq!(t.squeeze_width, 0.05);
        assert_eq!(t.earnings_window_days, 7);
        assert_eq!(t.memory_capacity, 5);
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let cfg: AppConfig = serde_json::from_str(
            r#"{"telegram_bot_token":"t","telegram_chat_id":1,"gemini_api_key":"k"}"#,
        )
        .unwrap();
        assert_eq!(cfg.gemini_model, "gemini-2.5-flash");
        assert_eq!(cfg.scan_interval_seconds, 86_400);
        assert_eq!(cfg.watchlist_path, "watchlist.json");
        assert!(cfg.aliases.is_empty());
    }
}
