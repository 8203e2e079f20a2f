use crate::model::StorageError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Seed list used the first time the bot runs, before anyone adds a symbol.
const DEFAULT_WATCHLIST: &[&str] = &["AAPL", "MSFT", "NVDA", "TSLA", "BTC-USD", "SPY"];

/// Durable watchlist, persisted as one JSON array of canonical symbols.
/// Load/save always moves the whole file; there are no partial updates, so a
/// scan that snapshots the list once is never affected by later edits.
pub struct WatchlistStore {
    path: PathBuf,
}

impl WatchlistStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Loads the full list; a missing file yields the default seed list.
    pub fn load(&self) -> Result<Vec<String>, StorageError> {
        if !self.path.exists() {
            return Ok(DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Replaces the file with the given list.
    pub fn save(&self, watchlist: &[String]) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(watchlist)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Set-like insert: false when the symbol was already present.
    pub fn add(&self, symbol: &str) -> Result<bool, StorageError> {
        let mut watchlist = self.load()?;
        if watchlist.iter().any(|s| s == symbol) {
            return Ok(false);
        }
        watchlist.push(symbol.to_string());
        self.save(&watchlist)?;
        info!("Watchlist: added {symbol}");
        Ok(true)
    }

    /// Removes a symbol; false when it was not present.
    pub fn remove(&self, symbol: &str) -> Result<bool, StorageError> {
        let mut watchlist = self.load()?;
        let before = watchlist.len();
        watchlist.retain(|s| s != symbol);
        if watchlist.len() == before {
            return Ok(false);
        }
        self.save(&watchlist)?;
        info!("Watchlist: removed {symbol}");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> WatchlistStore {
        let path = std::env::temp_dir().join(format!("pollux-watchlist-{name}-{}.json", std::process::id()));
        let _ = fs::remove_file(&path);
        WatchlistStore::new(path)
    }

    #[test]
    fn missing_file_yields_seed_list() {
        let store = temp_store("seed");
        let list = store.load().unwrap();
        assert!(list.contains(&"AAPL".to_string()));
        assert!(list.contains(&"BTC-USD".to_string()));
    }

    #[test]
    fn add_and_remove_round_trip() {
        let store = temp_store("roundtrip");
        assert!(store.add("PLTR").unwrap());
        assert!(!store.add("PLTR").unwrap(), "duplicate insert must be a no-op");
        assert!(store.load().unwrap().contains(&"PLTR".to_string()));
        assert!(store.remove("PLTR").unwrap());
        assert!(!store.remove("PLTR").unwrap());
    }

    #[test]
    fn save_preserves_order() {
        let store = temp_store("order");
        let list = vec!["SPY".to_string(), "QQQ".to_string(), "IWM".to_string()];
        store.save(&list).unwrap();
        assert_eq!(store.load().unwrap(), list);
    }
}
