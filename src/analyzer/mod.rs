// Analyzer module: anomaly rule evaluation over metric snapshots.

pub mod anomaly;

pub use anomaly::AnomalyScanner;
