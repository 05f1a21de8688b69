use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::model::RestaurantId;

const JOURNAL_FILE: &str = "tablebook.journal";

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

/// Runtime settings, read from `TABLEBOOK_*` environment variables.
/// Unset or unparseable values fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub restaurant_id: RestaurantId,
    pub metrics_port: Option<u16>,
    /// Journal appends after which the compactor rewrites the file.
    pub compact_threshold: u64,
    pub compact_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            restaurant_id: 1,
            metrics_port: None,
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("TABLEBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            restaurant_id: parse_var(&lookup, "TABLEBOOK_RESTAURANT_ID").unwrap_or(defaults.restaurant_id),
            metrics_port: parse_var(&lookup, "TABLEBOOK_METRICS_PORT"),
            compact_threshold: parse_var(&lookup, "TABLEBOOK_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            compact_interval: parse_var(&lookup, "TABLEBOOK_COMPACT_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.compact_interval),
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join(JOURNAL_FILE)
    }
}
