//! Runtime configuration loaded from `barcel.toml` and `BARCEL_*` variables
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

/// Whether counter-offers must strictly alternate between buyer and seller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPolicy {
    #[default]
    Open,
    Alternating,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "defaults::db_path")]
    pub db_path: String,

    #[serde(default)]
    pub turn_policy: TurnPolicy,

    #[serde(default)]
    pub max_history_len: Option<usize>,

    #[serde(default = "defaults::min_product_name_len")]
    pub min_product_name_len: usize,

    #[serde(default = "defaults::min_description_len")]
    pub min_description_len: usize,

    #[serde(default = "defaults::min_review_comment_len")]
    pub min_review_comment_len: usize,

    #[serde(default = "defaults::watch_interval_ms")]
    pub watch_interval_ms: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            db_path: defaults::db_path(),
            turn_policy: TurnPolicy::default(),
            max_history_len: None,
            min_product_name_len: defaults::min_product_name_len(),
            min_description_len: defaults::min_description_len(),
            min_review_comment_len: defaults::min_review_comment_len(),
            watch_interval_ms: defaults::watch_interval_ms(),
        }
    }
}

impl MarketConfig {
    /// Loads `barcel.toml` (optional) overlaid with `BARCEL_*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from("barcel")
    }

    pub fn load_from(file_stem: &str) -> anyhow::Result<Self> {
        config::Config::builder()
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(config::Environment::with_prefix("BARCEL").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .with_context(|| format!("failed to load market configuration from {file_stem}"))
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

mod defaults {
    pub fn db_path() -> String {
        "barcel.db".into()
    }
    pub fn min_product_name_len() -> usize {
        3
    }
    pub fn min_description_len() -> usize {
        10
    }
    pub fn min_review_comment_len() -> usize {
        10
    }
    pub fn watch_interval_ms() -> u64 {
        1_000
    }
}
