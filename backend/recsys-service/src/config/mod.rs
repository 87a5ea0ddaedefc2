use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Upper bound on `k` accepted by the HTTP boundary.
pub const MAX_K_LIMIT: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // HTTP server config
    pub http_host: String,
    pub http_port: u16,

    // Offline tables
    pub data_dir: String,
    pub final_file: String,
    pub personal_file: String,
    pub popularity_file: String,
    pub similarity_file: String,

    // Row ordering per table, resolved once at load time
    pub final_order: RowOrder,
    pub personal_order: RowOrder,
    pub popularity_order: RowOrder,
    pub similarity_order: RowOrder,

    // Online history
    pub history_size: usize,
    pub recent_history_window: usize,

    // Blending
    pub offline_head_ratio: f64,
    pub online_cap_ratio: f64,
    pub default_k: usize,
    pub max_k: usize,

    // Observability
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("http_host", "0.0.0.0")?
            .set_default("http_port", 8000)?
            .set_default("data_dir", ".")?
            .set_default("final_file", "recommendations.parquet")?
            .set_default("personal_file", "personal_als.parquet")?
            .set_default("popularity_file", "top_popular.parquet")?
            .set_default("similarity_file", "similar.parquet")?
            .set_default("final_order", "auto")?
            .set_default("personal_order", "auto")?
            .set_default("popularity_order", "auto")?
            .set_default("similarity_order", "rank")?
            .set_default("history_size", 50)?
            .set_default("recent_history_window", 5)?
            .set_default("offline_head_ratio", 0.7)?
            .set_default("online_cap_ratio", 0.6)?
            .set_default("default_k", 20)?
            .set_default("max_k", MAX_K_LIMIT as u64)?
            .set_default("log_level", "info")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.http_port == 0 {
            return Err(anyhow!("HTTP port must be greater than 0"));
        }

        for (name, file) in [
            ("final_file", &self.final_file),
            ("personal_file", &self.personal_file),
            ("popularity_file", &self.popularity_file),
            ("similarity_file", &self.similarity_file),
        ] {
            if file.is_empty() {
                return Err(anyhow!("{} is required", name));
            }
        }

        if self.history_size == 0 {
            return Err(anyhow!("History size must be at least 1"));
        }

        if self.recent_history_window == 0 {
            return Err(anyhow!("Recent history window must be at least 1"));
        }

        for (name, ratio) in [
            ("offline_head_ratio", self.offline_head_ratio),
            ("online_cap_ratio", self.online_cap_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(anyhow!("{} must be between 0 and 1", name));
            }
        }

        if self.max_k == 0 || self.max_k > MAX_K_LIMIT {
            return Err(anyhow!("Max k must be between 1 and {}", MAX_K_LIMIT));
        }

        if self.default_k == 0 || self.default_k > self.max_k {
            return Err(anyhow!("Default k must be between 1 and max k"));
        }

        Ok(())
    }

    pub fn final_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.final_file)
    }

    pub fn personal_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.personal_file)
    }

    pub fn popularity_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.popularity_file)
    }

    pub fn similarity_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.similarity_file)
    }
}

/// How the rows of one offline table are ordered before grouping.
///
/// Written in config as `auto`, `rank`, `rank:<column>`, `score`,
/// `score:<column>` or `stored`. Ties always keep file order.
///
/// An explicit column must exist in the table. `auto` picks from the schema
/// at load time and never fails.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum RowOrder {
    /// Ascending by the named column
    ByRank(String),
    /// Descending by the named column
    ByScore(String),
    /// File order
    Stored,
    /// `rank` ascending, else `score` descending, else `rank_score`
    /// descending, else file order
    Auto,
}

impl RowOrder {
    pub fn column(&self) -> Option<&str> {
        match self {
            RowOrder::ByRank(column) | RowOrder::ByScore(column) => Some(column),
            RowOrder::Stored | RowOrder::Auto => None,
        }
    }
}

impl FromStr for RowOrder {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, column) = match value.trim().split_once(':') {
            Some((kind, column)) => (kind.trim(), Some(column.trim())),
            None => (value.trim(), None),
        };

        if column.is_some_and(str::is_empty) {
            return Err(format!("Missing column name in ordering rule '{}'", value));
        }

        match (kind.to_ascii_lowercase().as_str(), column) {
            ("rank", column) => Ok(RowOrder::ByRank(column.unwrap_or("rank").to_string())),
            ("score", column) => Ok(RowOrder::ByScore(column.unwrap_or("score").to_string())),
            ("stored", None) => Ok(RowOrder::Stored),
            ("auto", None) => Ok(RowOrder::Auto),
            _ => Err(format!(
                "Invalid ordering rule '{}', expected auto, rank[:column], score[:column] or stored",
                value
            )),
        }
    }
}

impl TryFrom<String> for RowOrder {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for RowOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowOrder::ByRank(column) => write!(f, "rank:{}", column),
            RowOrder::ByScore(column) => write!(f, "score:{}", column),
            RowOrder::Stored => write!(f, "stored"),
            RowOrder::Auto => write!(f, "auto"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            http_host: "0.0.0.0".to_string(),
            http_port: 8000,
            data_dir: ".".to_string(),
            final_file: "recommendations.parquet".to_string(),
            personal_file: "personal_als.parquet".to_string(),
            popularity_file: "top_popular.parquet".to_string(),
            similarity_file: "similar.parquet".to_string(),
            final_order: RowOrder::ByScore("score".to_string()),
            personal_order: RowOrder::ByScore("score".to_string()),
            popularity_order: RowOrder::ByRank("rank".to_string()),
            similarity_order: RowOrder::ByRank("rank".to_string()),
            history_size: 50,
            recent_history_window: 5,
            offline_head_ratio: 0.7,
            online_cap_ratio: 0.6,
            default_k: 20,
            max_k: 100,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_k_bounds() {
        let mut config = test_config();
        config.max_k = 101;
        assert!(config.validate().is_err());

        config.max_k = 50;
        config.default_k = 60;
        assert!(config.validate().is_err());

        config.default_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_ratios_and_sizes() {
        let mut config = test_config();
        config.online_cap_ratio = 1.5;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.history_size = 0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.similarity_file = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_table_paths_join_data_dir() {
        let mut config = test_config();
        config.data_dir = "/data".to_string();
        assert_eq!(
            config.similarity_path(),
            PathBuf::from("/data/similar.parquet")
        );
    }

    #[test]
    fn test_row_order_parsing() {
        assert_eq!("rank".parse::<RowOrder>(), Ok(RowOrder::ByRank("rank".to_string())));
        assert_eq!("score".parse::<RowOrder>(), Ok(RowOrder::ByScore("score".to_string())));
        assert_eq!(
            "score:rank_score".parse::<RowOrder>(),
            Ok(RowOrder::ByScore("rank_score".to_string()))
        );
        assert_eq!(
            " RANK : position ".parse::<RowOrder>(),
            Ok(RowOrder::ByRank("position".to_string()))
        );
        assert_eq!("stored".parse::<RowOrder>(), Ok(RowOrder::Stored));
        assert_eq!("Auto".parse::<RowOrder>(), Ok(RowOrder::Auto));
        assert_eq!(RowOrder::Auto.column(), None);

        assert!("random".parse::<RowOrder>().is_err());
        assert!("rank:".parse::<RowOrder>().is_err());
        assert!("stored:rank".parse::<RowOrder>().is_err());
        assert!("auto:rank".parse::<RowOrder>().is_err());
    }

    #[test]
    fn test_row_order_display_round_trips() {
        let order = RowOrder::ByScore("rank_score".to_string());
        assert_eq!(order.to_string().parse::<RowOrder>(), Ok(order));
    }
}
