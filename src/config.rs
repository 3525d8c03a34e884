//! Runtime configuration, read from the environment (and `.env` when present).

use crate::error::{GenieError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Sectors offered when the ESG table carries no sector column of its own.
pub const DEFAULT_SECTORS: [&str; 14] = [
    "Infrastructure",
    "Chemical",
    "Banking",
    "Automobile",
    "Financial Services",
    "Telecommunications",
    "Energy",
    "Consumer Goods",
    "Pharmaceuticals",
    "Mining",
    "Cement",
    "Information Technology",
    "Metals",
    "Media",
];

/// Risk levels in display order.
pub const RISK_LEVELS: [&str; 3] = ["Low", "Medium", "High"];

pub const DUMMY_API_KEY: &str = "dummy-api-key";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub region: String,
    pub bucket: String,
    /// Base URL objects are fetched from; derived from bucket and region unless overridden.
    pub endpoint: String,
    pub prices_key: String,
    pub balance_key: String,
    pub esg_key: String,
    /// Directory holding `data/<name>.csv` fallbacks.
    pub local_base_dir: PathBuf,
    /// Skip the remote fetch entirely and read local files.
    pub offline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenieConfig {
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub top_n: usize,
    pub random_seed: u64,
    pub sectors: Vec<String>,
    pub risk_levels: Vec<String>,
}

impl Default for GenieConfig {
    fn default() -> Self {
        let region = "us-east-1".to_string();
        let bucket = "genai-green-genie-datasets".to_string();
        Self {
            storage: StorageConfig {
                endpoint: default_endpoint(&bucket, &region),
                region,
                bucket,
                prices_key: "historical_prices.csv".to_string(),
                balance_key: "balance_sheets.csv".to_string(),
                esg_key: "esg_rankings.csv".to_string(),
                local_base_dir: PathBuf::from("."),
                offline: false,
            },
            llm: LlmConfig {
                api_key: DUMMY_API_KEY.to_string(),
                model: "gpt-4o-mini".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                max_tokens: 300,
                temperature: 0.7,
            },
            top_n: 5,
            random_seed: 42,
            sectors: DEFAULT_SECTORS.iter().map(|s| s.to_string()).collect(),
            risk_levels: RISK_LEVELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn default_endpoint(bucket: &str, region: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com", bucket, region)
}

impl GenieConfig {
    /// Load configuration from the process environment, after reading `.env`.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let storage = &mut config.storage;

        if let Some(region) = lookup("AWS_REGION") {
            storage.region = region;
        }
        if let Some(bucket) = lookup("S3_BUCKET") {
            storage.bucket = bucket;
        }
        storage.endpoint = lookup("STORAGE_ENDPOINT")
            .unwrap_or_else(|| default_endpoint(&storage.bucket, &storage.region));
        if let Some(key) = lookup("S3_KEY_HIST_PRICES") {
            storage.prices_key = key;
        }
        if let Some(key) = lookup("S3_KEY_BALANCE") {
            storage.balance_key = key;
        }
        if let Some(key) = lookup("S3_KEY_ESG") {
            storage.esg_key = key;
        }
        if let Some(dir) = lookup("LOCAL_BASE_DIR") {
            storage.local_base_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("GENIE_OFFLINE") {
            storage.offline = parse_flag(&flag);
        }

        if let Some(key) = lookup("OPENAI_API_KEY") {
            config.llm.api_key = key;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            config.llm.model = model;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            config.llm.base_url = url;
        }

        if let Some(raw) = lookup("GENIE_TOP_N") {
            config.top_n = parse_number("GENIE_TOP_N", &raw)?;
        }
        if let Some(raw) = lookup("GENIE_RANDOM_SEED") {
            config.random_seed = parse_number("GENIE_RANDOM_SEED", &raw)?;
        }

        Ok(config)
    }

    /// Whether `raw` names one of the configured risk levels, ignoring case.
    pub fn is_known_risk_level(&self, raw: &str) -> bool {
        let raw = raw.trim();
        self.risk_levels
            .iter()
            .any(|level| level.eq_ignore_ascii_case(raw))
    }

    /// Report every missing required value at once.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.storage.region.trim().is_empty() {
            missing.push("AWS_REGION");
        }
        if self.storage.bucket.trim().is_empty() {
            missing.push("S3_BUCKET");
        }
        if self.storage.prices_key.trim().is_empty() {
            missing.push("S3_KEY_HIST_PRICES");
        }
        if self.storage.balance_key.trim().is_empty() {
            missing.push("S3_KEY_BALANCE");
        }
        if self.storage.esg_key.trim().is_empty() {
            missing.push("S3_KEY_ESG");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(GenieError::Config(format!(
                "Missing required config values: {}",
                missing.join(", ")
            )))
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| GenieError::Config(format!("{} must be a number, got '{}': {}", key, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GenieConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.top_n, 5);
        assert_eq!(config.random_seed, 42);
        assert_eq!(
            config.storage.endpoint,
            "https://genai-green-genie-datasets.s3.us-east-1.amazonaws.com"
        );
        assert_eq!(config.storage.esg_key, "esg_rankings.csv");
        assert_eq!(config.risk_levels, vec!["Low", "Medium", "High"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_known_risk_levels() {
        let config = GenieConfig::default();
        assert!(config.is_known_risk_level("low"));
        assert!(config.is_known_risk_level(" HIGH "));
        assert!(!config.is_known_risk_level("aggressive"));
        assert!(!config.is_known_risk_level(""));
    }

    #[test]
    fn test_overrides() {
        let config = GenieConfig::from_lookup(lookup_from(&[
            ("S3_BUCKET", "my-bucket"),
            ("AWS_REGION", "eu-west-1"),
            ("GENIE_TOP_N", "3"),
            ("GENIE_OFFLINE", "true"),
        ]))
        .unwrap();

        assert_eq!(config.storage.endpoint, "https://my-bucket.s3.eu-west-1.amazonaws.com");
        assert_eq!(config.top_n, 3);
        assert!(config.storage.offline);
    }

    #[test]
    fn test_bad_number_is_config_error() {
        let err = GenieConfig::from_lookup(lookup_from(&[("GENIE_RANDOM_SEED", "forty-two")]))
            .unwrap_err();
        assert!(matches!(err, GenieError::Config(_)));
    }

    #[test]
    fn test_validate_lists_all_missing() {
        let config = GenieConfig::from_lookup(lookup_from(&[("S3_BUCKET", ""), ("S3_KEY_ESG", " ")]))
            .unwrap();
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("S3_BUCKET"));
        assert!(message.contains("S3_KEY_ESG"));
        assert!(!message.contains("AWS_REGION"));
    }
}
