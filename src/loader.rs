//! Dataset loading: object storage over HTTP first, local CSV files as fallback.

use crate::config::StorageConfig;
use crate::error::{GenieError, Result};
use polars::prelude::*;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    HistoricalPrices,
    BalanceSheets,
    EsgRankings,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::HistoricalPrices,
        DatasetKind::BalanceSheets,
        DatasetKind::EsgRankings,
    ];

    /// File name used for the local fallback under `<base>/data/`.
    pub fn file_name(self) -> &'static str {
        match self {
            DatasetKind::HistoricalPrices => "historical_prices.csv",
            DatasetKind::BalanceSheets => "balance_sheets.csv",
            DatasetKind::EsgRankings => "esg_rankings.csv",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetKind::HistoricalPrices => "historical prices",
            DatasetKind::BalanceSheets => "balance sheets",
            DatasetKind::EsgRankings => "ESG rankings",
        };
        write!(f, "{}", name)
    }
}

/// The three tables the application works from.
#[derive(Debug, Clone)]
pub struct MarketData {
    pub prices: DataFrame,
    pub balance_sheets: DataFrame,
    pub esg_rankings: DataFrame,
}

pub struct DatasetLoader {
    client: reqwest::Client,
    storage: StorageConfig,
}

impl DatasetLoader {
    pub fn new(storage: StorageConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            storage,
        }
    }

    pub fn object_key(&self, kind: DatasetKind) -> &str {
        match kind {
            DatasetKind::HistoricalPrices => &self.storage.prices_key,
            DatasetKind::BalanceSheets => &self.storage.balance_key,
            DatasetKind::EsgRankings => &self.storage.esg_key,
        }
    }

    pub fn object_url(&self, kind: DatasetKind) -> String {
        format!(
            "{}/{}",
            self.storage.endpoint.trim_end_matches('/'),
            self.object_key(kind).trim_start_matches('/')
        )
    }

    pub fn local_path(&self, kind: DatasetKind) -> PathBuf {
        self.storage.local_base_dir.join("data").join(kind.file_name())
    }

    /// Load all three datasets concurrently. Any dataset that cannot be loaded from
    /// either source fails the whole call.
    pub async fn load_all(&self) -> Result<MarketData> {
        let (prices, balance_sheets, esg_rankings) = tokio::try_join!(
            self.load(DatasetKind::HistoricalPrices),
            self.load(DatasetKind::BalanceSheets),
            self.load(DatasetKind::EsgRankings),
        )?;
        Ok(MarketData {
            prices,
            balance_sheets,
            esg_rankings,
        })
    }

    /// Load one dataset, trying object storage and then the local file.
    pub async fn load(&self, kind: DatasetKind) -> Result<DataFrame> {
        let local = self.local_path(kind);
        if self.storage.offline {
            info!("Offline mode: reading {} from {}", kind, local.display());
            return read_local_csv(&local).map_err(|e| {
                GenieError::Acquisition(format!("Failed to load {}: {}", kind, e))
            });
        }

        let url = self.object_url(kind);
        let remote_err = match self.fetch_remote(&url).await.and_then(parse_csv) {
            Ok(frame) => {
                info!("✅ Loaded {} from {} ({} rows)", kind, url, frame.height());
                return Ok(frame);
            }
            Err(e) => e,
        };

        warn!("Remote read failed for {}: {}", url, remote_err);
        info!("↪ Falling back to local: {}", local.display());
        read_local_csv(&local).map_err(|local_err| {
            GenieError::Acquisition(format!(
                "Failed to load {} (remote: {}; local: {})",
                kind, remote_err, local_err
            ))
        })
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GenieError::Acquisition(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenieError::Acquisition(format!(
                "{} returned status {}",
                url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GenieError::Acquisition(format!("Failed to read body of {}: {}", url, e)))?;
        Ok(body.to_vec())
    }
}

/// Read a CSV file from disk into a frame.
pub fn read_local_csv(path: &Path) -> Result<DataFrame> {
    let bytes = std::fs::read(path)?;
    parse_csv(bytes)
}

/// Parse CSV bytes with a header row, tolerating a leading UTF-8 byte-order mark.
pub fn parse_csv(mut bytes: Vec<u8>) -> Result<DataFrame> {
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| GenieError::Acquisition(format!("Failed to parse CSV: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenieConfig;
    use std::fs;

    const ESG_CSV: &str = "Ticker,Industry,score\nAAA,Energy,71.5\nBBB,Mining,n/a\n";

    fn storage_in(dir: &Path, offline: bool, endpoint: &str) -> StorageConfig {
        let mut storage = GenieConfig::default().storage;
        storage.local_base_dir = dir.to_path_buf();
        storage.offline = offline;
        storage.endpoint = endpoint.to_string();
        storage
    }

    fn write_datasets(dir: &Path) {
        let data = dir.join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("historical_prices.csv"), "Date,Close\n2024-01-02,10.5\n").unwrap();
        fs::write(data.join("balance_sheets.csv"), "Ticker,Assets\nAAA,100\n").unwrap();
        fs::write(data.join("esg_rankings.csv"), ESG_CSV).unwrap();
    }

    #[test]
    fn test_parse_csv_strips_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(ESG_CSV.as_bytes());

        let frame = parse_csv(bytes).unwrap();
        assert_eq!(frame.get_column_names(), vec!["Ticker", "Industry", "score"]);
        assert_eq!(frame.height(), 2);
    }

    #[test]
    fn test_paths_and_urls() {
        let loader = DatasetLoader::new(storage_in(Path::new("/srv/genie"), false, "http://store/"));
        assert_eq!(
            loader.object_url(DatasetKind::EsgRankings),
            "http://store/esg_rankings.csv"
        );
        assert_eq!(
            loader.local_path(DatasetKind::BalanceSheets),
            PathBuf::from("/srv/genie/data/balance_sheets.csv")
        );
    }

    #[tokio::test]
    async fn test_offline_reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        write_datasets(dir.path());

        let loader = DatasetLoader::new(storage_in(dir.path(), true, "http://127.0.0.1:9"));
        let data = loader.load_all().await.unwrap();
        assert_eq!(data.esg_rankings.height(), 2);
        assert_eq!(data.prices.height(), 1);
        assert_eq!(data.balance_sheets.height(), 1);
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_local() {
        let dir = tempfile::tempdir().unwrap();
        write_datasets(dir.path());

        // Nothing listens on the discard port, so the request is refused
        let loader = DatasetLoader::new(storage_in(dir.path(), false, "http://127.0.0.1:9"));
        let frame = loader.load(DatasetKind::EsgRankings).await.unwrap();
        assert_eq!(frame.get_column_names(), vec!["Ticker", "Industry", "score"]);
    }

    #[tokio::test]
    async fn test_both_sources_failing_is_acquisition_error() {
        let dir = tempfile::tempdir().unwrap();

        let loader = DatasetLoader::new(storage_in(dir.path(), false, "http://127.0.0.1:9"));
        let err = loader.load(DatasetKind::EsgRankings).await.unwrap_err();
        match err {
            GenieError::Acquisition(msg) => {
                assert!(msg.contains("ESG rankings"));
                assert!(msg.contains("remote"));
            }
            other => panic!("expected acquisition error, got {:?}", other),
        }
    }
}
