use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenieError {
    #[error("ESG dataset is missing; nothing to recommend from")]
    MissingDataset,

    #[error("Data acquisition error: {0}")]
    Acquisition(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for GenieError {
    fn from(err: polars::error::PolarsError) -> Self {
        GenieError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GenieError>;
