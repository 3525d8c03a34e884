pub mod config;
pub mod error;
pub mod llm;
pub mod loader;
pub mod prompt;
pub mod schema;
pub mod selector;

pub use config::GenieConfig;
pub use error::{GenieError, Result};
pub use loader::{DatasetLoader, MarketData};
pub use schema::{normalize, CanonicalEsgTable, EsgRow};
pub use selector::{
    generate_recommendation, select, select_canonical, Recommendation, RiskLevel,
    SelectionOptions, SelectionOutcome, SelectionPolicy,
};
