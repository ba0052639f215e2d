//! Rovema Dash ingestion — source parsers, normalization, and KPI math
//!
//! Provides:
//! - Monetary/CNPJ normalization for messy spreadsheet exports
//! - Per-source staging (Bionio and Rovema Pay CSV, ELIQ REST, ASTO stub)
//! - The shared import pipeline: attribution, in-batch dedup, transactional
//!   upsert keyed on (source, raw_id)
//! - Zero-guarded margin/commission/goal computations

pub mod import;
pub mod kpi;
pub mod normalize;
pub mod sources;
pub mod types;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing expected column: {0}")]
    MissingColumn(String),

    #[error("Missing credentials: {0}")]
    Credentials(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("API timeout ({0}s) exceeded")]
    Timeout(u64),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Db(#[from] persistence::DbError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ImportResult<T> = Result<T, ImportError>;

// Re-exports for convenience
pub use import::{persist_batch, AttributionMaps, ImportOutcome};
pub use types::{Role, StagedBatch, StagedSale};
