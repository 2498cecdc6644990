use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while loading model artifacts or scoring feature batches.
///
/// `FeatureInsufficient` is the one recoverable variant: the row is excluded
/// from the batch and reported, never scored with a default. Everything else
/// is fatal to the scoring run.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("feature coverage too low for {ticker}: {coverage:.0}% < {required:.0}%")]
    FeatureInsufficient {
        ticker: String,
        coverage: f64,
        required: f64,
    },

    #[error("model artifact missing: {path}")]
    ArtifactMissing { path: PathBuf },

    #[error("model artifact unreadable at {path}: {reason}")]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("artifact schema mismatch: {reason}")]
    SchemaMismatch { reason: String },

    #[error("ensemble weights must sum to 1, got {sum}")]
    MalformedWeights { sum: f64 },

    #[error("ensemble inference failed for model {model_id}: {reason}")]
    Inference { model_id: String, reason: String },
}

/// Errors from external market-data/feature providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limit exceeded for provider key '{key}'")]
    RateLimited { key: String },

    #[error("provider unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("retries exhausted for '{key}' after {attempts} attempts: {last}")]
    RetriesExhausted {
        key: String,
        attempts: u32,
        last: String,
    },
}

impl ProviderError {
    /// Rate-limit-class failures are the only retryable ones for the governor.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

/// Errors from the signal history store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate resolution for signal {signal_id} on {trade_date}")]
    DuplicateResolution {
        signal_id: Uuid,
        trade_date: NaiveDate,
    },

    #[error("unknown signal {signal_id}")]
    UnknownSignal { signal_id: Uuid },

    #[error("persistence inconsistency: {reason}")]
    Inconsistency { reason: String },

    #[error("store io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
}
