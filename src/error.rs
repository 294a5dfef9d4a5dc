//! Error taxonomy for the observation pipeline
//!
//! Per-gateway probe failures never appear here: they collapse into the
//! resolved status of the affected gateway. Only list acquisition may
//! surface to the caller, as a retryable error.

use thiserror::Error;

/// Failure talking to the ledger registry.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ledger response did not contain a gateway listing: {0}")]
    MalformedBody(String),
}

/// Failure talking to the geolocation feed. Always degraded to an empty
/// enrichment map by the pipeline, never propagated.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geolocation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geolocation response was not a feature collection")]
    MalformedBody,
}

/// Pipeline-level failure surfaced to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch the gateway list: {0}")]
    ListFetch(#[from] LedgerError),

    #[error("pipeline run was cancelled")]
    Cancelled,
}
