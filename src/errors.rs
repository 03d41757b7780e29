//! Typed error hierarchy for the Conveyor pipeline client.
//!
//! Two top-level enums cover the two subsystems:
//! - `ApiError` — backend request/response failures
//! - `PipelineError` — stage gating and orchestration failures
//!
//! `NotFound` is deliberately its own variant: the backend answers 404 for
//! every stage that has not started yet, and callers translate that into the
//! stage's initial state rather than an error.

use thiserror::Error;

/// Errors from the pipeline backend API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found")]
    NotFound,

    #[error("Request failed: {0}")]
    Transient(#[source] reqwest::Error),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    InvalidResponse(#[source] serde_json::Error),

    #[error("Invalid backend URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

impl ApiError {
    /// Whether this error is expected noise inside a polling loop.
    ///
    /// Transient network failures and 404s are routine while a job is still
    /// running and get logged quietly; anything else is logged loudly. The
    /// loop retries on the next tick either way.
    pub fn is_poll_tolerable(&self) -> bool {
        matches!(self, Self::NotFound | Self::Transient(_))
    }
}

/// Errors from the pipeline orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Stage {stage} is locked: {reason}")]
    StageLocked { stage: String, reason: String },

    #[error("Polling was cancelled before the {stage} result arrived")]
    Cancelled { stage: String },

    #[error("No ticket loaded")]
    NoTicket,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
