//! Core collector traits and types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::consumer::ConsumerError;
use crate::model::{MetricBatch, ModelError};
use crate::obsreport::Outcome;
use crate::scheduler::TickFailure;

/// Errors returned by [`SourceClient::fetch`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Retrying cannot help (e.g. the request could not be built).
    #[error("permanent fetch error: {0}")]
    Permanent(String),

    /// The next tick may succeed (network failure, non-success status).
    #[error("transient fetch error: {0}")]
    Transient(String),
}

impl FetchError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

/// Errors that can occur during one collection tick.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The client could not fetch a response.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The response could not be translated.
    #[error("translation failed: {0}")]
    Translate(#[from] ModelError),

    /// The downstream consumer refused the batch.
    #[error("consumer refused batch: {0}")]
    Consumer(#[from] ConsumerError),

    /// Client setup failed.
    #[error("setup failed: {0}")]
    Setup(String),

    /// The source cannot continue; scheduling stops.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CollectError {
    /// Outcome label recorded for this failure.
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Fetch(FetchError::Permanent(_)) | Self::Setup(_) | Self::Fatal(_) => {
                Outcome::Permanent
            }
            Self::Fetch(FetchError::Transient(_)) => Outcome::Transient,
            Self::Translate(_) => Outcome::Translate,
            Self::Consumer(_) => Outcome::Consumer,
        }
    }
}

impl TickFailure for CollectError {
    fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Fetches one raw response from an external system.
#[async_trait::async_trait]
pub trait SourceClient: Send + Sync + 'static {
    /// Raw response handed to the [`Translator`].
    type Response: Send;

    /// Prepare connections. Called once before the first tick.
    async fn setup(&self) -> Result<(), CollectError> {
        Ok(())
    }

    /// Perform one request.
    async fn fetch(&self) -> Result<Self::Response, FetchError>;
}

/// Converts a raw response into canonical metrics.
///
/// Translators are pure: `now` is supplied by the caller and used as the
/// point timestamp.
pub trait Translator: Send + Sync + 'static {
    type Input;

    fn translate(&self, input: Self::Input, now: DateTime<Utc>) -> Result<MetricBatch, ModelError>;
}
