//! Consumer chain.
//!
//! [`MetricsConsumer`] is the downstream acceptance interface every source
//! forwards batches into. Transforms implement it and forward to their own
//! next consumer; sinks implement it as the end of the chain.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::model::MetricBatch;

/// Errors returned by [`MetricsConsumer::consume`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsumerError {
    /// The batch can never be accepted (e.g. validation rejection).
    #[error("permanent consumer error: {0}")]
    Permanent(String),

    /// The batch could be accepted later (e.g. downstream backpressure).
    #[error("transient consumer error: {0}")]
    Transient(String),
}

impl ConsumerError {
    /// `true` if retrying the same batch cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    /// Combine several errors into one, permanent if any input is permanent.
    pub fn combine(errors: Vec<ConsumerError>) -> Option<ConsumerError> {
        match errors.len() {
            0 => None,
            1 => errors.into_iter().next(),
            _ => {
                let permanent = errors.iter().any(ConsumerError::is_permanent);
                let joined = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                Some(if permanent {
                    Self::Permanent(joined)
                } else {
                    Self::Transient(joined)
                })
            }
        }
    }
}

/// Downstream acceptance interface.
#[async_trait::async_trait]
pub trait MetricsConsumer: Send + Sync {
    /// Take ownership of `batch`.
    async fn consume(&self, batch: MetricBatch) -> Result<(), ConsumerError>;
}

/// Forwards each batch to every wrapped consumer.
///
/// All consumers are called even if an earlier one fails; failures are
/// combined with [`ConsumerError::combine`].
#[derive(Clone)]
pub struct FanOutConsumer {
    consumers: Vec<Arc<dyn MetricsConsumer>>,
}

impl FanOutConsumer {
    pub fn new(consumers: Vec<Arc<dyn MetricsConsumer>>) -> Self {
        Self { consumers }
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

impl std::fmt::Debug for FanOutConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutConsumer")
            .field("consumers", &self.consumers.len())
            .finish()
    }
}

#[async_trait::async_trait]
impl MetricsConsumer for FanOutConsumer {
    async fn consume(&self, batch: MetricBatch) -> Result<(), ConsumerError> {
        let mut errors = Vec::new();
        if let Some((last, rest)) = self.consumers.split_last() {
            for consumer in rest {
                if let Err(e) = consumer.consume(batch.clone()).await {
                    errors.push(e);
                }
            }
            if let Err(e) = last.consume(batch).await {
                errors.push(e);
            }
        }
        ConsumerError::combine(errors).map_or(Ok(()), Err)
    }
}

/// In-memory consumer that records every batch it accepts.
///
/// Can be primed with an error to simulate a failing downstream.
#[derive(Debug, Default)]
pub struct CapturingConsumer {
    batches: Mutex<Vec<MetricBatch>>,
    fail_with: Mutex<Option<ConsumerError>>,
}

impl CapturingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent batch with `error`.
    pub fn fail_with(&self, error: ConsumerError) {
        *self.fail_with.lock() = Some(error);
    }

    /// Snapshot of accepted batches.
    pub fn batches(&self) -> Vec<MetricBatch> {
        self.batches.lock().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Remove and return accepted batches.
    pub fn drain(&self) -> Vec<MetricBatch> {
        std::mem::take(&mut *self.batches.lock())
    }
}

#[async_trait::async_trait]
impl MetricsConsumer for CapturingConsumer {
    async fn consume(&self, batch: MetricBatch) -> Result<(), ConsumerError> {
        if let Some(e) = self.fail_with.lock().clone() {
            return Err(e);
        }
        self.batches.lock().push(batch);
        Ok(())
    }
}
