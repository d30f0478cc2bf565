//! Component lifecycle and the host contract.

use std::sync::Arc;

use crate::component::ComponentError;
use crate::consumer::MetricsConsumer;

/// Process-level collaborator that owns overall lifetime.
///
/// Components call into it; they never implement it.
pub trait Host: Send + Sync {
    /// Report an error the component cannot recover from.
    ///
    /// Used for failures discovered after `start` has already returned.
    fn report_fatal_error(&self, error: ComponentError);
}

/// Host that only logs fatal errors. Intended for tests and tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopHost;

impl Host for NopHost {
    fn report_fatal_error(&self, error: ComponentError) {
        tracing::error!(error = %error, "Fatal component error reported to no-op host");
    }
}

/// Start/shutdown contract shared by every component kind.
#[async_trait::async_trait]
pub trait Component: Send + Sync {
    /// Begin work and return without waiting for it.
    ///
    /// Background work is spawned; fatal errors found later go to `host`.
    async fn start(&self, host: Arc<dyn Host>) -> Result<(), ComponentError>;

    /// Stop background work and wait until it has ended.
    async fn shutdown(&self) -> Result<(), ComponentError>;
}

/// A component that accepts batches and forwards them.
pub trait MetricsTransform: Component + MetricsConsumer {}

/// A component that terminates the consumer chain.
pub trait MetricsSink: Component + MetricsConsumer {}
