//! Scheduled source component.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::collector::CollectError;
use crate::component::{Component, ComponentError, ComponentId, Host};
use crate::scheduler::{Halt, IntervalRunner, Runnable, RunnerState};

/// Drives a [`Runnable`] collection unit on a fixed interval.
///
/// `start` fails fast if the unit's setup fails. A fatal tick error or a
/// panicking tick stops scheduling and is reported to the host as
/// [`ComponentError::Fatal`].
/// `shutdown` blocks until no tick is in flight and may be called more than
/// once.
pub struct ScrapeSource<R> {
    id: ComponentId,
    unit: Arc<R>,
    runner: Mutex<IntervalRunner>,
}

impl<R> ScrapeSource<R>
where
    R: Runnable<Error = CollectError>,
{
    pub fn new(id: ComponentId, interval: Duration, unit: R) -> Self {
        Self {
            id,
            unit: Arc::new(unit),
            runner: Mutex::new(IntervalRunner::new(interval)),
        }
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn unit(&self) -> &Arc<R> {
        &self.unit
    }

    pub async fn state(&self) -> RunnerState {
        self.runner.lock().await.state()
    }
}

#[async_trait::async_trait]
impl<R> Component for ScrapeSource<R>
where
    R: Runnable<Error = CollectError>,
{
    async fn start(&self, host: Arc<dyn Host>) -> Result<(), ComponentError> {
        let mut runner = self.runner.lock().await;
        if runner.state() != RunnerState::Created {
            return Err(ComponentError::AlreadyStarted(self.id.clone()));
        }

        let id = self.id.clone();
        runner
            .start(Arc::clone(&self.unit), move |halt: Halt<CollectError>| {
                host.report_fatal_error(ComponentError::Fatal {
                    id,
                    message: halt.to_string(),
                });
            })
            .await
            .map_err(|source| ComponentError::Scheduler {
                id: self.id.clone(),
                source,
            })?;

        tracing::info!(source = %self.id, interval = ?runner.interval(), "Source started");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        let mut runner = self.runner.lock().await;
        let was_running = runner.state() == RunnerState::Running;
        runner
            .stop()
            .await
            .map_err(|source| ComponentError::Scheduler {
                id: self.id.clone(),
                source,
            })?;
        if was_running {
            tracing::info!(source = %self.id, "Source stopped");
        }
        Ok(())
    }
}

impl<R> std::fmt::Debug for ScrapeSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapeSource")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
