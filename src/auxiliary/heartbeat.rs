//! `heartbeat` auxiliary.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::component::{
    AuxiliaryFactory, Component, ComponentError, ComponentFactory, ComponentId, CreateSettings,
    Host, decode_config,
};
use crate::scheduler::{Halt, IntervalRunner, Runnable, RunnerState};

pub const TYPE_NAME: &str = "heartbeat";

/// Default heartbeat interval (60 seconds).
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatConfig {
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
        }
    }
}

struct Beat {
    id: ComponentId,
    started: Instant,
    beats: AtomicU64,
}

#[async_trait::async_trait]
impl Runnable for Beat {
    type Error = Infallible;

    async fn run(&self) -> Result<(), Infallible> {
        let beat = self.beats.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            auxiliary = %self.id,
            beat,
            uptime = %humantime::format_duration(Duration::from_secs(self.started.elapsed().as_secs())),
            "Heartbeat"
        );
        Ok(())
    }
}

/// Logs a liveness line on a fixed interval.
pub struct Heartbeat {
    id: ComponentId,
    beat: Arc<Beat>,
    runner: Mutex<IntervalRunner>,
}

impl Heartbeat {
    pub fn new(id: ComponentId, interval: Duration) -> Self {
        Self {
            beat: Arc::new(Beat {
                id: id.clone(),
                started: Instant::now(),
                beats: AtomicU64::new(0),
            }),
            id,
            runner: Mutex::new(IntervalRunner::new(interval)),
        }
    }

    /// Heartbeats emitted so far.
    pub fn beats(&self) -> u64 {
        self.beat.beats.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Heartbeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heartbeat")
            .field("id", &self.id)
            .field("beats", &self.beats())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Component for Heartbeat {
    async fn start(&self, host: Arc<dyn Host>) -> Result<(), ComponentError> {
        let mut runner = self.runner.lock().await;
        if runner.state() != RunnerState::Created {
            return Err(ComponentError::AlreadyStarted(self.id.clone()));
        }
        let id = self.id.clone();
        runner
            .start(Arc::clone(&self.beat), move |halt: Halt<Infallible>| {
                host.report_fatal_error(ComponentError::Fatal {
                    id,
                    message: halt.to_string(),
                });
            })
            .await
            .map_err(|source| ComponentError::Scheduler {
                id: self.id.clone(),
                source,
            })
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        self.runner
            .lock()
            .await
            .stop()
            .await
            .map_err(|source| ComponentError::Scheduler {
                id: self.id.clone(),
                source,
            })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeartbeatFactory;

impl ComponentFactory for HeartbeatFactory {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn default_config(&self) -> Value {
        serde_json::to_value(HeartbeatConfig::default()).unwrap_or_default()
    }
}

impl AuxiliaryFactory for HeartbeatFactory {
    fn create_auxiliary(
        &self,
        settings: &CreateSettings,
        config: Value,
    ) -> Result<Arc<dyn Component>, ComponentError> {
        let config: HeartbeatConfig = decode_config(&settings.id, config)?;
        if config.interval.is_zero() {
            return Err(ComponentError::config(&settings.id, "interval must be greater than zero"));
        }
        Ok(Arc::new(Heartbeat::new(settings.id.clone(), config.interval)))
    }
}
