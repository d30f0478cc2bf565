//! Interval scheduler.
//!
//! [`IntervalRunner`] drives one [`Runnable`] on a fixed interval from a
//! dedicated Tokio task. The loop waits `interval`, then awaits `run()`;
//! the next wait starts only after `run()` returns, so ticks of the same
//! unit never overlap.
//!
//! # Lifecycle
//!
//! `Created -> Running -> Stopped`. A stopped runner is never restarted;
//! build a new one instead.
//!
//! - [`IntervalRunner::start`] awaits `setup()` once and fails fast if it
//!   errors, then spawns the tick loop and returns.
//! - [`IntervalRunner::stop`] cancels the loop and joins the task, so no tick
//!   runs after it returns. Calling it again is a no-op.
//!
//! A fatal tick error or a panic inside `run()` ends the loop and is handed
//! to the `on_fatal` callback as a [`Halt`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Errors raised by the scheduler itself.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `setup()` failed; the runner is now stopped.
    #[error("setup failed: {0}")]
    Setup(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Operation not allowed in the current state.
    #[error("cannot {operation} a runner in state {state}")]
    InvalidState {
        operation: &'static str,
        state: RunnerState,
    },

    /// The tick loop task panicked or was aborted.
    #[error("tick loop terminated abnormally: {0}")]
    Join(String),
}

/// Why a tick loop stopped on its own.
#[derive(Debug, Error)]
pub enum Halt<E> {
    /// A tick returned a fatal error.
    #[error(transparent)]
    Fatal(E),

    /// A tick panicked.
    #[error("tick panicked: {0}")]
    Panicked(String),
}

/// Classifies a tick failure for the scheduler.
pub trait TickFailure: std::error::Error + Send + Sync + 'static {
    /// `true` if scheduling must halt.
    fn is_fatal(&self) -> bool;
}

impl TickFailure for std::convert::Infallible {
    fn is_fatal(&self) -> bool {
        match *self {}
    }
}

/// Unit of work driven by an [`IntervalRunner`].
#[async_trait::async_trait]
pub trait Runnable: Send + Sync + 'static {
    /// Error type returned from `setup` and `run`.
    type Error: TickFailure;

    /// Called once, before the first tick.
    async fn setup(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// One tick. Non-fatal errors are logged and the loop continues.
    async fn run(&self) -> Result<(), Self::Error>;
}

/// Runner lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum RunnerState {
    Created,
    Running,
    Stopped,
}

/// Periodic executor for a single [`Runnable`].
pub struct IntervalRunner {
    interval: Duration,
    state: RunnerState,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl IntervalRunner {
    /// Create a runner in the `Created` state.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: RunnerState::Created,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Run `setup()` and launch the tick loop.
    ///
    /// `on_fatal` is invoked from the loop task if a tick returns a fatal
    /// error or panics; the loop exits right after.
    ///
    /// # Errors
    /// - [`SchedulerError::InvalidState`] if the runner is not `Created`
    /// - [`SchedulerError::Setup`] if `setup()` fails (the runner moves to `Stopped`)
    pub async fn start<R, F>(&mut self, unit: Arc<R>, on_fatal: F) -> Result<(), SchedulerError>
    where
        R: Runnable,
        F: FnOnce(Halt<R::Error>) + Send + 'static,
    {
        if self.state != RunnerState::Created {
            return Err(SchedulerError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        if let Err(e) = unit.setup().await {
            self.state = RunnerState::Stopped;
            return Err(SchedulerError::Setup(Box::new(e)));
        }

        let interval = self.interval;
        let cancel = self.cancel.clone();
        self.handle = Some(tokio::spawn(tick_loop(unit, interval, cancel, on_fatal)));
        self.state = RunnerState::Running;

        tracing::debug!(interval = ?interval, "Interval runner started");
        Ok(())
    }

    /// Cancel the loop and wait for the in-flight tick (if any) to finish.
    ///
    /// # Errors
    /// Returns [`SchedulerError::Join`] if the loop task panicked.
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        let previous = self.state;
        self.state = RunnerState::Stopped;
        self.cancel.cancel();

        if previous != RunnerState::Running {
            return Ok(());
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .map_err(|e| SchedulerError::Join(e.to_string()))?;
        }
        tracing::debug!("Interval runner stopped");
        Ok(())
    }
}

impl std::fmt::Debug for IntervalRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalRunner")
            .field("interval", &self.interval)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for IntervalRunner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn tick_loop<R, F>(unit: Arc<R>, interval: Duration, cancel: CancellationToken, on_fatal: F)
where
    R: Runnable,
    F: FnOnce(Halt<R::Error>) + Send + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        // Not raced against cancellation: stop() waits for the tick instead.
        match AssertUnwindSafe(unit.run()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_fatal() => {
                tracing::error!(error = %e, "Fatal tick error, halting scheduling");
                on_fatal(Halt::Fatal(e));
                break;
            }
            Ok(Err(e)) => {
                tracing::trace!(error = %e, "Tick failed, continuing");
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, "Tick panicked, halting scheduling");
                on_fatal(Halt::Panicked(message));
                break;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
