//! Built-in sinks.
//!
//! - [`logging`]: write batch summaries through `tracing`

pub mod logging;

pub use logging::{LoggingConfig, LoggingSink, LoggingSinkFactory, Verbosity};
