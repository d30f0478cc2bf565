//! Built-in auxiliary components.
//!
//! Auxiliaries take part in the service lifecycle but not in any data path.
//!
//! - [`heartbeat`]: periodic liveness log line

pub mod heartbeat;

pub use heartbeat::{Heartbeat, HeartbeatConfig, HeartbeatFactory};
