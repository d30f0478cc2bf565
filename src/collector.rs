//! Collector Layer
//!
//! Interval-driven sources that fetch from an external system, translate
//! the response into the canonical model and push it downstream. Each
//! source runs its ticks on its own Tokio task.
//!
//! # Architecture
//!
//! - [`SourceClient`] / [`Translator`]: fetch a raw response, convert it
//! - [`CollectionUnit`]: one fetch, translate and forward cycle per tick
//! - [`ScrapeSource`]: component lifecycle around an interval runner
//! - [`http_size`]: the reference HTTP response-size source
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use collectord::collector::http_size::{HttpSizeConfig, HttpSizeFactory};
//! use collectord::component::{ComponentId, CreateSettings};
//! use collectord::consumer::CapturingConsumer;
//! use collectord::obsreport::ReceiverMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = CreateSettings::new(
//!     ComponentId::new("http_size"),
//!     Arc::new(ReceiverMetrics::new()),
//! );
//! let config = HttpSizeConfig::new("http://127.0.0.1:8080/")
//!     .with_interval(Duration::from_secs(30));
//! let source = HttpSizeFactory.create_source(
//!     &settings,
//!     config,
//!     Arc::new(CapturingConsumer::new()),
//! )?;
//! // source.start(host).await?;
//! # Ok(())
//! # }
//! ```

pub mod http_size;
mod source;
mod traits;
mod unit;

pub use source::ScrapeSource;
pub use traits::{CollectError, FetchError, SourceClient, Translator};
pub use unit::{Clock, CollectionUnit};
