//! Reference source: HTTP response size.
//!
//! Fetches a URL on every tick and reports the body size as a gauge.
//!
//! - [`HttpSizeClient`]: reqwest-based [`SourceClient`](crate::collector::SourceClient)
//! - [`ResponseSizeTranslator`]: one `httpResponseSize` metric per response
//! - [`HttpSizeFactory`]: registers under type `http_size`

mod client;
mod factory;
mod translator;

pub use client::{DEFAULT_USER_AGENT, HttpSizeClient};
pub use factory::{HttpSizeConfig, HttpSizeFactory, HttpSizeSource, TRANSPORT, TYPE_NAME};
pub use translator::{LABELS, METRIC_NAME, ResponseSizeTranslator};
