//! Built-in transforms.
//!
//! - [`static_labels`]: append fixed labels to every metric

pub mod static_labels;

pub use static_labels::{StaticLabels, StaticLabelsConfig, StaticLabelsFactory};
