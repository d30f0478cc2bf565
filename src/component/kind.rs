//! Component kinds.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// The four component kinds a pipeline is assembled from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ComponentKind {
    /// Pulls data from an external system and emits metric batches.
    Source,
    /// Transforms batches and forwards them.
    Transform,
    /// Terminal consumer.
    Sink,
    /// Runs alongside pipelines without handling data.
    Auxiliary,
}
