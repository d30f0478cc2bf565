//! Built-in factory set.

use crate::auxiliary::HeartbeatFactory;
use crate::collector::http_size::HttpSizeFactory;
use crate::component::{Factories, FactoriesBuilder, Factory, MultiError};
use crate::sink::LoggingSinkFactory;
use crate::transform::StaticLabelsFactory;

/// Factories shipped with the crate, not yet validated.
pub fn default_factories() -> FactoriesBuilder {
    FactoriesBuilder::new()
        .register(Factory::source(HttpSizeFactory))
        .register(Factory::transform(StaticLabelsFactory))
        .register(Factory::sink(LoggingSinkFactory))
        .register(Factory::auxiliary(HeartbeatFactory))
}

/// Built-in factories merged with caller-supplied `extensions`.
///
/// An extension registered under a built-in type name replaces the
/// built-in.
///
/// # Errors
/// Returns every duplicate type found within either set.
pub fn build_factories(extensions: FactoriesBuilder) -> Result<Factories, MultiError> {
    Factories::compose(default_factories(), extensions)
}
