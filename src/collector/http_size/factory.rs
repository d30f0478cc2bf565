//! Factory and settings for the `http_size` source.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collector::http_size::{HttpSizeClient, ResponseSizeTranslator};
use crate::collector::{CollectionUnit, ScrapeSource};
use crate::component::{
    Component, ComponentError, ComponentFactory, ComponentId, CreateSettings, SourceFactory,
    decode_config,
};
use crate::consumer::MetricsConsumer;
use crate::obsreport::ObsReport;

/// Type name under which the factory registers.
pub const TYPE_NAME: &str = "http_size";

/// Transport label recorded by self-observability.
pub const TRANSPORT: &str = "http";

/// Default collection interval (10 seconds).
const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

const DEFAULT_URL: &str = "http://localhost:8080/";

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

/// Settings for one `http_size` instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSizeConfig {
    /// Endpoint fetched on every tick.
    #[serde(default = "default_url")]
    pub source_url: String,
    /// Time between the end of one tick and the start of the next.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub collection_interval: Duration,
    /// Deadline for a single request (default: none).
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl Default for HttpSizeConfig {
    fn default() -> Self {
        Self {
            source_url: default_url(),
            collection_interval: DEFAULT_INTERVAL,
            timeout: None,
        }
    }
}

impl HttpSizeConfig {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            ..Self::default()
        }
    }

    /// Set the collection interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.collection_interval = interval;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check the settings.
    ///
    /// # Errors
    /// Returns [`ComponentError::Config`] for an unparsable or non-HTTP URL,
    /// a zero interval or a zero timeout.
    pub fn validate(&self, id: &ComponentId) -> Result<(), ComponentError> {
        let url = url::Url::parse(&self.source_url)
            .map_err(|e| ComponentError::config(id, format!("invalid source_url '{}': {e}", self.source_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ComponentError::config(
                id,
                format!("source_url scheme must be http or https, got '{}'", url.scheme()),
            ));
        }
        if self.collection_interval.is_zero() {
            return Err(ComponentError::config(id, "collection_interval must be greater than zero"));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ComponentError::config(id, "timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// The scheduled component produced by [`HttpSizeFactory`].
pub type HttpSizeSource = ScrapeSource<CollectionUnit<HttpSizeClient, ResponseSizeTranslator>>;

/// Creates `http_size` sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpSizeFactory;

impl HttpSizeFactory {
    /// Build the concrete source.
    ///
    /// # Errors
    /// Returns [`ComponentError::Config`] if the settings are invalid or the
    /// HTTP client cannot be built.
    pub fn create_source(
        &self,
        settings: &CreateSettings,
        config: HttpSizeConfig,
        next: Arc<dyn MetricsConsumer>,
    ) -> Result<HttpSizeSource, ComponentError> {
        config.validate(&settings.id)?;

        let client = HttpSizeClient::new(&config.source_url, config.timeout)
            .map_err(|e| ComponentError::config(&settings.id, e.to_string()))?;
        let obs = ObsReport::new(
            settings.id.to_string(),
            TRANSPORT,
            TYPE_NAME,
            Arc::clone(&settings.receiver_metrics),
        );
        let unit = CollectionUnit::new(
            settings.id.clone(),
            client,
            ResponseSizeTranslator,
            next,
            obs,
        );

        tracing::debug!(
            source = %settings.id,
            url = %config.source_url,
            interval = ?config.collection_interval,
            "Created http_size source"
        );
        Ok(ScrapeSource::new(
            settings.id.clone(),
            config.collection_interval,
            unit,
        ))
    }
}

impl ComponentFactory for HttpSizeFactory {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn default_config(&self) -> Value {
        serde_json::to_value(HttpSizeConfig::default()).unwrap_or_default()
    }
}

impl SourceFactory for HttpSizeFactory {
    fn create_metrics_source(
        &self,
        settings: &CreateSettings,
        config: Value,
        next: Arc<dyn MetricsConsumer>,
    ) -> Result<Arc<dyn Component>, ComponentError> {
        let config: HttpSizeConfig = decode_config(&settings.id, config)?;
        Ok(Arc::new(self.create_source(settings, config, next)?))
    }
}
