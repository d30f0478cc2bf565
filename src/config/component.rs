//! Component instance and pipeline entries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::component::{ComponentId, overlay_config};

/// One configured component instance.
///
/// `type` selects the factory, the optional `name` qualifies the instance
/// id (`type/name`). Every other key is passed to the factory as settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ComponentConfig {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: None,
            settings: Map::new(),
        }
    }

    /// Set the instance qualifier.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set one settings field.
    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    /// Instance id derived from `type` and `name`.
    ///
    /// # Errors
    /// Returns a description of the problem if either part is empty or
    /// contains `/`.
    pub fn id(&self) -> Result<ComponentId, String> {
        match &self.name {
            Some(name) => ComponentId::with_qualifier(&self.type_name, name).map_err(|e| e.to_string()),
            None if self.type_name.trim().is_empty() => Err("component type cannot be empty".to_string()),
            None if self.type_name.contains('/') => Err(format!(
                "component type '{}' cannot contain '/'; use `name` to qualify instances",
                self.type_name
            )),
            None => Ok(ComponentId::new(&self.type_name)),
        }
    }

    /// Factory defaults overlaid with this instance's settings.
    pub fn effective_settings(&self, defaults: Value) -> Value {
        overlay_config(defaults, self.settings.clone())
    }
}

/// Ordered wiring of one pipeline.
///
/// Batches from every source pass through `transforms` in order and are
/// delivered to every sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSpec {
    pub sources: Vec<ComponentId>,
    #[serde(default)]
    pub transforms: Vec<ComponentId>,
    pub sinks: Vec<ComponentId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_component_config_from_yaml() {
        let yaml = r#"
type: http_size
name: variant
source_url: http://localhost:9090/
collection_interval: 5s
"#;
        let config: ComponentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.type_name, "http_size");
        assert_eq!(config.id().unwrap().to_string(), "http_size/variant");
        assert_eq!(config.settings.len(), 2);
        assert_eq!(config.settings["collection_interval"], json!("5s"));
    }

    #[test]
    fn test_id_errors() {
        assert!(ComponentConfig::new("").id().is_err());
        assert!(ComponentConfig::new("a/b").id().is_err());
        assert!(ComponentConfig::new("a").with_name("").id().is_err());
        assert_eq!(ComponentConfig::new("a").id().unwrap(), ComponentId::new("a"));
    }

    #[test]
    fn test_effective_settings_overlay() {
        let config = ComponentConfig::new("http_size").with_setting("collection_interval", json!("1s"));
        let effective = config.effective_settings(json!({
            "source_url": "http://localhost:8080/",
            "collection_interval": "10s",
        }));
        assert_eq!(
            effective,
            json!({ "source_url": "http://localhost:8080/", "collection_interval": "1s" })
        );
    }

    #[test]
    fn test_pipeline_spec_parses_ids() {
        let yaml = "sources: [http_size, http_size/variant]\nsinks: [logging]\n";
        let spec: PipelineSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.sources[1].qualifier(), Some("variant"));
        assert!(spec.transforms.is_empty());

        assert!(serde_yaml::from_str::<PipelineSpec>("sources: [\"/x\"]\nsinks: []\n").is_err());
    }
}
