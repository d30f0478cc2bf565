//! Application configuration structures.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::component::{ComponentId, ComponentKind, Factories, MultiError, ValidationError};
use crate::config::{ComponentConfig, ConfigError, PipelineSpec, expand_env_vars};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub sources: Vec<ComponentConfig>,

    #[serde(default)]
    pub transforms: Vec<ComponentConfig>,

    #[serde(default)]
    pub sinks: Vec<ComponentConfig>,

    #[serde(default)]
    pub auxiliaries: Vec<ComponentConfig>,

    /// Pipelines keyed by name.
    #[serde(default)]
    pub pipelines: BTreeMap<String, PipelineSpec>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` references are expanded before parsing. The result is not
    /// validated; call [`AppConfig::validate`] with the factory set.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration text.
    ///
    /// # Errors
    /// Returns [`ConfigError::ParseError`] on malformed YAML or schema
    /// mismatch.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(&expand_env_vars(content))?)
    }

    /// Configured instances of `kind`.
    pub fn components(&self, kind: ComponentKind) -> &[ComponentConfig] {
        match kind {
            ComponentKind::Source => &self.sources,
            ComponentKind::Transform => &self.transforms,
            ComponentKind::Sink => &self.sinks,
            ComponentKind::Auxiliary => &self.auxiliaries,
        }
    }

    /// Check instance ids, factory types and pipeline references.
    ///
    /// Every problem is collected; nothing stops at the first error.
    /// Settings themselves are checked by the factories when the service is
    /// built.
    ///
    /// # Errors
    /// Returns all problems found as one [`MultiError`].
    pub fn validate(&self, factories: &Factories) -> Result<(), MultiError> {
        let mut errors = MultiError::new();

        let sources = self.check_instances(ComponentKind::Source, factories, &mut errors);
        let transforms = self.check_instances(ComponentKind::Transform, factories, &mut errors);
        let sinks = self.check_instances(ComponentKind::Sink, factories, &mut errors);
        self.check_instances(ComponentKind::Auxiliary, factories, &mut errors);

        for (name, pipeline) in &self.pipelines {
            let groups = [
                (ComponentKind::Source, &pipeline.sources, &sources),
                (ComponentKind::Transform, &pipeline.transforms, &transforms),
                (ComponentKind::Sink, &pipeline.sinks, &sinks),
            ];
            for (kind, refs, known) in groups {
                if refs.is_empty() && kind != ComponentKind::Transform {
                    errors.push(ValidationError::EmptyPipeline {
                        pipeline: name.clone(),
                        kind,
                    });
                }
                for id in refs.iter().filter(|id| !known.contains(*id)) {
                    errors.push(ValidationError::UnknownComponent {
                        pipeline: name.clone(),
                        kind,
                        id: id.clone(),
                    });
                }
            }
        }

        errors.into_result()
    }

    /// Validate the instances of one kind and return their ids.
    fn check_instances(
        &self,
        kind: ComponentKind,
        factories: &Factories,
        errors: &mut MultiError,
    ) -> BTreeSet<ComponentId> {
        let mut ids = BTreeSet::new();
        for entry in self.components(kind) {
            let id = match entry.id() {
                Ok(id) => id,
                Err(reason) => {
                    errors.push(ValidationError::InvalidId { kind, reason });
                    continue;
                }
            };
            if !factories.contains(kind, &entry.type_name) {
                errors.push(ValidationError::UnknownType {
                    kind,
                    type_name: entry.type_name.clone(),
                });
            }
            if !ids.insert(id.clone()) {
                errors.push(ValidationError::DuplicateInstance {
                    kind,
                    id: id.to_string(),
                });
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::default_factories;
    use std::io::Write;

    const EXAMPLE: &str = r#"
sources:
  - type: http_size
    source_url: http://localhost:8080/metrics
    collection_interval: 10s
  - type: http_size
    name: variant
    source_url: http://localhost:9090/
transforms:
  - type: static_labels
    labels: { env: prod }
sinks:
  - type: logging
auxiliaries:
  - type: heartbeat
pipelines:
  metrics:
    sources: [http_size, http_size/variant]
    transforms: [static_labels]
    sinks: [logging]
"#;

    fn factories() -> Factories {
        default_factories().build().unwrap()
    }

    #[test]
    fn test_parse_and_validate_example() {
        let config = AppConfig::from_yaml(EXAMPLE).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.pipelines["metrics"].sources.len(), 2);
        config.validate(&factories()).unwrap();
    }

    #[test]
    fn test_load_from_file_expands_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "sources:\n  - type: http_size\n    source_url: ${{COLLECTORD_TEST_UNSET_URL:-http://127.0.0.1:1/}}\n"
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(
            config.sources[0].settings["source_url"],
            serde_json::json!("http://127.0.0.1:1/")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/collectord.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let err = AppConfig::from_yaml("receivers: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let yaml = r#"
sources:
  - type: http_size
  - type: http_size
  - type: carrier_pigeon
sinks:
  - type: logging
    name: ""
pipelines:
  broken:
    sources: [http_size, snmp]
    sinks: []
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        let err = config.validate(&factories()).unwrap_err();
        let errors: Vec<_> = err.iter().cloned().collect();

        assert!(errors.contains(&ValidationError::DuplicateInstance {
            kind: ComponentKind::Source,
            id: "http_size".to_string(),
        }));
        assert!(errors.contains(&ValidationError::UnknownType {
            kind: ComponentKind::Source,
            type_name: "carrier_pigeon".to_string(),
        }));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::InvalidId {
                kind: ComponentKind::Sink,
                ..
            }
        )));
        assert!(errors.contains(&ValidationError::UnknownComponent {
            pipeline: "broken".to_string(),
            kind: ComponentKind::Source,
            id: ComponentId::new("snmp"),
        }));
        assert!(errors.contains(&ValidationError::EmptyPipeline {
            pipeline: "broken".to_string(),
            kind: ComponentKind::Sink,
        }));
        assert_eq!(errors.len(), 5);
    }
}
