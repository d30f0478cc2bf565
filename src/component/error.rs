//! Component and validation error types.

use thiserror::Error;

use crate::component::{ComponentId, ComponentKind};
use crate::scheduler::SchedulerError;

/// Errors raised while creating or running a single component.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// Settings could not be decoded or failed validation.
    #[error("invalid configuration for '{id}': {reason}")]
    Config { id: ComponentId, reason: String },

    /// Lifecycle call in the wrong state.
    #[error("component '{0}' already started")]
    AlreadyStarted(ComponentId),

    /// The component's scheduler refused to start or stop.
    #[error("component '{id}': {source}")]
    Scheduler {
        id: ComponentId,
        #[source]
        source: SchedulerError,
    },

    /// The component cannot continue; reported to the host.
    #[error("fatal error in '{id}': {message}")]
    Fatal { id: ComponentId, message: String },

    /// Shutdown did not finish in time.
    #[error("shutdown timed out after {0:?}")]
    ShutdownTimeout(std::time::Duration),
}

impl ComponentError {
    pub fn config(id: &ComponentId, reason: impl Into<String>) -> Self {
        Self::Config {
            id: id.clone(),
            reason: reason.into(),
        }
    }
}

/// A single build-time or configuration problem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Two factories of the same kind declare the same type.
    #[error("duplicate {kind} factory type '{type_name}'")]
    DuplicateType {
        kind: ComponentKind,
        type_name: String,
    },

    /// Configuration references a type no factory provides.
    #[error("unknown {kind} type '{type_name}'")]
    UnknownType {
        kind: ComponentKind,
        type_name: String,
    },

    /// Two configured instances of a kind share an id.
    #[error("duplicate {kind} instance '{id}'")]
    DuplicateInstance { kind: ComponentKind, id: String },

    /// Instance id could not be formed.
    #[error("invalid {kind} id: {reason}")]
    InvalidId { kind: ComponentKind, reason: String },

    /// A pipeline references a component that is not configured.
    #[error("pipeline '{pipeline}' references unknown {kind} '{id}'")]
    UnknownComponent {
        pipeline: String,
        kind: ComponentKind,
        id: ComponentId,
    },

    /// A pipeline lists no components of a required kind.
    #[error("pipeline '{pipeline}' must have at least one {kind}")]
    EmptyPipeline {
        pipeline: String,
        kind: ComponentKind,
    },

    /// Settings rejected by the factory.
    #[error("invalid {kind} '{id}': {reason}")]
    InvalidConfig {
        kind: ComponentKind,
        id: String,
        reason: String,
    },
}

/// Ordered collection of [`ValidationError`]s.
///
/// Builders push every problem they find and convert to a `Result` at the end
/// with [`MultiError::into_result`], so callers see all problems at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiError {
    errors: Vec<ValidationError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// `true` when no error has been recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.errors.iter()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), MultiError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Extend<ValidationError> for MultiError {
    fn extend<I: IntoIterator<Item = ValidationError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl IntoIterator for MultiError {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a MultiError {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl From<ValidationError> for MultiError {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl std::fmt::Display for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.errors.len() {
            0 => f.write_str("no errors"),
            1 => write!(f, "{}", self.errors[0]),
            n => {
                write!(f, "{n} errors: ")?;
                for (i, e) in self.errors.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for MultiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_multi_error_is_ok() {
        let errors = MultiError::new();
        assert!(errors.is_empty());
        assert_eq!(errors.to_string(), "no errors");
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_multi_error_formatting() {
        let mut errors = MultiError::new();
        errors.push(ValidationError::DuplicateType {
            kind: ComponentKind::Source,
            type_name: "http_size".to_string(),
        });
        assert_eq!(errors.to_string(), "duplicate source factory type 'http_size'");

        errors.push(ValidationError::UnknownType {
            kind: ComponentKind::Sink,
            type_name: "kafka".to_string(),
        });
        assert_eq!(
            errors.to_string(),
            "2 errors: duplicate source factory type 'http_size'; unknown sink type 'kafka'"
        );

        let err = errors.into_result().unwrap_err();
        assert_eq!(err.len(), 2);
    }
}
