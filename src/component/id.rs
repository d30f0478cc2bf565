//! Component instance identifiers.
//!
//! An id is either a bare type (`http_size`, the default instance) or a
//! type with a qualifier (`http_size/variant`) for additional instances of
//! the same type.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SEPARATOR: char = '/';

/// Errors parsing a [`ComponentId`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("component id cannot be empty")]
    Empty,
    #[error("component id '{0}' has an empty type")]
    EmptyType(String),
    #[error("component id '{0}' has an empty qualifier")]
    EmptyQualifier(String),
    #[error("component id '{0}' contains more than one '/'")]
    TooManySeparators(String),
}

/// Instance name: `type` or `type/qualifier`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentId {
    type_name: String,
    qualifier: Option<String>,
}

impl ComponentId {
    /// Default instance of `type_name`.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            qualifier: None,
        }
    }

    /// Qualified instance of `type_name`.
    ///
    /// # Errors
    /// Returns [`IdError`] if either part is empty or contains `/`.
    pub fn with_qualifier(
        type_name: impl Into<String>,
        qualifier: impl Into<String>,
    ) -> Result<Self, IdError> {
        let (type_name, qualifier) = (type_name.into(), qualifier.into());
        let full = format!("{type_name}{SEPARATOR}{qualifier}");
        if type_name.is_empty() {
            return Err(IdError::EmptyType(full));
        }
        if qualifier.is_empty() {
            return Err(IdError::EmptyQualifier(full));
        }
        if type_name.contains(SEPARATOR) || qualifier.contains(SEPARATOR) {
            return Err(IdError::TooManySeparators(full));
        }
        Ok(Self {
            type_name,
            qualifier: Some(qualifier),
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }
}

impl FromStr for ComponentId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        match s.split_once(SEPARATOR) {
            None => Ok(Self::new(s)),
            Some((type_name, qualifier)) => Self::with_qualifier(type_name, qualifier),
        }
    }
}

impl TryFrom<String> for ComponentId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ComponentId> for String {
    fn from(id: ComponentId) -> Self {
        id.to_string()
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}{}{}", self.type_name, SEPARATOR, q),
            None => f.write_str(&self.type_name),
        }
    }
}
