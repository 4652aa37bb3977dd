//! Resolver context configuration.

use serde::{Deserialize, Serialize};

use crate::VfsError;

/// Limits of a resolver [`Context`](crate::Context).
///
/// Only live objects count toward the limits: an object leaves the cache as
/// soon as its last handle is closed.
///
/// # Example
///
/// ```rust
/// use stackvfs::ContextConfig;
///
/// let config = ContextConfig::from_json_str(r#"{"maximum_file_systems": 4}"#).unwrap();
/// assert_eq!(config.maximum_file_systems, 4);
/// assert_eq!(config.maximum_file_objects, 128);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    /// Maximum number of distinct open file objects.
    pub maximum_file_objects: usize,

    /// Maximum number of distinct open file systems.
    pub maximum_file_systems: usize,
}

impl ContextConfig {
    /// Parse and validate a configuration from JSON. Missing fields take
    /// their default values.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Configuration`] if the JSON is invalid or a limit is zero
    pub fn from_json_str(json: &str) -> Result<Self, VfsError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| VfsError::configuration(format!("invalid context configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every limit is usable.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Configuration`] if a limit is zero
    pub fn validate(&self) -> Result<(), VfsError> {
        if self.maximum_file_objects == 0 {
            return Err(VfsError::configuration("maximum_file_objects must be at least 1"));
        }
        if self.maximum_file_systems == 0 {
            return Err(VfsError::configuration("maximum_file_systems must be at least 1"));
        }
        Ok(())
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            maximum_file_objects: 128,
            maximum_file_systems: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ContextConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_json_gives_defaults() {
        assert_eq!(ContextConfig::from_json_str("{}").unwrap(), ContextConfig::default());
    }

    #[test]
    fn zero_limit_rejected() {
        let err = ContextConfig::from_json_str(r#"{"maximum_file_objects": 0}"#).unwrap_err();
        assert!(matches!(err, VfsError::Configuration { .. }));
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(ContextConfig::from_json_str(r#"{"max_objects": 3}"#).is_err());
    }
}
