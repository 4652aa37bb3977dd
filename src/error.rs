//! Error types for path specification resolution and layered I/O.

use crate::TypeIndicator;

/// Error type for every fallible operation in this crate.
///
/// Resolution errors name the layer that failed through its
/// [`TypeIndicator`]. Uses `#[non_exhaustive]` for forward compatibility.
///
/// # Examples
///
/// ```rust
/// use stackvfs::{TypeIndicator, VfsError};
///
/// let err = VfsError::not_supported(TypeIndicator::RAW, "new_file_system");
/// assert_eq!(err.to_string(), "RAW: new_file_system: not supported");
/// assert_eq!(err.type_indicator(), Some(&TypeIndicator::RAW));
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    /// Invalid registration, construction or configuration.
    #[error("configuration error: {reason}")]
    Configuration {
        /// What was wrong.
        reason: String,
    },

    /// A path specification chain cannot be resolved as it stands.
    #[error("{type_indicator}: path specification error: {reason}")]
    PathSpec {
        /// The layer whose specification is invalid.
        type_indicator: TypeIndicator,
        /// What was wrong.
        reason: String,
    },

    /// The operation does not apply to this layer type.
    #[error("{type_indicator}: {operation}: not supported")]
    NotSupported {
        /// The layer type.
        type_indicator: TypeIndicator,
        /// The unsupported operation or feature.
        operation: String,
    },

    /// A secret needed to unlock an encrypted layer is missing or wrong.
    #[error("{type_indicator}: unable to unlock: {reason}")]
    Credential {
        /// The encrypted layer.
        type_indicator: TypeIndicator,
        /// What was wrong.
        reason: String,
    },

    /// An I/O error from the storage underneath a layer.
    #[error("{type_indicator}: {operation} failed: {source}")]
    Io {
        /// The layer performing the I/O.
        type_indicator: TypeIndicator,
        /// The operation that failed.
        operation: &'static str,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A serialized path specification is malformed.
    #[error("format error: {reason}")]
    Format {
        /// What was wrong.
        reason: String,
    },

    /// The resolver context already holds its maximum number of open objects.
    #[error("{type_indicator}: cache full: {limit} objects already open")]
    CacheFull {
        /// The layer that could not be cached.
        type_indicator: TypeIndicator,
        /// The configured limit.
        limit: usize,
    },
}

impl VfsError {
    /// Shorthand for [`VfsError::Configuration`].
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`VfsError::PathSpec`].
    pub fn path_spec(type_indicator: TypeIndicator, reason: impl Into<String>) -> Self {
        Self::PathSpec {
            type_indicator,
            reason: reason.into(),
        }
    }

    /// Shorthand for [`VfsError::NotSupported`].
    pub fn not_supported(type_indicator: TypeIndicator, operation: impl Into<String>) -> Self {
        Self::NotSupported {
            type_indicator,
            operation: operation.into(),
        }
    }

    /// Shorthand for [`VfsError::Credential`].
    pub fn credential(type_indicator: TypeIndicator, reason: impl Into<String>) -> Self {
        Self::Credential {
            type_indicator,
            reason: reason.into(),
        }
    }

    /// Shorthand for [`VfsError::Io`].
    pub fn io(type_indicator: TypeIndicator, operation: &'static str, source: std::io::Error) -> Self {
        Self::Io {
            type_indicator,
            operation,
            source,
        }
    }

    /// Shorthand for [`VfsError::Format`].
    pub fn format(reason: impl Into<String>) -> Self {
        Self::Format {
            reason: reason.into(),
        }
    }

    /// The layer type the error is attributed to, when known.
    pub fn type_indicator(&self) -> Option<&TypeIndicator> {
        match self {
            Self::PathSpec { type_indicator, .. }
            | Self::NotSupported { type_indicator, .. }
            | Self::Credential { type_indicator, .. }
            | Self::Io { type_indicator, .. }
            | Self::CacheFull { type_indicator, .. } => Some(type_indicator),
            Self::Configuration { .. } | Self::Format { .. } => None,
        }
    }
}

impl From<VfsError> for std::io::Error {
    fn from(error: VfsError) -> Self {
        match error {
            VfsError::Io { source, .. } => source,
            other => {
                let kind = match &other {
                    VfsError::NotSupported { .. } => std::io::ErrorKind::Unsupported,
                    VfsError::Credential { .. } => std::io::ErrorKind::PermissionDenied,
                    _ => std::io::ErrorKind::Other,
                };
                std::io::Error::new(kind, other)
            }
        }
    }
}
