//! Error types for selection validation
//!
//! Two levels of failure exist:
//! - [`CheckError`]: fatal to a whole validation run (directory or channel
//!   registry unreachable, undecodable selection fields)
//! - [`CheckFailure`]: recorded against a single check group; the run
//!   continues with the remaining groups
//!
//! The environment bridge reports through [`EnvironmentError`].

use crate::types::GroupKind;
use recsel_selection::SelectionError;

/// Error reported by a remote collaborator (directory, registry, device bus,
/// environment store)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    /// Transport-provided description
    pub message: String,
}

impl RemoteError {
    /// Create remote error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Fatal validation run errors
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Component directory could not be queried
    #[error("component directory unavailable: {0}")]
    DirectoryUnavailable(#[source] RemoteError),

    /// Channel registry could not be queried
    #[error("channel registry unavailable: {0}")]
    RegistryUnavailable(#[source] RemoteError),

    /// A selection field could not be decoded
    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),

    /// A worker task panicked or was aborted
    #[error("check worker failed: {0}")]
    WorkerFailed(String),
}

impl CheckError {
    /// Whether the failure came from a remote service rather than local data
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::DirectoryUnavailable(_) | Self::RegistryUnavailable(_)
        )
    }
}

/// Per-group validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckFailure {
    /// Item missing from the directory listing
    NotAvailable(GroupKind),
    /// Datasource bound to a channel the bus does not know
    UnresolvedChannel,
    /// Device handle could not be obtained
    Unreachable(String),
    /// Transport failure after connecting (ping, state, mode, wait)
    Transport(String),
    /// Device in FAULT state
    Fault,
    /// Attribute missing, unreadable or empty
    EmptyAttribute,
    /// Device in ALARM state
    Alarm,
}

impl CheckFailure {
    /// Message reported to callers
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::NotAvailable(GroupKind::Component) => {
                "Component not available in the directory".to_string()
            }
            Self::NotAvailable(GroupKind::DataSource) => {
                "DataSource not available in the directory".to_string()
            }
            Self::UnresolvedChannel => "Channel not defined on the bus".to_string(),
            Self::Unreachable(text) | Self::Transport(text) => text.clone(),
            Self::Fault => "FAULT STATE".to_string(),
            Self::EmptyAttribute => "Empty Attribute".to_string(),
            Self::Alarm => "ALARM_STATE".to_string(),
        }
    }

    /// Whether the failure was decided without contacting a device
    #[inline]
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::NotAvailable(_) | Self::UnresolvedChannel)
    }
}

impl std::fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Environment bridge errors
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    /// The store does not serve the required encoding; not retried
    #[error("environment transport unsupported: encoding '{encoding}'")]
    TransportUnsupported {
        /// Encoding reported by the store
        encoding: String,
    },

    /// The store could not be reached
    #[error("environment store failed: {0}")]
    Store(#[from] RemoteError),

    /// The decoded blob does not have the expected shape
    #[error("malformed environment blob: {0}")]
    MalformedBlob(String),

    /// A value supplied for writing is not valid JSON
    #[error("malformed value for '{name}': {source}")]
    MalformedValue {
        /// Variable name
        name: String,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },
}

impl EnvironmentError {
    /// Whether retrying the call can help
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML document could not be parsed
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML document could not be parsed
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages() {
        assert_eq!(CheckFailure::Fault.message(), "FAULT STATE");
        assert_eq!(CheckFailure::Alarm.message(), "ALARM_STATE");
        assert_eq!(CheckFailure::EmptyAttribute.message(), "Empty Attribute");
        assert_eq!(
            CheckFailure::Unreachable("device not exported".into()).to_string(),
            "device not exported"
        );
    }

    #[test]
    fn synthetic_failures() {
        assert!(CheckFailure::NotAvailable(GroupKind::Component).is_synthetic());
        assert!(CheckFailure::UnresolvedChannel.is_synthetic());
        assert!(!CheckFailure::Fault.is_synthetic());
    }

    #[test]
    fn check_error_classification() {
        let err = CheckError::DirectoryUnavailable(RemoteError::new("timeout"));
        assert!(err.is_remote());
        assert!(err.to_string().contains("timeout"));
        assert!(!CheckError::WorkerFailed("panic".into()).is_remote());
    }

    #[test]
    fn environment_error_retry() {
        assert!(!EnvironmentError::TransportUnsupported {
            encoding: "pickle".into()
        }
        .is_retryable());
        assert!(EnvironmentError::Store(RemoteError::new("down")).is_retryable());
    }
}
