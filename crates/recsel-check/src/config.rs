//! Engine configuration
//!
//! All settings deserialize with defaults filled in, so a partial TOML or
//! YAML document only has to name what it changes.

use crate::coordinator::ValidationCoordinator;
use crate::device::DeviceBus;
use crate::environment::{EnvironmentBridge, EnvironmentStore};
use crate::error::ConfigError;
use crate::remote::{ChannelRegistry, RemoteDirectory};
use recsel_convert::{ConvertError, VersionConverter};
use recsel_selection::{SelectionDefaults, SelectionRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Attribute names tried when a datasource names no attribute
pub const DEFAULT_ATTRIBUTE_CANDIDATES: &[&str] = &[
    "Value",
    "Position",
    "Counts",
    "Data",
    "Voltage",
    "Energy",
    "SampleTime",
];

/// Settings for the check worker pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Requested worker count; values below one mean one worker per group
    pub workers: i32,
    /// Readiness wait timeout; `None` uses the transport default
    pub wait_timeout_ms: Option<u64>,
    /// Attributes tried, in order, when a datasource names none
    pub attribute_candidates: Vec<String>,
    /// Attribute prefix marking references that are not checked
    pub skip_prefix: String,
    /// Attribute suffix marking commands to invoke instead of read
    pub command_suffix: String,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            wait_timeout_ms: None,
            attribute_candidates: DEFAULT_ATTRIBUTE_CANDIDATES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            skip_prefix: "@".to_string(),
            command_suffix: "()".to_string(),
        }
    }
}

impl CheckConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set requested worker count
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: i32) -> Self {
        self.workers = workers;
        self
    }

    /// Set readiness wait timeout
    #[inline]
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Replace the attribute candidate list
    #[must_use]
    pub fn with_attribute_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    /// Readiness wait timeout
    #[inline]
    #[must_use]
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }

    /// Number of workers to start for `groups` pending groups
    ///
    /// Never more workers than groups; zero only when there is nothing to do.
    #[must_use]
    pub fn worker_count(&self, groups: usize) -> usize {
        match usize::try_from(self.workers) {
            Ok(workers) if workers >= 1 => workers.min(groups),
            _ => groups,
        }
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns `ConfigError::Toml` for invalid documents
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Parse from YAML text
    ///
    /// # Errors
    /// Returns `ConfigError::Yaml` for invalid documents
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Settings for the environment bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Sub-object of `new` holding namespaced variables
    pub namespace: String,
    /// Names read from and written to the top level of `new`
    pub raw_names: Vec<String>,
    /// Names written verbatim instead of decoded from JSON
    pub pure_names: Vec<String>,
    /// Blob encoding the store must serve
    pub encoding: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            namespace: "NeXusConfiguration".to_string(),
            raw_names: ["ScanDir", "ScanFile", "ScanID", "ActiveMntGrp"]
                .map(String::from)
                .to_vec(),
            pure_names: ["ScanDir", "ActiveMntGrp", "NeXusSelectorDevice"]
                .map(String::from)
                .to_vec(),
            encoding: "json".to_string(),
        }
    }
}

impl EnvironmentConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set namespace sub-object name
    #[inline]
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Whether `name` lives at the top level of `new`
    #[inline]
    #[must_use]
    pub fn is_raw(&self, name: &str) -> bool {
        self.raw_names.iter().any(|raw| raw == name)
    }

    /// Whether `name` is stored without JSON decoding
    #[inline]
    #[must_use]
    pub fn is_pure(&self, name: &str) -> bool {
        self.pure_names.iter().any(|pure| pure == name)
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker pool settings
    pub check: CheckConfig,
    /// Environment bridge settings
    pub environment: EnvironmentConfig,
    /// Selection record defaults
    pub selection: SelectionDefaults,
    /// Schema version records are converted to before validation
    pub target_version: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let selection = SelectionDefaults::default();
        Self {
            check: CheckConfig::default(),
            environment: EnvironmentConfig::default(),
            target_version: selection.version.clone(),
            selection,
        }
    }
}

impl EngineConfig {
    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns `ConfigError::Toml` for invalid documents
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Parse from YAML text
    ///
    /// # Errors
    /// Returns `ConfigError::Yaml` for invalid documents
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Fresh record carrying the configured defaults
    #[must_use]
    pub fn record(&self) -> SelectionRecord {
        SelectionRecord::with_defaults(self.selection.clone())
    }

    /// Converter targeting `target_version`
    ///
    /// # Errors
    /// Returns `ConvertError` when `target_version` is not a known schema
    pub fn converter(&self) -> Result<VersionConverter, ConvertError> {
        VersionConverter::new(&self.target_version)
    }

    /// Coordinator over the given services, running with `check`
    #[must_use]
    pub fn coordinator(
        &self,
        directory: Arc<dyn RemoteDirectory>,
        registry: Arc<dyn ChannelRegistry>,
        bus: Arc<dyn DeviceBus>,
    ) -> ValidationCoordinator {
        ValidationCoordinator::new(directory, registry, bus).with_config(self.check.clone())
    }

    /// Environment bridge over `store`, using `environment`
    #[must_use]
    pub fn environment_bridge(&self, store: Arc<dyn EnvironmentStore>) -> EnvironmentBridge {
        EnvironmentBridge::new(store).with_config(self.environment.clone())
    }
}
