//! Remote directory and channel registry interfaces
//!
//! Both services are external; the coordinator only sees these traits.

use crate::error::RemoteError;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How a datasource obtains its value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSourceKind {
    /// Attribute of a bus device; record is `device/attribute`
    Device,
    /// Value supplied by the client; record names a channel
    Client,
    /// Any other kind; never checked on the bus
    Other(String),
}

/// Datasource description returned by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Source kind
    pub kind: DataSourceKind,
    /// Kind-specific record text
    pub record: String,
}

impl Binding {
    /// Device-attribute binding
    pub fn device(record: impl Into<String>) -> Self {
        Self {
            kind: DataSourceKind::Device,
            record: record.into(),
        }
    }

    /// Client binding naming a channel
    pub fn client(record: impl Into<String>) -> Self {
        Self {
            kind: DataSourceKind::Client,
            record: record.into(),
        }
    }

    /// Binding of an unchecked kind
    pub fn other(kind: impl Into<String>, record: impl Into<String>) -> Self {
        Self {
            kind: DataSourceKind::Other(kind.into()),
            record: record.into(),
        }
    }

    /// Split a device record into `(device, attribute)` at the last `/`
    ///
    /// Returns `None` for records without a separator or with an empty part.
    #[must_use]
    pub fn device_address(&self) -> Option<(&str, &str)> {
        if self.kind != DataSourceKind::Device {
            return None;
        }
        let (device, attribute) = self.record.trim().rsplit_once('/')?;
        (!device.is_empty() && !attribute.is_empty()).then_some((device, attribute))
    }
}

/// Channel known on the instrument-control bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Short channel name
    pub name: String,
    /// Full device identity
    pub full_name: String,
    /// Attribute source, `device/attribute`, possibly empty
    pub source: String,
}

impl ChannelInfo {
    /// Create channel description
    pub fn new(
        name: impl Into<String>,
        full_name: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            source: source.into(),
        }
    }

    /// Whether `channel` refers to this channel
    #[inline]
    #[must_use]
    pub fn matches(&self, channel: &str) -> bool {
        self.name == channel || self.full_name == channel
    }

    /// `(device, attribute)` to check for this channel
    ///
    /// Uses the source when it carries an attribute, otherwise the full name
    /// with no attribute.
    #[must_use]
    pub fn address(&self) -> (&str, &str) {
        match self.source.rsplit_once('/') {
            Some((device, attribute)) if !device.is_empty() && !attribute.is_empty() => {
                (device, attribute)
            }
            _ => (self.full_name.as_str(), ""),
        }
    }
}

/// Component and datasource directory
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// Names of every component the directory holds
    async fn available_components(&self) -> Result<Vec<String>, RemoteError>;

    /// Names of every datasource the directory holds
    async fn available_datasources(&self) -> Result<Vec<String>, RemoteError>;

    /// Datasources a component depends on, with their bindings when known
    async fn expand_component(
        &self,
        name: &str,
    ) -> Result<IndexMap<String, Option<Binding>>, RemoteError>;

    /// Bindings of the named datasources; unknown names are omitted
    async fn describe_datasources(
        &self,
        names: &[String],
    ) -> Result<IndexMap<String, Binding>, RemoteError>;
}

/// Registry of channels defined on the bus
#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    /// Every known channel
    async fn known_channels(&self) -> Result<Vec<ChannelInfo>, RemoteError>;
}
