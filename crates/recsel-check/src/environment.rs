//! Environment bridge
//!
//! Session-scoped variables live in one remote blob shaped
//! `{"new": {...}}`. Raw names sit at the top level of `new`; every other
//! name lives in the namespaced sub-object (`new.NeXusConfiguration` by
//! default).

use crate::config::EnvironmentConfig;
use crate::error::{EnvironmentError, RemoteError};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::Span;

const NEW: &str = "new";

/// Encoded environment blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentBlob {
    /// Encoding name reported by the store
    pub encoding: String,
    /// Encoded payload
    pub payload: String,
}

impl EnvironmentBlob {
    /// Create blob
    pub fn new(encoding: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            encoding: encoding.into(),
            payload: payload.into(),
        }
    }
}

/// Remote holder of the environment blob
#[async_trait]
pub trait EnvironmentStore: Send + Sync {
    /// Read the current blob
    async fn fetch(&self) -> Result<EnvironmentBlob, RemoteError>;

    /// Replace the blob
    async fn store(&self, blob: EnvironmentBlob) -> Result<(), RemoteError>;
}

/// Reads and writes session variables through an [`EnvironmentStore`]
#[derive(Clone)]
pub struct EnvironmentBridge {
    store: Arc<dyn EnvironmentStore>,
    config: EnvironmentConfig,
    span: Span,
}

impl std::fmt::Debug for EnvironmentBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentBridge")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EnvironmentBridge {
    /// Create bridge with default configuration
    pub fn new(store: Arc<dyn EnvironmentStore>) -> Self {
        Self {
            store,
            config: EnvironmentConfig::default(),
            span: Span::none(),
        }
    }

    /// With configuration
    #[must_use]
    pub fn with_config(mut self, config: EnvironmentConfig) -> Self {
        self.config = config;
        self
    }

    /// Report events under `span`
    #[inline]
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Read the named variables
    ///
    /// Names not set in the environment are left out. Objects and arrays
    /// come back as JSON text; scalars as they are.
    ///
    /// # Errors
    /// - `TransportUnsupported` if the store serves another encoding
    /// - `Store` if the store cannot be reached
    /// - `MalformedBlob` if the payload, `new` or the namespace is not a
    ///   JSON object
    pub async fn read<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<IndexMap<String, Value>, EnvironmentError> {
        let mut payload = self.fetch_payload().await?;
        let Some(mut new) = take_object(&mut payload, NEW)? else {
            return Ok(IndexMap::new());
        };
        let namespace = take_object(&mut new, &self.config.namespace)?;

        let mut values = IndexMap::new();
        for name in names {
            let name = name.as_ref();
            let found = if self.config.is_raw(name) {
                new.get(name)
            } else {
                namespace.as_ref().and_then(|ns| ns.get(name))
            };
            if let Some(value) = found {
                let value = match value {
                    Value::Object(_) | Value::Array(_) => Value::String(value.to_string()),
                    scalar => scalar.clone(),
                };
                values.insert(name.to_string(), value);
            }
        }
        tracing::debug!(parent: &self.span, requested = names.len(), found = values.len(), "environment read");
        Ok(values)
    }

    /// Merge `values` into the environment and write the blob back
    ///
    /// String values are decoded from JSON text unless the name is a pure
    /// field; non-string values are stored as given.
    ///
    /// # Errors
    /// As [`EnvironmentBridge::read`], plus `MalformedValue` if a value is
    /// not valid JSON text. Nothing is written on error.
    pub async fn write(&self, values: &Map<String, Value>) -> Result<(), EnvironmentError> {
        let mut payload = self.fetch_payload().await?;

        let mut new = take_object(&mut payload, NEW)?.unwrap_or_default();
        let mut namespace = take_object(&mut new, &self.config.namespace)?.unwrap_or_default();

        for (name, value) in values {
            let value = match value {
                Value::String(text) if !self.config.is_pure(name) => serde_json::from_str(text)
                    .map_err(|source| EnvironmentError::MalformedValue {
                        name: name.clone(),
                        source,
                    })?,
                other => other.clone(),
            };
            if self.config.is_raw(name) {
                new.insert(name.clone(), value);
            } else {
                namespace.insert(name.clone(), value);
            }
        }

        new.insert(self.config.namespace.clone(), Value::Object(namespace));
        payload.insert(NEW.to_string(), Value::Object(new));

        let blob = EnvironmentBlob::new(
            self.config.encoding.clone(),
            Value::Object(payload).to_string(),
        );
        self.store.store(blob).await?;
        tracing::debug!(parent: &self.span, written = values.len(), "environment written");
        Ok(())
    }

    async fn fetch_payload(&self) -> Result<Map<String, Value>, EnvironmentError> {
        let blob = self.store.fetch().await?;
        if blob.encoding != self.config.encoding {
            tracing::warn!(parent: &self.span, encoding = %blob.encoding, "unsupported environment encoding");
            return Err(EnvironmentError::TransportUnsupported {
                encoding: blob.encoding,
            });
        }
        if blob.payload.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&blob.payload) {
            Ok(Value::Object(payload)) => Ok(payload),
            Ok(_) => Err(EnvironmentError::MalformedBlob(
                "payload is not an object".to_string(),
            )),
            Err(err) => Err(EnvironmentError::MalformedBlob(err.to_string())),
        }
    }
}

/// Remove `key` from `map`, requiring an object when present
///
/// Absent and `null` entries yield `None`.
fn take_object(
    map: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<Map<String, Value>>, EnvironmentError> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(object)) => Ok(Some(object)),
        Some(_) => Err(EnvironmentError::MalformedBlob(format!(
            "'{key}' is not an object"
        ))),
    }
}
