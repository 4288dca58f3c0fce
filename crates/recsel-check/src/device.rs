//! Instrument-control bus interface
//!
//! Workers reach devices through [`DeviceBus`], which hands out one
//! [`DeviceHandle`] per connection. Implementations wrap the real bus
//! client; tests use in-memory doubles.

use crate::error::RemoteError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Device state as reported by the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    /// Switched on
    On,
    /// Switched off
    Off,
    /// Closed
    Close,
    /// Open
    Open,
    /// Inserted
    Insert,
    /// Extracted
    Extract,
    /// Moving
    Moving,
    /// Standing by
    Standby,
    /// Fault condition
    Fault,
    /// Initialising
    Init,
    /// Running
    Running,
    /// Alarm condition
    Alarm,
    /// Disabled
    Disable,
    /// Unknown
    Unknown,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::On => "ON",
            Self::Off => "OFF",
            Self::Close => "CLOSE",
            Self::Open => "OPEN",
            Self::Insert => "INSERT",
            Self::Extract => "EXTRACT",
            Self::Moving => "MOVING",
            Self::Standby => "STANDBY",
            Self::Fault => "FAULT",
            Self::Init => "INIT",
            Self::Running => "RUNNING",
            Self::Alarm => "ALARM",
            Self::Disable => "DISABLE",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(text)
    }
}

/// Connection factory for bus devices
#[async_trait]
pub trait DeviceBus: Send + Sync {
    /// Open a handle to the device at `address`
    async fn connect(&self, address: &str) -> Result<Box<dyn DeviceHandle>, RemoteError>;
}

/// Connected device
#[async_trait]
pub trait DeviceHandle: Send + Sync {
    /// Switch to uncached reads
    async fn set_live_read_mode(&self) -> Result<(), RemoteError>;

    /// Wait until the device accepts requests; `None` uses the transport default
    async fn wait_ready(&self, timeout: Option<Duration>) -> Result<(), RemoteError>;

    /// Current state
    async fn state(&self) -> Result<DeviceState, RemoteError>;

    /// Round-trip liveness check
    async fn ping(&self) -> Result<Duration, RemoteError>;

    /// Names of the device attributes
    async fn attribute_names(&self) -> Result<Vec<String>, RemoteError>;

    /// Read one attribute
    async fn read_attribute(&self, name: &str) -> Result<Value, RemoteError>;

    /// Run a command without arguments
    async fn invoke(&self, command: &str) -> Result<Value, RemoteError>;
}

/// Whether a read or command result counts as empty
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_values() {
        for value in [json!(null), json!(""), json!([]), json!({})] {
            assert!(is_empty_value(&value), "{value} should be empty");
        }
        for value in [json!(0), json!(false), json!("x"), json!([0.0])] {
            assert!(!is_empty_value(&value), "{value} should not be empty");
        }
    }

    #[test]
    fn state_display() {
        assert_eq!(DeviceState::Fault.to_string(), "FAULT");
        assert_eq!(DeviceState::Alarm.to_string(), "ALARM");
    }
}
