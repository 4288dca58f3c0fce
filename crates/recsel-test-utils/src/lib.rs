//! Testing utilities for RECSEL workspace
//!
//! In-memory doubles for the remote services plus selection fixtures.
//! `MockBus` counts connections and tracks how many devices are held at
//! once, so tests can assert on call patterns and concurrency.

#![allow(missing_docs)]

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use recsel_check::{
    Binding, ChannelInfo, ChannelRegistry, DeviceBus, DeviceHandle, DeviceState, EnvironmentBlob,
    EnvironmentStore, RemoteDirectory, RemoteError,
};
use recsel_selection::{fields, GroupMap, SelectionRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Install a test-writer subscriber; repeated calls are no-ops
pub fn setup_test_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

pub fn group_map(entries: &[(&str, Option<bool>)]) -> GroupMap {
    entries
        .iter()
        .map(|(name, state)| ((*name).to_string(), *state))
        .collect()
}

/// Current-schema record with both preselection maps set
pub fn preselected_record(
    components: &[(&str, Option<bool>)],
    datasources: &[(&str, Option<bool>)],
) -> SelectionRecord {
    let mut record = SelectionRecord::new();
    record.set_group_map(fields::COMPONENT_PRESELECTION, &group_map(components));
    record.set_group_map(fields::DATASOURCE_PRESELECTION, &group_map(datasources));
    record
}

// ---------------------------------------------------------------------------
// Directory and registry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MockDirectory {
    components: IndexMap<String, IndexMap<String, Option<Binding>>>,
    datasources: IndexMap<String, Option<Binding>>,
    unavailable: bool,
    expansions: AtomicUsize,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_component(mut self, name: &str, entries: &[(&str, Option<Binding>)]) -> Self {
        let entries = entries
            .iter()
            .map(|(ds, binding)| ((*ds).to_string(), binding.clone()))
            .collect();
        self.components.insert(name.to_string(), entries);
        self
    }

    #[must_use]
    pub fn with_datasource(mut self, name: &str, binding: Option<Binding>) -> Self {
        self.datasources.insert(name.to_string(), binding);
        self
    }

    /// Every query fails
    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn expansion_count(&self) -> usize {
        self.expansions.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.unavailable {
            Err(RemoteError::new("directory server not responding"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteDirectory for MockDirectory {
    async fn available_components(&self) -> Result<Vec<String>, RemoteError> {
        self.check()?;
        Ok(self.components.keys().cloned().collect())
    }

    async fn available_datasources(&self) -> Result<Vec<String>, RemoteError> {
        self.check()?;
        Ok(self.datasources.keys().cloned().collect())
    }

    async fn expand_component(
        &self,
        name: &str,
    ) -> Result<IndexMap<String, Option<Binding>>, RemoteError> {
        self.check()?;
        self.expansions.fetch_add(1, Ordering::SeqCst);
        self.components
            .get(name)
            .cloned()
            .ok_or_else(|| RemoteError::new(format!("no component {name}")))
    }

    async fn describe_datasources(
        &self,
        names: &[String],
    ) -> Result<IndexMap<String, Binding>, RemoteError> {
        self.check()?;
        Ok(names
            .iter()
            .filter_map(|name| {
                let binding = self.datasources.get(name)?.clone()?;
                Some((name.clone(), binding))
            })
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MockRegistry {
    channels: Vec<ChannelInfo>,
    unavailable: bool,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_channel(mut self, name: &str, full_name: &str, source: &str) -> Self {
        self.channels.push(ChannelInfo::new(name, full_name, source));
        self
    }

    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }
}

#[async_trait]
impl ChannelRegistry for MockRegistry {
    async fn known_channels(&self) -> Result<Vec<ChannelInfo>, RemoteError> {
        if self.unavailable {
            return Err(RemoteError::new("pool not exported"));
        }
        Ok(self.channels.clone())
    }
}

// ---------------------------------------------------------------------------
// Device bus
// ---------------------------------------------------------------------------

/// Scripted device behaviour
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub state: DeviceState,
    pub attributes: IndexMap<String, Value>,
    pub commands: HashMap<String, Value>,
    pub ping_error: Option<String>,
    pub delay: Duration,
}

impl MockDevice {
    /// `ON` device with a non-empty `Value` attribute
    pub fn healthy() -> Self {
        Self {
            state: DeviceState::On,
            attributes: IndexMap::from([("Value".to_string(), Value::from(1.0))]),
            commands: HashMap::new(),
            ping_error: None,
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_command(mut self, name: &str, result: Value) -> Self {
        self.commands.insert(name.to_string(), result);
        self
    }

    #[must_use]
    pub fn with_ping_error(mut self, message: &str) -> Self {
        self.ping_error = Some(message.to_string());
        self
    }

    /// Hold the connection for `delay` while waiting for readiness
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Default)]
struct Occupancy {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Occupancy {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct MockBus {
    devices: HashMap<String, MockDevice>,
    connects: Mutex<Vec<String>>,
    occupancy: Arc<Occupancy>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_device(mut self, address: &str, device: MockDevice) -> Self {
        self.devices.insert(address.to_string(), device);
        self
    }

    /// Addresses passed to `connect`, in call order
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().len()
    }

    /// Most handles alive at the same time
    pub fn peak_connections(&self) -> usize {
        self.occupancy.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceBus for MockBus {
    async fn connect(&self, address: &str) -> Result<Box<dyn DeviceHandle>, RemoteError> {
        self.connects.lock().push(address.to_string());
        let device = self
            .devices
            .get(address)
            .cloned()
            .ok_or_else(|| RemoteError::new(format!("device {address} not exported")))?;
        self.occupancy.enter();
        Ok(Box::new(MockHandle {
            device,
            occupancy: Arc::clone(&self.occupancy),
        }))
    }
}

struct MockHandle {
    device: MockDevice,
    occupancy: Arc<Occupancy>,
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.occupancy.leave();
    }
}

#[async_trait]
impl DeviceHandle for MockHandle {
    async fn set_live_read_mode(&self) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn wait_ready(&self, _timeout: Option<Duration>) -> Result<(), RemoteError> {
        if !self.device.delay.is_zero() {
            tokio::time::sleep(self.device.delay).await;
        }
        Ok(())
    }

    async fn state(&self) -> Result<DeviceState, RemoteError> {
        Ok(self.device.state)
    }

    async fn ping(&self) -> Result<Duration, RemoteError> {
        match &self.device.ping_error {
            Some(message) => Err(RemoteError::new(message.clone())),
            None => Ok(Duration::from_micros(100)),
        }
    }

    async fn attribute_names(&self) -> Result<Vec<String>, RemoteError> {
        Ok(self.device.attributes.keys().cloned().collect())
    }

    async fn read_attribute(&self, name: &str) -> Result<Value, RemoteError> {
        self.device
            .attributes
            .get(name)
            .cloned()
            .ok_or_else(|| RemoteError::new(format!("attribute {name} not found")))
    }

    async fn invoke(&self, command: &str) -> Result<Value, RemoteError> {
        self.device
            .commands
            .get(command)
            .cloned()
            .ok_or_else(|| RemoteError::new(format!("command {command} not found")))
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MemoryEnvironmentStore {
    blob: Mutex<EnvironmentBlob>,
    stores: AtomicUsize,
}

impl MemoryEnvironmentStore {
    pub fn new(blob: EnvironmentBlob) -> Self {
        Self {
            blob: Mutex::new(blob),
            stores: AtomicUsize::new(0),
        }
    }

    /// JSON-encoded store holding `payload`
    pub fn json(payload: &Value) -> Self {
        Self::new(EnvironmentBlob::new("json", payload.to_string()))
    }

    pub fn blob(&self) -> EnvironmentBlob {
        self.blob.lock().clone()
    }

    pub fn payload(&self) -> Value {
        serde_json::from_str(&self.blob.lock().payload).unwrap()
    }

    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnvironmentStore for MemoryEnvironmentStore {
    async fn fetch(&self) -> Result<EnvironmentBlob, RemoteError> {
        Ok(self.blob.lock().clone())
    }

    async fn store(&self, blob: EnvironmentBlob) -> Result<(), RemoteError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        *self.blob.lock() = blob;
        Ok(())
    }
}
