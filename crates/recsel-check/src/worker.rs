//! Check workers
//!
//! A fixed set of tokio tasks drains a shared queue of [`CheckGroup`]s.
//! Each worker pops until the queue reports empty, checks the group's
//! references in order and stops the group at its first failure. Groups
//! travel back to the coordinator through the join handles, so nothing is
//! shared between workers except the queue.

use crate::config::CheckConfig;
use crate::device::{is_empty_value, DeviceBus, DeviceHandle, DeviceState};
use crate::error::{CheckError, CheckFailure, RemoteError};
use crate::types::{CheckGroup, DatasourceRef};
use crossbeam::queue::SegQueue;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Span;

/// Check one datasource reference
///
/// # Errors
/// Returns the first failure met, in check order: connection, readiness,
/// FAULT state, ping, attribute, ALARM state.
pub async fn check_ref(
    bus: &dyn DeviceBus,
    reference: &DatasourceRef,
    config: &CheckConfig,
) -> Result<(), CheckFailure> {
    let device = bus
        .connect(reference.address())
        .await
        .map_err(|err| CheckFailure::Unreachable(err.message))?;

    device.set_live_read_mode().await.map_err(transport)?;
    device
        .wait_ready(config.wait_timeout())
        .await
        .map_err(transport)?;

    if device.state().await.map_err(transport)? == DeviceState::Fault {
        return Err(CheckFailure::Fault);
    }

    device.ping().await.map_err(transport)?;

    check_attribute(device.as_ref(), &reference.attribute, config).await?;

    if device.state().await.map_err(transport)? == DeviceState::Alarm {
        return Err(CheckFailure::Alarm);
    }
    Ok(())
}

async fn check_attribute(
    device: &dyn DeviceHandle,
    attribute: &str,
    config: &CheckConfig,
) -> Result<(), CheckFailure> {
    if attribute.is_empty() {
        let names = device.attribute_names().await.map_err(transport)?;
        let candidate = config.attribute_candidates.iter().find_map(|candidate| {
            names
                .iter()
                .find(|name| name.eq_ignore_ascii_case(candidate))
        });
        return match candidate {
            Some(name) => read_non_empty(device, name).await,
            None => Ok(()),
        };
    }

    if !config.skip_prefix.is_empty() && attribute.starts_with(&config.skip_prefix) {
        return Ok(());
    }

    if let Some(command) = attribute
        .strip_suffix(config.command_suffix.as_str())
        .filter(|_| !config.command_suffix.is_empty())
    {
        return match device.invoke(command).await {
            Ok(value) if !is_empty_value(&value) => Ok(()),
            _ => Err(CheckFailure::EmptyAttribute),
        };
    }

    read_non_empty(device, attribute).await
}

async fn read_non_empty(device: &dyn DeviceHandle, name: &str) -> Result<(), CheckFailure> {
    match device.read_attribute(name).await {
        Ok(value) if !is_empty_value(&value) => Ok(()),
        _ => Err(CheckFailure::EmptyAttribute),
    }
}

fn transport(err: RemoteError) -> CheckFailure {
    CheckFailure::Transport(err.message)
}

/// Check every reference of `group`, stopping at the first failure
///
/// Groups that already failed are left as they are.
pub async fn check_group(group: &mut CheckGroup, bus: &dyn DeviceBus, config: &CheckConfig) {
    if !group.active {
        return;
    }
    let mut failed = None;
    for reference in &group.refs {
        if let Err(failure) = check_ref(bus, reference, config).await {
            failed = Some((reference.clone(), failure));
            break;
        }
    }
    if let Some((reference, failure)) = failed {
        group.fail(Some(reference), failure);
    }
}

/// Check `groups` with `workers` concurrent tasks
///
/// Returns the groups in completion order once every worker has finished.
///
/// # Errors
/// Returns `CheckError::WorkerFailed` if a worker task panicked
pub async fn run_pool(
    groups: Vec<CheckGroup>,
    workers: usize,
    bus: Arc<dyn DeviceBus>,
    config: Arc<CheckConfig>,
    span: &Span,
) -> Result<Vec<CheckGroup>, CheckError> {
    let total = groups.len();
    let queue = Arc::new(SegQueue::new());
    for group in groups {
        queue.push(group);
    }

    let mut tasks = JoinSet::new();
    for worker in 0..workers {
        let queue = Arc::clone(&queue);
        let bus = Arc::clone(&bus);
        let config = Arc::clone(&config);
        let span = span.clone();
        tasks.spawn(async move {
            let mut done = Vec::new();
            while let Some(mut group) = queue.pop() {
                check_group(&mut group, bus.as_ref(), &config).await;
                if let Some(message) = group.failure_message() {
                    tracing::debug!(parent: &span, worker, group = %group.name, %message, "group failed");
                }
                done.push(group);
            }
            done
        });
    }

    let mut checked = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(done) => checked.extend(done),
            Err(err) => return Err(CheckError::WorkerFailed(err.to_string())),
        }
    }
    Ok(checked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroupKind;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone)]
    struct FakeDevice {
        states: Vec<DeviceState>,
        reads: Arc<AtomicUsize>,
        attributes: HashMap<String, Value>,
        ping_fails: bool,
    }

    impl FakeDevice {
        fn healthy() -> Self {
            Self {
                states: vec![DeviceState::On],
                reads: Arc::new(AtomicUsize::new(0)),
                attributes: HashMap::from([("Value".to_string(), json!(1.5))]),
                ping_fails: false,
            }
        }
    }

    #[async_trait]
    impl DeviceHandle for FakeDevice {
        async fn set_live_read_mode(&self) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn wait_ready(&self, _timeout: Option<Duration>) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn state(&self) -> Result<DeviceState, RemoteError> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.states[n.min(self.states.len() - 1)])
        }

        async fn ping(&self) -> Result<Duration, RemoteError> {
            if self.ping_fails {
                Err(RemoteError::new("ping timeout"))
            } else {
                Ok(Duration::from_micros(80))
            }
        }

        async fn attribute_names(&self) -> Result<Vec<String>, RemoteError> {
            Ok(self.attributes.keys().cloned().collect())
        }

        async fn read_attribute(&self, name: &str) -> Result<Value, RemoteError> {
            self.attributes
                .get(name)
                .cloned()
                .ok_or_else(|| RemoteError::new(format!("no attribute {name}")))
        }

        async fn invoke(&self, command: &str) -> Result<Value, RemoteError> {
            match command {
                "Status" => Ok(json!("running")),
                _ => Ok(Value::Null),
            }
        }
    }

    struct FakeBus {
        devices: HashMap<String, FakeDevice>,
        connects: AtomicUsize,
    }

    impl FakeBus {
        fn with(address: &str, device: FakeDevice) -> Self {
            Self {
                devices: HashMap::from([(address.to_string(), device)]),
                connects: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DeviceBus for FakeBus {
        async fn connect(&self, address: &str) -> Result<Box<dyn DeviceHandle>, RemoteError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.devices
                .get(address)
                .cloned()
                .map(|device| Box::new(device) as Box<dyn DeviceHandle>)
                .ok_or_else(|| RemoteError::new(format!("device {address} not exported")))
        }
    }

    async fn check(device: FakeDevice, attribute: &str) -> Result<(), CheckFailure> {
        let bus = FakeBus::with("dev/a/1", device);
        check_ref(&bus, &DatasourceRef::new("ds", "dev/a/1", attribute), &CheckConfig::new()).await
    }

    #[tokio::test]
    async fn healthy_device_passes() {
        assert_eq!(check(FakeDevice::healthy(), "Value").await, Ok(()));
        assert_eq!(check(FakeDevice::healthy(), "").await, Ok(()));
    }

    #[tokio::test]
    async fn unknown_device_is_unreachable() {
        let bus = FakeBus::with("dev/a/1", FakeDevice::healthy());
        let result = check_ref(&bus, &DatasourceRef::bare("nope"), &CheckConfig::new()).await;
        assert_eq!(
            result,
            Err(CheckFailure::Unreachable("device nope not exported".into()))
        );
    }

    #[tokio::test]
    async fn fault_is_reported_before_attribute() {
        let mut device = FakeDevice::healthy();
        device.states = vec![DeviceState::Fault];
        device.attributes.clear();
        assert_eq!(check(device, "Value").await, Err(CheckFailure::Fault));
    }

    #[tokio::test]
    async fn alarm_is_reported_after_attribute() {
        let mut device = FakeDevice::healthy();
        device.states = vec![DeviceState::Alarm];
        assert_eq!(check(device.clone(), "Value").await, Err(CheckFailure::Alarm));

        device.reads.store(0, Ordering::SeqCst);
        assert_eq!(check(device, "Missing").await, Err(CheckFailure::EmptyAttribute));
    }

    #[tokio::test]
    async fn ping_failure_uses_transport_text() {
        let mut device = FakeDevice::healthy();
        device.ping_fails = true;
        assert_eq!(
            check(device, "Value").await,
            Err(CheckFailure::Transport("ping timeout".into()))
        );
    }

    #[tokio::test]
    async fn attribute_forms() {
        let mut device = FakeDevice::healthy();
        device.attributes.insert("Empty".into(), json!([]));

        assert_eq!(check(device.clone(), "@Anything").await, Ok(()));
        assert_eq!(check(device.clone(), "Status()").await, Ok(()));
        assert_eq!(check(device.clone(), "Init()").await, Err(CheckFailure::EmptyAttribute));
        assert_eq!(check(device, "Empty").await, Err(CheckFailure::EmptyAttribute));
    }

    #[tokio::test]
    async fn first_existing_candidate_decides() {
        let mut device = FakeDevice::healthy();
        device.attributes = HashMap::from([
            ("position".to_string(), json!("")),
            ("Counts".to_string(), json!(12)),
        ]);
        // "Position" precedes "Counts" in the candidate list
        let bus = FakeBus::with("dev/a/1", device.clone());
        let config = CheckConfig::new();
        let reference = DatasourceRef::new("ds", "dev/a/1", "");
        assert_eq!(
            check_ref(&bus, &reference, &config).await,
            Err(CheckFailure::EmptyAttribute)
        );

        device.attributes = HashMap::from([("Status".to_string(), json!("ok"))]);
        assert_eq!(check(device, "").await, Ok(()));
    }

    #[tokio::test]
    async fn group_stops_at_first_failure() {
        let bus = FakeBus::with("dev/a/1", FakeDevice::healthy());
        let mut group = CheckGroup::new("comp", GroupKind::Component, 0)
            .with_ref(DatasourceRef::new("ok", "dev/a/1", "Value"))
            .with_ref(DatasourceRef::bare("missing"))
            .with_ref(DatasourceRef::bare("never"));

        check_group(&mut group, &bus, &CheckConfig::new()).await;

        assert!(!group.active);
        assert_eq!(group.first_failed_ref.as_ref().map(|r| r.name.as_str()), Some("missing"));
        assert_eq!(bus.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_groups_are_skipped() {
        let bus = FakeBus::with("dev/a/1", FakeDevice::healthy());
        let mut group = CheckGroup::new("ds", GroupKind::DataSource, 0)
            .with_ref(DatasourceRef::bare("dev/a/1"));
        group.fail(None, CheckFailure::UnresolvedChannel);

        check_group(&mut group, &bus, &CheckConfig::new()).await;

        assert_eq!(bus.connects.load(Ordering::SeqCst), 0);
        assert_eq!(group.failure, Some(CheckFailure::UnresolvedChannel));
    }

    #[tokio::test]
    async fn pool_returns_every_group() {
        let bus: Arc<dyn DeviceBus> = Arc::new(FakeBus::with("dev/a/1", FakeDevice::healthy()));
        let groups: Vec<_> = (0..5)
            .map(|i| {
                CheckGroup::new(format!("g{i}"), GroupKind::DataSource, i)
                    .with_ref(DatasourceRef::new("ds", "dev/a/1", "Value"))
            })
            .collect();

        let mut checked = run_pool(groups, 2, bus, Arc::new(CheckConfig::new()), &Span::none())
            .await
            .unwrap();
        checked.sort_by_key(|group| group.index);

        assert_eq!(checked.len(), 5);
        assert!(checked.iter().all(|group| group.active));
    }
}
