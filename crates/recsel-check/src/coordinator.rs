//! Validation coordinator
//!
//! Turns the component and datasource group maps of a selection into a
//! check plan, runs the plan on the worker pool and folds the results back
//! into the maps:
//! - names missing from the directory fail without a device call
//! - components expand to their datasources; client datasources must name
//!   a channel known on the bus
//! - after the join barrier failed names become `null`, the other active
//!   names `true`; inactive (`false`) names are left alone

use crate::config::CheckConfig;
use crate::device::DeviceBus;
use crate::error::{CheckError, CheckFailure};
use crate::remote::{Binding, ChannelInfo, ChannelRegistry, DataSourceKind, RemoteDirectory};
use crate::types::{CheckGroup, CheckReport, DatasourceRef, ErrorDescriptor, GroupKind};
use crate::worker;
use indexmap::IndexSet;
use recsel_selection::{fields, is_active, GroupMap, SelectionRecord};
use serde_json::Value;
use std::sync::Arc;
use tracing::Span;

/// Result of one validation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Updated component group map
    pub components: GroupMap,
    /// Updated datasource group map
    pub datasources: GroupMap,
    /// Run statistics
    pub report: CheckReport,
}

impl ValidationOutcome {
    /// Component map as JSON text
    #[must_use]
    pub fn components_json(&self) -> String {
        group_json(&self.components)
    }

    /// Datasource map as JSON text
    #[must_use]
    pub fn datasources_json(&self) -> String {
        group_json(&self.datasources)
    }
}

fn group_json(map: &GroupMap) -> String {
    let object: serde_json::Map<String, Value> = map
        .iter()
        .map(|(name, state)| (name.clone(), state.map_or(Value::Null, Value::Bool)))
        .collect();
    Value::Object(object).to_string()
}

/// How a datasource dependency is checked
enum Dependency {
    Check(DatasourceRef),
    UnresolvedChannel,
    Skip,
}

fn classify(name: &str, binding: Option<&Binding>, channels: &[ChannelInfo]) -> Dependency {
    let Some(binding) = binding else {
        return Dependency::Check(DatasourceRef::bare(name));
    };
    match &binding.kind {
        DataSourceKind::Device => match binding.device_address() {
            Some((device, attribute)) => {
                Dependency::Check(DatasourceRef::new(name, device, attribute))
            }
            None if binding.record.trim().is_empty() => {
                Dependency::Check(DatasourceRef::bare(name))
            }
            None => Dependency::Check(DatasourceRef::new(name, binding.record.trim(), "")),
        },
        DataSourceKind::Client => {
            match channels.iter().find(|channel| channel.matches(&binding.record)) {
                Some(channel) => {
                    let (device, attribute) = channel.address();
                    Dependency::Check(DatasourceRef::new(name, device, attribute))
                }
                None => Dependency::UnresolvedChannel,
            }
        }
        DataSourceKind::Other(_) => Dependency::Skip,
    }
}

/// Fill `group` from `(datasource, binding)` pairs
///
/// An unresolved channel fails the group on the spot.
fn populate<'a, I>(group: &mut CheckGroup, entries: I, channels: &[ChannelInfo])
where
    I: IntoIterator<Item = (&'a String, Option<&'a Binding>)>,
{
    for (name, binding) in entries {
        match classify(name, binding, channels) {
            Dependency::Check(reference) => group.refs.push(reference),
            Dependency::UnresolvedChannel => {
                group.fail(Some(DatasourceRef::bare(name.as_str())), CheckFailure::UnresolvedChannel);
                return;
            }
            Dependency::Skip => {}
        }
    }
}

/// Drives a validation run over the remote services
#[derive(Clone)]
pub struct ValidationCoordinator {
    directory: Arc<dyn RemoteDirectory>,
    registry: Arc<dyn ChannelRegistry>,
    bus: Arc<dyn DeviceBus>,
    config: Arc<CheckConfig>,
    span: Span,
}

impl std::fmt::Debug for ValidationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ValidationCoordinator {
    /// Create coordinator with default configuration
    pub fn new(
        directory: Arc<dyn RemoteDirectory>,
        registry: Arc<dyn ChannelRegistry>,
        bus: Arc<dyn DeviceBus>,
    ) -> Self {
        Self {
            directory,
            registry,
            bus,
            config: Arc::new(CheckConfig::default()),
            span: Span::none(),
        }
    }

    /// With worker pool configuration
    #[must_use]
    pub fn with_config(mut self, config: CheckConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Report events under `span`
    #[inline]
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Worker pool configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Validate the active names of both group maps
    ///
    /// One descriptor per failed group is appended to `errors`, in plan
    /// order: components first, then standalone datasources.
    ///
    /// # Errors
    /// - `RegistryUnavailable` if the channel list cannot be fetched
    /// - `DirectoryUnavailable` if a directory query fails
    /// - `WorkerFailed` if a worker task panicked
    pub async fn validate(
        &self,
        components: &GroupMap,
        datasources: &GroupMap,
        errors: &mut Vec<ErrorDescriptor>,
    ) -> Result<ValidationOutcome, CheckError> {
        let plan = self.plan(components, datasources).await?;

        let (pending, mut finished): (Vec<_>, Vec<_>) =
            plan.into_iter().partition(|group| group.active);
        let synthetic_failures = finished.len();
        let groups_checked = pending.len();
        let workers = self.config.worker_count(groups_checked);

        tracing::info!(
            parent: &self.span,
            groups = groups_checked,
            synthetic = synthetic_failures,
            workers,
            "checking selection"
        );

        let checked = worker::run_pool(
            pending,
            workers,
            Arc::clone(&self.bus),
            Arc::clone(&self.config),
            &self.span,
        )
        .await?;
        finished.extend(checked);
        finished.sort_by_key(|group| group.index);

        let mut failed_components = IndexSet::new();
        let mut failed_datasources = IndexSet::new();
        for group in &finished {
            let Some(descriptor) = group.descriptor() else {
                continue;
            };
            tracing::warn!(parent: &self.span, name = %group.name, message = %descriptor.message, "check failed");
            match group.kind {
                GroupKind::Component => failed_components.insert(group.name.clone()),
                GroupKind::DataSource => failed_datasources.insert(group.name.clone()),
            };
            errors.push(descriptor);
        }

        let report = CheckReport {
            groups_checked,
            synthetic_failures,
            groups_failed: failed_components.len() + failed_datasources.len(),
            workers_spawned: workers,
        };
        tracing::info!(parent: &self.span, failed = report.groups_failed, "selection checked");

        Ok(ValidationOutcome {
            components: aggregate(components, &failed_components),
            datasources: aggregate(datasources, &failed_datasources),
            report,
        })
    }

    /// Validate the preselection maps of `record` in place
    ///
    /// # Errors
    /// As [`ValidationCoordinator::validate`], plus `Selection` if a
    /// preselection field cannot be decoded
    pub async fn validate_record(
        &self,
        record: &mut SelectionRecord,
        errors: &mut Vec<ErrorDescriptor>,
    ) -> Result<CheckReport, CheckError> {
        let components = record.group_map(fields::COMPONENT_PRESELECTION)?;
        let datasources = record.group_map(fields::DATASOURCE_PRESELECTION)?;

        let outcome = self.validate(&components, &datasources, errors).await?;

        record.set(
            fields::COMPONENT_PRESELECTION,
            Value::String(outcome.components_json()),
        );
        record.set(
            fields::DATASOURCE_PRESELECTION,
            Value::String(outcome.datasources_json()),
        );
        Ok(outcome.report)
    }

    async fn plan(
        &self,
        components: &GroupMap,
        datasources: &GroupMap,
    ) -> Result<Vec<CheckGroup>, CheckError> {
        let channels = self
            .registry
            .known_channels()
            .await
            .map_err(CheckError::RegistryUnavailable)?;
        let available_components: IndexSet<String> = self
            .directory
            .available_components()
            .await
            .map_err(CheckError::DirectoryUnavailable)?
            .into_iter()
            .collect();
        let available_datasources: IndexSet<String> = self
            .directory
            .available_datasources()
            .await
            .map_err(CheckError::DirectoryUnavailable)?
            .into_iter()
            .collect();

        let mut groups = Vec::new();

        for name in active(components) {
            let mut group = CheckGroup::new(name.as_str(), GroupKind::Component, groups.len());
            if !available_components.contains(name) {
                group.fail(None, CheckFailure::NotAvailable(GroupKind::Component));
                groups.push(group);
                continue;
            }
            let entries = self
                .directory
                .expand_component(name)
                .await
                .map_err(CheckError::DirectoryUnavailable)?;
            if entries.is_empty() {
                continue;
            }
            populate(
                &mut group,
                entries.iter().map(|(ds, binding)| (ds, binding.as_ref())),
                &channels,
            );
            groups.push(group);
        }

        let (known, missing): (Vec<&String>, Vec<&String>) = active(datasources)
            .partition(|name| available_datasources.contains(name.as_str()));
        let names: Vec<String> = known.iter().map(|name| (*name).clone()).collect();
        let bindings = if names.is_empty() {
            Default::default()
        } else {
            self.directory
                .describe_datasources(&names)
                .await
                .map_err(CheckError::DirectoryUnavailable)?
        };
        for name in known {
            let mut group = CheckGroup::new(name.as_str(), GroupKind::DataSource, groups.len());
            populate(&mut group, [(name, bindings.get(name))], &channels);
            groups.push(group);
        }
        for name in missing {
            let mut group = CheckGroup::new(name.as_str(), GroupKind::DataSource, groups.len());
            group.fail(None, CheckFailure::NotAvailable(GroupKind::DataSource));
            groups.push(group);
        }

        tracing::debug!(parent: &self.span, groups = groups.len(), channels = channels.len(), "check plan built");
        Ok(groups)
    }
}

fn active(map: &GroupMap) -> impl Iterator<Item = &String> {
    map.iter()
        .filter(|(_, state)| is_active(**state))
        .map(|(name, _)| name)
}

fn aggregate(map: &GroupMap, failed: &IndexSet<String>) -> GroupMap {
    map.iter()
        .map(|(name, state)| {
            let state = match *state {
                Some(false) => Some(false),
                _ if failed.contains(name) => None,
                _ => Some(true),
            };
            (name.clone(), state)
        })
        .collect()
}
