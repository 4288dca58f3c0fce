//! Check plan types

use crate::error::CheckFailure;
use serde::{Deserialize, Serialize};

/// What a check group stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKind {
    /// Component expanded into its datasources
    Component,
    /// Standalone datasource
    DataSource,
}

/// One datasource to check on the bus
///
/// `device` and `attribute` are empty when the datasource name itself is
/// the addressable device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasourceRef {
    /// Datasource name
    pub name: String,
    /// Device address
    pub device: String,
    /// Attribute or command on the device
    pub attribute: String,
}

impl DatasourceRef {
    /// Create reference
    pub fn new(
        name: impl Into<String>,
        device: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            device: device.into(),
            attribute: attribute.into(),
        }
    }

    /// Reference addressed by its own name
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, "", "")
    }

    /// Address to connect to
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        if self.device.is_empty() {
            &self.name
        } else {
            &self.device
        }
    }
}

/// Datasource references that must all pass for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckGroup {
    /// Component or datasource name
    pub name: String,
    /// Item kind
    pub kind: GroupKind,
    /// Position in the check plan
    pub index: usize,
    /// References checked in order
    pub refs: Vec<DatasourceRef>,
    /// Reference that failed first
    pub first_failed_ref: Option<DatasourceRef>,
    /// Failure recorded for the group
    pub failure: Option<CheckFailure>,
    /// False once the group failed
    pub active: bool,
}

impl CheckGroup {
    /// Create pending group
    pub fn new(name: impl Into<String>, kind: GroupKind, index: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            index,
            refs: Vec::new(),
            first_failed_ref: None,
            failure: None,
            active: true,
        }
    }

    /// Add reference
    #[must_use]
    pub fn with_ref(mut self, reference: DatasourceRef) -> Self {
        self.refs.push(reference);
        self
    }

    /// Record a failure and deactivate the group
    pub fn fail(&mut self, reference: Option<DatasourceRef>, failure: CheckFailure) {
        self.first_failed_ref = reference;
        self.failure = Some(failure);
        self.active = false;
    }

    /// Whether a failure was recorded
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Failure text
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        self.failure.as_ref().map(CheckFailure::message)
    }

    /// Error descriptor for a failed group
    #[must_use]
    pub fn descriptor(&self) -> Option<ErrorDescriptor> {
        let message = self.failure_message()?;
        let failed = self.first_failed_ref.as_ref().map(|r| r.name.clone());
        Some(match self.kind {
            GroupKind::Component => ErrorDescriptor {
                component: Some(self.name.clone()),
                datasource: failed,
                message,
            },
            GroupKind::DataSource => ErrorDescriptor {
                component: None,
                datasource: Some(self.name.clone()),
                message,
            },
        })
    }
}

/// Structured validation error handed back to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Failed component
    pub component: Option<String>,
    /// Failed datasource
    pub datasource: Option<String>,
    /// Failure text
    pub message: String,
}

/// Statistics of one validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    /// Groups handed to workers
    pub groups_checked: usize,
    /// Groups failed without a device call
    pub synthetic_failures: usize,
    /// Groups failed in total
    pub groups_failed: usize,
    /// Workers started
    pub workers_spawned: usize,
}
