//! Field vocabulary of the current selection schema
//!
//! Names follow the persisted document, which downstream consumers read
//! verbatim, so they keep their CamelCase spelling.

use serde::{Deserialize, Serialize};

/// Schema version field (`major.minor.patch`)
pub const VERSION: &str = "Version";

/// Selected components (group map)
pub const COMPONENT_SELECTION: &str = "ComponentSelection";
/// Components proposed by the preselection step (group map)
pub const COMPONENT_PRESELECTION: &str = "ComponentPreselection";
/// Selected datasources (group map)
pub const DATASOURCE_SELECTION: &str = "DataSourceSelection";
/// Datasources proposed by the preselection step (group map)
pub const DATASOURCE_PRESELECTION: &str = "DataSourcePreselection";

/// Datasources that drive preselection (list)
pub const PRESELECTING_DATASOURCES: &str = "PreselectingDataSources";
/// Channel order of the measurement group (list)
pub const ORDERED_CHANNELS: &str = "OrderedChannels";
/// Components hidden from online plots (list)
pub const UNPLOTTED_COMPONENTS: &str = "UnplottedComponents";
/// Components offered but not mandatory (list)
pub const OPTIONAL_COMPONENTS: &str = "OptionalComponents";
/// Timer channels, master first (list)
pub const TIMER: &str = "Timer";

/// Measurement group name
pub const MNTGRP: &str = "MntGrp";
/// Serialized measurement group configuration
pub const MNTGRP_CONFIGURATION: &str = "MntGrpConfiguration";
/// Component directory device
pub const CONFIG_DEVICE: &str = "ConfigDevice";
/// Data writer device
pub const WRITER_DEVICE: &str = "WriterDevice";
/// Macro door device
pub const DOOR: &str = "Door";
/// Time zone written into file metadata
pub const TIME_ZONE: &str = "TimeZone";

/// Free-form client data (object)
pub const USER_DATA: &str = "UserData";
/// Variables substituted into component descriptions (object)
pub const CONFIG_VARIABLES: &str = "ConfigVariables";
/// Per-channel display and storage properties (object of objects)
pub const CHANNEL_PROPERTIES: &str = "ChannelProperties";

/// Append scans to the previous entry
pub const APPEND_ENTRY: &str = "AppendEntry";
/// Take components from the measurement group
pub const COMPONENTS_FROM_MNTGRP: &str = "ComponentsFromMntGrp";
/// Create dynamic components for unbound channels
pub const DYNAMIC_COMPONENTS: &str = "DynamicComponents";
/// Link dynamic components into the default collection
pub const DEFAULT_DYNAMIC_LINKS: &str = "DefaultDynamicLinks";
/// Path template for dynamic components
pub const DEFAULT_DYNAMIC_PATH: &str = "DefaultDynamicPath";

/// All group map fields
pub const GROUP_FIELDS: [&str; 4] = [
    COMPONENT_SELECTION,
    COMPONENT_PRESELECTION,
    DATASOURCE_SELECTION,
    DATASOURCE_PRESELECTION,
];

/// All list fields
pub const LIST_FIELDS: [&str; 5] = [
    PRESELECTING_DATASOURCES,
    ORDERED_CHANNELS,
    UNPLOTTED_COMPONENTS,
    OPTIONAL_COMPONENTS,
    TIMER,
];

/// Default values applied by [`SelectionRecord::reset`](crate::SelectionRecord::reset)
/// and the `reset_*` helpers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionDefaults {
    /// Version stamped on a fresh record
    pub version: String,
    /// Measurement group used when none is configured
    pub mntgrp: String,
    /// Time zone used when none is configured
    pub timezone: String,
    /// Dynamic component path template
    pub dynamic_path: String,
}

impl SelectionDefaults {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With version
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// With default measurement group
    #[inline]
    #[must_use]
    pub fn with_mntgrp(mut self, mntgrp: impl Into<String>) -> Self {
        self.mntgrp = mntgrp.into();
        self
    }

    /// With default time zone
    #[inline]
    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }
}

impl Default for SelectionDefaults {
    fn default() -> Self {
        Self {
            version: "3.0.0".to_string(),
            mntgrp: "nxsmntgrp".to_string(),
            timezone: "Europe/Berlin".to_string(),
            dynamic_path:
                "/$var.entryname#'scan'$var.serialno:NXentry/NXinstrument/collection".to_string(),
        }
    }
}
