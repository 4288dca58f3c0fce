//! RECSEL Check - concurrent validation of selections
//!
//! Validates that the components and datasources a selection names can
//! actually be read on the instrument-control bus:
//! - [`ValidationCoordinator`]: builds the check plan from the remote
//!   directory, runs it and writes tri-state results back
//! - [`worker`]: the pool of stateless check workers
//! - [`EnvironmentBridge`]: session variables in the remote environment blob
//!
//! Remote services are reached through the traits in [`remote`],
//! [`device`] and [`environment`]; nothing here talks to a network itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use recsel_check::{CheckConfig, ValidationCoordinator};
//!
//! let coordinator = ValidationCoordinator::new(directory, registry, bus)
//!     .with_config(CheckConfig::new().with_workers(4));
//!
//! let mut errors = Vec::new();
//! let report = coordinator.validate_record(&mut record, &mut errors).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
mod coordinator;
pub mod device;
pub mod environment;
pub mod error;
pub mod remote;
pub mod types;
pub mod worker;

pub use config::{CheckConfig, EngineConfig, EnvironmentConfig};
pub use coordinator::{ValidationCoordinator, ValidationOutcome};
pub use device::{DeviceBus, DeviceHandle, DeviceState};
pub use environment::{EnvironmentBlob, EnvironmentBridge, EnvironmentStore};
pub use error::{CheckError, CheckFailure, ConfigError, EnvironmentError, RemoteError};
pub use remote::{Binding, ChannelInfo, ChannelRegistry, DataSourceKind, RemoteDirectory};
pub use types::{CheckGroup, CheckReport, DatasourceRef, ErrorDescriptor, GroupKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
