//! RECSEL Convert - selection schema migration
//!
//! Selection records have gone through incompatible major versions. This
//! crate migrates a record forward or backward along a fixed chain of
//! conversion steps, one step per adjacent pair of major versions:
//!
//! | step | renames | reshaping |
//! |------|---------|-----------|
//! | 1 ↔ 2 | group/list field names | `ComponentPreselection` plain map ↔ tri-state |
//! | 2 ↔ 3 | preselection names | `DataSourcePreselection` list ↔ tri-state, channel properties flat ↔ blob |
//!
//! # Example
//!
//! ```rust
//! use recsel_convert::VersionConverter;
//! use recsel_selection::{fields, SelectionRecord};
//!
//! let mut record = SelectionRecord::new();
//! VersionConverter::new("2.0.0").unwrap().convert(&mut record).unwrap();
//! assert_eq!(record.text(fields::VERSION), Some("2.0.0"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod converter;
pub mod error;
pub mod reshape;
pub mod steps;
mod version;

pub use converter::{VersionConverter, CURRENT_VERSION};
pub use error::ConvertError;
pub use steps::ConversionStep;
pub use version::SchemaVersion;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
