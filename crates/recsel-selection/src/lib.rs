//! RECSEL Selection - acquisition selection records
//!
//! A selection record is a flat, ordered map of named fields holding the
//! desired state of an acquisition session:
//! - component and datasource membership as tri-state group maps
//! - ordered name lists (channel order, unplotted components, ...)
//! - scalar configuration (timer, device bindings, flags)
//!
//! # Example
//!
//! ```rust
//! use recsel_selection::{fields, SelectionRecord};
//!
//! let mut record = SelectionRecord::new();
//! record.reset_preselected_components(["slit1", "mirror"]);
//! record.reset_mntgrp();
//!
//! assert_eq!(record.text(fields::MNTGRP), Some("nxsmntgrp"));
//! assert_eq!(record.active_names(fields::COMPONENT_PRESELECTION).unwrap().len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod fields;
pub mod group;
mod record;

pub use error::SelectionError;
pub use fields::SelectionDefaults;
pub use group::{is_active, GroupMap};
pub use record::{JsonObject, SelectionRecord};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
