//! Conversion steps between adjacent major versions
//!
//! Each step bridges version `n` and `n + 1`. Forward application renames
//! fields old-to-new and then reshapes the new fields; backward application
//! reshapes first and renames new-to-old afterwards, so both directions
//! only ever reshape fields under their current-schema names.

use crate::reshape;
use recsel_selection::{fields, JsonObject, SelectionError, SelectionRecord};
use serde_json::Value;

/// Transform applied to a record in one direction
pub type Transform = fn(&mut SelectionRecord) -> Result<(), SelectionError>;

/// One link of the conversion chain
#[derive(Debug, Clone, Copy)]
pub struct ConversionStep {
    /// Lower major version
    pub from: u32,
    /// Upper major version
    pub to: u32,
    /// Field renames, old name first
    pub renames: &'static [(&'static str, &'static str)],
    /// Reshaping applied after renaming when upgrading
    pub upgrade: Transform,
    /// Reshaping applied before renaming when downgrading
    pub downgrade: Transform,
}

impl ConversionStep {
    /// Upgrade `record` from `self.from` to `self.to`
    pub fn apply_up(&self, record: &mut SelectionRecord) -> Result<(), SelectionError> {
        for (old, new) in self.renames {
            record.rename(old, new);
        }
        (self.upgrade)(record)
    }

    /// Downgrade `record` from `self.to` to `self.from`
    pub fn apply_down(&self, record: &mut SelectionRecord) -> Result<(), SelectionError> {
        (self.downgrade)(record)?;
        for (old, new) in self.renames {
            record.rename(new, old);
        }
        Ok(())
    }

    /// Field names this step knows about, both vocabularies
    pub fn known_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.renames.iter().flat_map(|(old, new)| [*old, *new])
    }
}

/// Renames between schema 1 and schema 2
pub const RENAMES_1_2: &[(&str, &str)] = &[
    ("AutomaticComponentGroup", fields::COMPONENT_PRESELECTION),
    ("AutomaticDataSources", "PreselectedDataSources"),
    ("ComponentGroup", fields::COMPONENT_SELECTION),
    ("DataSourceGroup", fields::DATASOURCE_SELECTION),
    ("DataRecord", fields::USER_DATA),
    ("HiddenElements", fields::UNPLOTTED_COMPONENTS),
    ("DynamicLinks", fields::DEFAULT_DYNAMIC_LINKS),
    ("DynamicPath", fields::DEFAULT_DYNAMIC_PATH),
];

/// Renames between schema 2 and schema 3
pub const RENAMES_2_3: &[(&str, &str)] = &[
    ("PreselectedDataSources", fields::PRESELECTING_DATASOURCES),
    ("InitDataSources", fields::DATASOURCE_PRESELECTION),
];

/// Schema 2 flat channel property fields and their key in `ChannelProperties`
pub const CHANNEL_PROPERTY_FIELDS: &[(&str, &str)] = &[
    ("Labels", "label"),
    ("LabelPaths", "nexus_path"),
    ("LabelLinks", "link"),
    ("LabelTypes", "data_type"),
    ("LabelShapes", "shape"),
];

/// Fields that exist only from schema 3 on
pub const INTRODUCED_IN_3: &[&str] = &[fields::MNTGRP_CONFIGURATION];

fn upgrade_1_2(record: &mut SelectionRecord) -> Result<(), SelectionError> {
    reshape::field_bool_map_to_tri(record, fields::COMPONENT_PRESELECTION)
}

fn downgrade_2_1(record: &mut SelectionRecord) -> Result<(), SelectionError> {
    reshape::field_tri_to_bool_map(record, fields::COMPONENT_PRESELECTION)
}

fn upgrade_2_3(record: &mut SelectionRecord) -> Result<(), SelectionError> {
    reshape::field_list_to_tri(record, fields::DATASOURCE_PRESELECTION)?;
    merge_channel_properties(record)
}

fn downgrade_3_2(record: &mut SelectionRecord) -> Result<(), SelectionError> {
    for name in INTRODUCED_IN_3 {
        record.remove(name);
    }
    reshape::field_tri_to_list(record, fields::DATASOURCE_PRESELECTION)?;
    split_channel_properties(record)
}

/// Fold the flat schema 2 property fields into the `ChannelProperties` blob
///
/// Keys already present in the blob are kept, so properties carried through
/// a downgrade come back unchanged.
fn merge_channel_properties(record: &mut SelectionRecord) -> Result<(), SelectionError> {
    let mut properties = record.json_object(fields::CHANNEL_PROPERTIES)?;
    for (flat, key) in CHANNEL_PROPERTY_FIELDS {
        if !record.contains(flat) {
            continue;
        }
        let values: JsonObject = record.decode(flat)?.unwrap_or_default();
        record.remove(flat);
        properties.insert((*key).to_string(), Value::Object(values));
    }
    record.set_json_object(fields::CHANNEL_PROPERTIES, &properties);
    Ok(())
}

/// Split the `ChannelProperties` blob into the flat schema 2 fields
///
/// Unknown keys stay in a reduced `ChannelProperties` field; the field is
/// dropped once nothing is left in it.
fn split_channel_properties(record: &mut SelectionRecord) -> Result<(), SelectionError> {
    if !record.contains(fields::CHANNEL_PROPERTIES) {
        return Ok(());
    }
    let properties = record.json_object(fields::CHANNEL_PROPERTIES)?;
    let mut rest = JsonObject::new();
    for (key, values) in properties {
        match CHANNEL_PROPERTY_FIELDS.iter().find(|(_, k)| *k == key) {
            Some((flat, _)) => record.set(*flat, Value::String(values.to_string())),
            None => {
                rest.insert(key, values);
            }
        }
    }

    if rest.is_empty() {
        record.remove(fields::CHANNEL_PROPERTIES);
    } else {
        record.set_json_object(fields::CHANNEL_PROPERTIES, &rest);
    }
    Ok(())
}

/// The full chain, lowest version first
pub const CHAIN: &[ConversionStep] = &[
    ConversionStep {
        from: 1,
        to: 2,
        renames: RENAMES_1_2,
        upgrade: upgrade_1_2,
        downgrade: downgrade_2_1,
    },
    ConversionStep {
        from: 2,
        to: 3,
        renames: RENAMES_2_3,
        upgrade: upgrade_2_3,
        downgrade: downgrade_3_2,
    },
];
