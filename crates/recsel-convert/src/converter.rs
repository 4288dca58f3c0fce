//! Version converter
//!
//! Walks the conversion chain from a record's current major version to the
//! configured target, upgrading or downgrading one step at a time.

use crate::error::ConvertError;
use crate::steps::{ConversionStep, CHAIN, CHANNEL_PROPERTY_FIELDS, INTRODUCED_IN_3};
use crate::version::SchemaVersion;
use recsel_selection::{fields, SelectionRecord};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::Span;

/// Schema version written by this release
pub const CURRENT_VERSION: &str = "3.0.0";

/// Migrates selection records between schema versions
#[derive(Debug, Clone)]
pub struct VersionConverter {
    /// Target version, as stamped into converted records
    target_text: String,
    /// Parsed target version
    target: SchemaVersion,
    /// Steps between adjacent major versions
    chain: &'static [ConversionStep],
    /// Span conversion events are reported under
    span: Span,
}

impl VersionConverter {
    /// Create converter targeting `target`
    ///
    /// # Errors
    /// Returns `InvalidVersion` for malformed text and `UnsupportedVersion`
    /// if the major version is outside the chain
    pub fn new(target: &str) -> Result<Self, ConvertError> {
        let parsed: SchemaVersion = target.parse()?;
        let converter = Self {
            target_text: target.trim().to_string(),
            target: parsed,
            chain: CHAIN,
            span: Span::none(),
        };
        converter.check_supported(parsed.major)?;
        Ok(converter)
    }

    /// Report conversion events under `span`
    #[inline]
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Target version
    #[inline]
    #[must_use]
    pub fn target(&self) -> SchemaVersion {
        self.target
    }

    /// Highest major version reachable through the chain
    #[inline]
    #[must_use]
    pub fn latest_major(&self) -> u32 {
        self.chain.last().map_or(1, |step| step.to)
    }

    /// Convert `record` to the target version
    ///
    /// Records without a `Version` field are treated as `1.0.0`. On success
    /// `Version` always holds the target version text.
    ///
    /// # Errors
    /// - `InvalidVersion` if the record's version is malformed
    /// - `UnsupportedVersion` if its major version is outside the chain
    /// - `Field` if a field touched by a step cannot be decoded
    ///
    /// The record is left unchanged on error.
    pub fn convert(&self, record: &mut SelectionRecord) -> Result<(), ConvertError> {
        let current = Self::record_version(record)?;
        self.check_supported(current.major)?;

        let (from, to) = (current.major, self.target.major);
        if from != to {
            let mut working = record.clone();
            if from < to {
                for step in &self.chain[(from - 1) as usize..(to - 1) as usize] {
                    tracing::debug!(parent: &self.span, from = step.from, to = step.to, "upgrading selection");
                    step.apply_up(&mut working)?;
                }
            } else {
                for step in self.chain[(to - 1) as usize..(from - 1) as usize].iter().rev() {
                    tracing::debug!(parent: &self.span, from = step.to, to = step.from, "downgrading selection");
                    step.apply_down(&mut working)?;
                }
            }
            *record = working;
            tracing::info!(parent: &self.span, from = %current, to = %self.target, "selection converted");
        }

        if record.text(fields::VERSION) != Some(self.target_text.as_str()) {
            record.set(fields::VERSION, Value::String(self.target_text.clone()));
        }
        Ok(())
    }

    /// Convert `record` to an ad-hoc target version
    ///
    /// # Errors
    /// See [`VersionConverter::new`] and [`VersionConverter::convert`]
    pub fn convert_to(record: &mut SelectionRecord, target: &str) -> Result<(), ConvertError> {
        Self::new(target)?.convert(record)
    }

    /// Every field name known to the upgrade chain plus the record's own
    ///
    /// Callers copying fields across a conversion use this to keep foreign
    /// fields alive.
    #[must_use]
    pub fn allkeys(&self, record: &SelectionRecord) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = self
            .chain
            .iter()
            .flat_map(ConversionStep::known_names)
            .chain(CHANNEL_PROPERTY_FIELDS.iter().map(|(flat, _)| *flat))
            .chain([fields::CHANNEL_PROPERTIES])
            .chain(INTRODUCED_IN_3.iter().copied())
            .map(str::to_string)
            .collect();
        keys.extend(record.keys().map(str::to_string));
        keys
    }

    fn record_version(record: &SelectionRecord) -> Result<SchemaVersion, ConvertError> {
        match record.get(fields::VERSION) {
            None | Some(Value::Null) => Ok(SchemaVersion::INITIAL),
            Some(Value::String(text)) => text.parse(),
            Some(other) => Err(ConvertError::invalid_version(
                other.to_string(),
                "version must be a string",
            )),
        }
    }

    fn check_supported(&self, major: u32) -> Result<(), ConvertError> {
        let latest = self.latest_major();
        if (1..=latest).contains(&major) {
            Ok(())
        } else {
            Err(ConvertError::UnsupportedVersion { major, latest })
        }
    }
}

impl Default for VersionConverter {
    fn default() -> Self {
        Self {
            target_text: CURRENT_VERSION.to_string(),
            target: SchemaVersion::new(3, 0, 0),
            chain: CHAIN,
            span: Span::none(),
        }
    }
}
