//! Selection record
//!
//! An insertion-ordered, string-keyed map of JSON values describing the
//! desired state of an acquisition session. Structured fields (group maps,
//! lists, objects) are stored JSON-encoded as strings so the persisted
//! document stays flat.

use crate::error::SelectionError;
use crate::fields::{self, SelectionDefaults};
use crate::group::{self, GroupMap};
use indexmap::{IndexMap, IndexSet};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Ordered JSON object used for object-valued fields
pub type JsonObject = Map<String, Value>;

/// Acquisition selection record
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRecord {
    fields: IndexMap<String, Value>,
    defaults: SelectionDefaults,
}

impl SelectionRecord {
    /// Create record populated with canonical defaults
    #[must_use]
    pub fn new() -> Self {
        Self::with_defaults(SelectionDefaults::default())
    }

    /// Create record with custom defaults
    #[must_use]
    pub fn with_defaults(defaults: SelectionDefaults) -> Self {
        let mut record = Self {
            fields: IndexMap::new(),
            defaults,
        };
        record.reset();
        record
    }

    /// Create a record holding exactly the given fields
    ///
    /// No defaults are applied; used for documents in older schemas whose
    /// vocabulary differs from the current one.
    #[must_use]
    pub fn from_fields(fields: IndexMap<String, Value>) -> Self {
        Self {
            fields,
            defaults: SelectionDefaults::default(),
        }
    }

    /// Parse a persisted selection document
    ///
    /// Nested objects and arrays are normalized to their JSON-encoded text.
    ///
    /// # Errors
    /// Returns `InvalidDocument` if the text is not a JSON object
    pub fn from_json(document: &str) -> Result<Self, SelectionError> {
        let fields = parse_document(document)?;
        Ok(Self::from_fields(fields))
    }

    /// Serialize to the persisted flat JSON document
    #[must_use]
    pub fn to_json(&self) -> String {
        let object: JsonObject = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(object).to_string()
    }

    /// Overwrite fields with those present in `document`
    ///
    /// Fields absent from the document keep their values.
    ///
    /// # Errors
    /// Returns `InvalidDocument` if the text is not a JSON object
    pub fn merge_json(&mut self, document: &str) -> Result<(), SelectionError> {
        for (name, value) in parse_document(document)? {
            self.fields.insert(name, value);
        }
        Ok(())
    }

    /// Clear all fields and repopulate canonical defaults
    pub fn reset(&mut self) {
        let d = &self.defaults;
        let empty_object = || Value::String("{}".to_string());
        let empty_list = || Value::String("[]".to_string());
        let text = |s: &str| Value::String(s.to_string());

        let defaults = [
            (fields::VERSION, text(&d.version)),
            (fields::MNTGRP, text("")),
            (fields::TIMER, empty_list()),
            (fields::ORDERED_CHANNELS, empty_list()),
            (fields::COMPONENT_SELECTION, empty_object()),
            (fields::DATASOURCE_SELECTION, empty_object()),
            (fields::DATASOURCE_PRESELECTION, empty_object()),
            (fields::COMPONENT_PRESELECTION, empty_object()),
            (fields::PRESELECTING_DATASOURCES, empty_list()),
            (fields::OPTIONAL_COMPONENTS, empty_list()),
            (fields::APPEND_ENTRY, Value::Bool(false)),
            (fields::COMPONENTS_FROM_MNTGRP, Value::Bool(false)),
            (fields::CONFIG_VARIABLES, empty_object()),
            (fields::USER_DATA, empty_object()),
            (fields::CHANNEL_PROPERTIES, empty_object()),
            (fields::UNPLOTTED_COMPONENTS, empty_list()),
            (fields::DYNAMIC_COMPONENTS, Value::Bool(true)),
            (fields::DEFAULT_DYNAMIC_LINKS, Value::Bool(true)),
            (fields::DEFAULT_DYNAMIC_PATH, text(&d.dynamic_path)),
            (fields::CONFIG_DEVICE, text("")),
            (fields::WRITER_DEVICE, text("")),
            (fields::DOOR, text("")),
            (fields::MNTGRP_CONFIGURATION, text("")),
            (fields::TIME_ZONE, text("")),
        ];

        self.fields.clear();
        for (name, value) in defaults {
            self.fields.insert(name.to_string(), value);
        }
    }

    /// Defaults used by this record
    #[inline]
    #[must_use]
    pub fn defaults(&self) -> &SelectionDefaults {
        &self.defaults
    }

    // ------------------------------------------------------------------
    // Raw field access
    // ------------------------------------------------------------------

    /// Get raw field value
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set raw field value, keeping the field's position if it exists
    #[inline]
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Remove a field, preserving the order of the others
    #[inline]
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    /// Rename a field in place
    ///
    /// The value keeps the old field's position. An existing field under the
    /// new name is replaced. Returns `false` if `old` is absent.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        let Some(index) = self.fields.get_index_of(old) else {
            return false;
        };
        let Some(value) = self.fields.shift_remove(old) else {
            return false;
        };
        self.fields.shift_remove(new);
        let index = index.min(self.fields.len());
        self.fields.shift_insert(index, new.to_string(), value);
        true
    }

    /// Check field presence
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Underlying field map
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    /// String scalar value
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Boolean scalar value
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(Value::as_bool)
    }

    /// Decode a JSON-encoded field
    ///
    /// Absent, `null` and empty-string fields decode to `None`.
    ///
    /// # Errors
    /// Returns `MalformedField` if the text does not decode to `T`
    pub fn decode<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, SelectionError> {
        match self.fields.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
            Some(Value::String(text)) => serde_json::from_str(text)
                .map(Some)
                .map_err(|e| SelectionError::malformed(name, e)),
            Some(other) => serde_json::from_value(other.clone())
                .map(Some)
                .map_err(|e| SelectionError::malformed(name, e)),
        }
    }

    /// Store a value JSON-encoded
    ///
    /// # Errors
    /// Returns `MalformedField` if `value` has no JSON form (e.g. a map with
    /// non-string keys); the field is left unchanged
    pub fn encode<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
    ) -> Result<(), SelectionError> {
        let text =
            serde_json::to_string(value).map_err(|e| SelectionError::malformed(name, e))?;
        self.set(name, Value::String(text));
        Ok(())
    }

    fn store_encoded(&mut self, name: &str, value: &Value) {
        self.set(name, Value::String(value.to_string()));
    }

    /// Group map field (empty if absent)
    ///
    /// # Errors
    /// Returns `MalformedField` if the field is not a JSON object of
    /// `true|false|null`
    pub fn group_map(&self, name: &str) -> Result<GroupMap, SelectionError> {
        Ok(self.decode(name)?.unwrap_or_default())
    }

    /// Replace group map field
    pub fn set_group_map(&mut self, name: &str, map: &GroupMap) {
        let object: JsonObject = map
            .iter()
            .map(|(key, state)| (key.clone(), state.map_or(Value::Null, Value::Bool)))
            .collect();
        self.store_encoded(name, &Value::Object(object));
    }

    /// Names of active (`true` or `null`) entries of a group map field
    ///
    /// # Errors
    /// Returns `MalformedField` if the field cannot be decoded
    pub fn active_names(&self, name: &str) -> Result<Vec<String>, SelectionError> {
        Ok(group::active_names(&self.group_map(name)?))
    }

    /// List field (empty if absent)
    ///
    /// # Errors
    /// Returns `MalformedField` if the field is not a JSON array of strings
    pub fn string_list(&self, name: &str) -> Result<Vec<String>, SelectionError> {
        Ok(self.decode(name)?.unwrap_or_default())
    }

    /// Replace list field
    pub fn set_string_list(&mut self, name: &str, list: &[String]) {
        let items = list.iter().cloned().map(Value::String).collect();
        self.store_encoded(name, &Value::Array(items));
    }

    /// Object field (empty if absent)
    ///
    /// # Errors
    /// Returns `MalformedField` if the field is not a JSON object
    pub fn json_object(&self, name: &str) -> Result<JsonObject, SelectionError> {
        Ok(self.decode(name)?.unwrap_or_default())
    }

    /// Replace object field
    pub fn set_json_object(&mut self, name: &str, object: &JsonObject) {
        self.store_encoded(name, &Value::Object(object.clone()));
    }

    /// Per-channel values of one channel property (`label`, `nexus_path`, ...)
    ///
    /// # Errors
    /// Returns `MalformedField` if `ChannelProperties` cannot be decoded
    pub fn channel_properties(&self, property: &str) -> Result<JsonObject, SelectionError> {
        let properties = self.json_object(fields::CHANNEL_PROPERTIES)?;
        match properties.get(property) {
            Some(Value::Object(values)) => Ok(values.clone()),
            Some(_) => Err(SelectionError::UnexpectedType {
                field: format!("{}.{property}", fields::CHANNEL_PROPERTIES),
                expected: "object",
            }),
            None => Ok(JsonObject::new()),
        }
    }

    /// Set one channel's value of a channel property
    ///
    /// # Errors
    /// Returns `MalformedField` if `ChannelProperties` cannot be decoded
    pub fn set_channel_property(
        &mut self,
        property: &str,
        channel: &str,
        value: Value,
    ) -> Result<(), SelectionError> {
        let mut properties = self.json_object(fields::CHANNEL_PROPERTIES)?;
        let mut values = self.channel_properties(property)?;
        values.insert(channel.to_string(), value);
        properties.insert(property.to_string(), Value::Object(values));
        self.set_json_object(fields::CHANNEL_PROPERTIES, &properties);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle operations
    // ------------------------------------------------------------------

    /// Deselect everything while keeping the profile's shape
    ///
    /// Every component and datasource selection entry becomes `false`; the
    /// datasource preselection and unplotted components are cleared.
    ///
    /// # Errors
    /// Returns `MalformedField` if a selection map cannot be decoded
    pub fn deselect(&mut self) -> Result<(), SelectionError> {
        for name in [fields::COMPONENT_SELECTION, fields::DATASOURCE_SELECTION] {
            let mut map = self.group_map(name)?;
            for state in map.values_mut() {
                *state = Some(false);
            }
            self.set_group_map(name, &map);
        }
        self.set_group_map(fields::DATASOURCE_PRESELECTION, &GroupMap::new());
        self.set_string_list(fields::UNPLOTTED_COMPONENTS, &[]);
        Ok(())
    }

    /// Union `names` into `PreselectingDataSources`
    ///
    /// # Errors
    /// Returns `MalformedField` if the list cannot be decoded
    pub fn update_preselecting_datasources<I, S>(&mut self, names: I) -> Result<(), SelectionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: IndexSet<String> = self
            .string_list(fields::PRESELECTING_DATASOURCES)?
            .into_iter()
            .collect();
        set.extend(names.into_iter().map(Into::into));
        let list: Vec<String> = set.into_iter().collect();
        self.set_string_list(fields::PRESELECTING_DATASOURCES, &list);
        Ok(())
    }

    /// Reorder `OrderedChannels` against the current channel set
    ///
    /// Channels already listed keep their relative order and new channels are
    /// appended sorted. Channels missing from `channels` are dropped, as are
    /// repeated entries.
    ///
    /// # Errors
    /// Returns `MalformedField` if the list cannot be decoded
    pub fn update_ordered_channels(&mut self, channels: &[String]) -> Result<(), SelectionError> {
        let wanted: IndexSet<&str> = channels.iter().map(String::as_str).collect();
        let mut ordered: IndexSet<String> = self
            .string_list(fields::ORDERED_CHANNELS)?
            .into_iter()
            .filter(|ch| wanted.contains(ch.as_str()))
            .collect();

        let mut fresh: Vec<String> = wanted
            .iter()
            .filter(|ch| !ordered.contains(**ch))
            .map(|ch| (*ch).to_string())
            .collect();
        fresh.sort();
        ordered.extend(fresh);

        let list: Vec<String> = ordered.into_iter().collect();
        self.set_string_list(fields::ORDERED_CHANNELS, &list);
        Ok(())
    }

    /// Drop components that share a name with a selected datasource
    ///
    /// # Errors
    /// Returns `MalformedField` if a selection map cannot be decoded
    pub fn update_component_selection(&mut self) -> Result<(), SelectionError> {
        let datasources = self.group_map(fields::DATASOURCE_SELECTION)?;
        let mut components = self.group_map(fields::COMPONENT_SELECTION)?;
        components.retain(|name, _| !datasources.contains_key(name));
        self.set_group_map(fields::COMPONENT_SELECTION, &components);
        Ok(())
    }

    /// Align `DataSourceSelection` with the available channels and datasources
    ///
    /// Keys known to neither are dropped; channels missing from the map are
    /// added as `false`.
    ///
    /// # Errors
    /// Returns `MalformedField` if the selection map cannot be decoded
    pub fn update_datasource_selection(
        &mut self,
        channels: &[String],
        datasources: &[String],
    ) -> Result<(), SelectionError> {
        let mut map = self.group_map(fields::DATASOURCE_SELECTION)?;
        map.retain(|name, _| channels.contains(name) || datasources.contains(name));
        for channel in channels {
            map.entry(channel.clone()).or_insert(Some(false));
        }
        self.set_group_map(fields::DATASOURCE_SELECTION, &map);
        Ok(())
    }

    /// Replace `ComponentPreselection` with undetermined entries for `names`
    pub fn reset_preselected_components<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let map: GroupMap = names.into_iter().map(|n| (n.into(), None)).collect();
        self.set_group_map(fields::COMPONENT_PRESELECTION, &map);
    }

    /// Set `MntGrp` to the default if it is empty or absent
    pub fn reset_mntgrp(&mut self) {
        let default = self.defaults.mntgrp.clone();
        self.reset_text_if_empty(fields::MNTGRP, default);
    }

    /// Set `TimeZone` to the default if it is empty or absent
    pub fn reset_timezone(&mut self) {
        let default = self.defaults.timezone.clone();
        self.reset_text_if_empty(fields::TIME_ZONE, default);
    }

    fn reset_text_if_empty(&mut self, name: &str, default: String) {
        let empty = match self.fields.get(name) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if empty {
            self.set(name, Value::String(default));
        }
    }
}

impl Default for SelectionRecord {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_document(document: &str) -> Result<IndexMap<String, Value>, SelectionError> {
    let value: Value = serde_json::from_str(document)
        .map_err(|e| SelectionError::InvalidDocument(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(SelectionError::InvalidDocument(
            "expected a JSON object".to_string(),
        ));
    };

    Ok(object
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                nested @ (Value::Object(_) | Value::Array(_)) => Value::String(nested.to_string()),
                scalar => scalar,
            };
            (name, value)
        })
        .collect())
}
