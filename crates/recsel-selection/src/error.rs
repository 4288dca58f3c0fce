//! Error types for selection records
//!
//! Field values that hold JSON-encoded structures are decoded lazily, so the
//! only failure a record can report is a field whose text does not decode to
//! the expected shape.

/// Selection record errors
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// A field holds text that is not valid JSON for its shape
    #[error("malformed field '{field}': {source}")]
    MalformedField {
        /// Field name
        field: String,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },

    /// A field holds a value of the wrong scalar kind
    #[error("field '{field}' has unexpected type: expected {expected}")]
    UnexpectedType {
        /// Field name
        field: String,
        /// Expected kind, e.g. "string"
        expected: &'static str,
    },

    /// The persisted document is not a flat JSON object
    #[error("invalid selection document: {0}")]
    InvalidDocument(String),
}

impl SelectionError {
    /// Create malformed field error
    pub fn malformed(field: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedField {
            field: field.into(),
            source,
        }
    }

    /// Name of the offending field, if the error is tied to one
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MalformedField { field, .. } | Self::UnexpectedType { field, .. } => Some(field),
            Self::InvalidDocument(_) => None,
        }
    }
}
