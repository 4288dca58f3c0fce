//! Error types for schema conversion

use recsel_selection::SelectionError;

/// Conversion errors
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Version text is not `major.minor.patch` with numeric parts
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion {
        /// Offending version text
        version: String,
        /// What is wrong with it
        reason: String,
    },

    /// Major version outside the conversion chain
    #[error("unsupported major version {major} (supported: 1..={latest})")]
    UnsupportedVersion {
        /// Requested major version
        major: u32,
        /// Highest major version the chain reaches
        latest: u32,
    },

    /// A field touched by a conversion step could not be decoded
    #[error("conversion failed: {0}")]
    Field(#[from] SelectionError),
}

impl ConvertError {
    /// Create invalid version error
    pub fn invalid_version(version: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_version_display() {
        let err = ConvertError::invalid_version("3.x.0", "non-numeric component 'x'");
        assert!(err.to_string().contains("invalid version '3.x.0'"));
    }

    #[test]
    fn unsupported_version_display() {
        let err = ConvertError::UnsupportedVersion { major: 7, latest: 3 };
        assert_eq!(
            err.to_string(),
            "unsupported major version 7 (supported: 1..=3)"
        );
    }
}
