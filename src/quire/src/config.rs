//! Validation of the top-level dispatcher configuration.

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::ConfigError;

/// Version reported when none is configured.
pub const UNVERSIONED: &str = "unversioned";

/// A configured version, as text or as a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Version {
    Text(String),
    Number(Number),
}

impl Version {
    /// The version as trimmed text.
    pub fn normalized(&self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => number.to_string(),
        }
    }
}

impl From<&str> for Version {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Version {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<u64> for Version {
    fn from(number: u64) -> Self {
        Self::Number(number.into())
    }
}

impl From<i64> for Version {
    fn from(number: i64) -> Self {
        Self::Number(number.into())
    }
}

impl From<f64> for Version {
    fn from(number: f64) -> Self {
        Number::from_f64(number)
            .map(Self::Number)
            .unwrap_or_else(|| Self::Text(number.to_string()))
    }
}

/// Validate the cli name. Only the version is normalized; the name is kept as given.
pub(crate) fn validate_name(name: &str) -> Result<String, ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::UnvalidName {
            received: format!("{name:?}"),
        });
    }
    Ok(name.to_string())
}

/// Validate and normalize the cli version, defaulting to [`UNVERSIONED`].
pub(crate) fn validate_version(version: Option<&Version>) -> Result<String, ConfigError> {
    let Some(version) = version else {
        return Ok(UNVERSIONED.to_string());
    };
    let normalized = version.normalized();
    if normalized.is_empty() {
        return Err(ConfigError::UnvalidVersion {
            received: format!("{:?}", version),
        });
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_kept_verbatim() {
        assert_eq!(validate_name("  tool ").unwrap(), "  tool ");
        assert_eq!(validate_name("my tool").unwrap(), "my tool");
    }

    #[test]
    fn test_blank_name_rejected() {
        let err = validate_name("   ").unwrap_err();
        assert!(matches!(err, ConfigError::UnvalidName { .. }));
    }

    #[test]
    fn test_version_defaults_to_unversioned() {
        assert_eq!(validate_version(None).unwrap(), "unversioned");
    }

    #[test]
    fn test_version_normalization() {
        assert_eq!(validate_version(Some(&" 1.2.3 ".into())).unwrap(), "1.2.3");
        assert_eq!(validate_version(Some(&Version::from(2u64))).unwrap(), "2");
        assert_eq!(validate_version(Some(&Version::from(1.5))).unwrap(), "1.5");
    }

    #[test]
    fn test_blank_version_rejected() {
        let err = validate_version(Some(&"  ".into())).unwrap_err();
        assert!(matches!(err, ConfigError::UnvalidVersion { .. }));
    }
}
