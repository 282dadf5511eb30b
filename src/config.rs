//! Engine configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, VsuError};

/// Options read once when the engine is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Master switch; when off no backend is opened and writes are ignored
    pub enabled: bool,
    /// Fold mirrored VSU addresses onto the canonical register map
    pub fold_mirrors: bool,
}

impl Default for SoundConfig {
    fn default() -> Self {
        SoundConfig {
            enabled: true,
            fold_mirrors: true,
        }
    }
}

impl SoundConfig {
    /// Sound off
    pub fn disabled() -> Self {
        SoundConfig {
            enabled: false,
            ..Self::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| VsuError::ConfigError(format!("invalid sound config: {e}")))
    }

    /// Load a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SoundConfig::default();
        assert!(config.enabled);
        assert!(config.fold_mirrors);
        assert!(!SoundConfig::disabled().enabled);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SoundConfig::from_json_str(r#"{ "enabled": false }"#).unwrap();
        assert!(!config.enabled);
        assert!(config.fold_mirrors);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = SoundConfig::from_json_str("{ enabled: yes }").unwrap_err();
        assert!(matches!(err, VsuError::ConfigError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "fold_mirrors": false }}"#).unwrap();
        let config = SoundConfig::load(file.path()).unwrap();
        assert!(config.enabled);
        assert!(!config.fold_mirrors);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SoundConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, VsuError::Io(_)));
    }
}
