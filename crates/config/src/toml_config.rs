//! A thin `serde`/`toml` escape hatch for simple config cases: plain
//! flat-ish settings blobs that don't need `%include`/`%define`/`${...}`
//! interpolation get to skip the bespoke parser entirely.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::ConfigError;

/// Reads and parses `path` as TOML into `T`. I/O errors are reported via
/// [`ConfigError::FileOpen`] so callers can handle both config surfaces
/// with one error type.
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let input = std::fs::read_to_string(path).map_err(|source| ConfigError::FileOpen {
        path: path.to_owned(),
        source,
    })?;
    Ok(toml::from_str(&input)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Settings {
        host: String,
        port: u16,
    }

    #[test]
    fn loads_a_flat_toml_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "host = \"localhost\"\nport = 9000\n").unwrap();
        let settings: Settings = load_toml(&path).unwrap();
        assert_eq!(
            settings,
            Settings {
                host: "localhost".to_owned(),
                port: 9000
            }
        );
    }

    #[test]
    fn missing_file_reports_file_open_error() {
        let err = load_toml::<Settings>("/nonexistent/path/settings.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileOpen { .. }));
    }
}
