//! Tunables, loadable from TOML.
//!
//! ```toml
//! event_buffer = 256
//! state_buffer = 64
//! snapshot_dir = "/var/lib/chansync"
//! ```

use crate::error::ConfigError;
use crate::snapshot::JsonFileSnapshotStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Capacity of each connection's combined event stream.
    pub event_buffer: usize,
    /// Capacity of each connection's state feed.
    pub state_buffer: usize,
    /// Directory for file-backed snapshots, if any.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            event_buffer: 256,
            state_buffer: 64,
            snapshot_dir: None,
        }
    }
}

impl SyncSettings {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_buffer == 0 {
            return Err(ConfigError::InvalidSettings(
                "event_buffer must be positive".into(),
            ));
        }
        if self.state_buffer == 0 {
            return Err(ConfigError::InvalidSettings(
                "state_buffer must be positive".into(),
            ));
        }
        Ok(())
    }

    /// File-backed snapshot store rooted at `snapshot_dir`.
    pub fn file_snapshots(&self) -> Option<JsonFileSnapshotStore> {
        self.snapshot_dir.clone().map(JsonFileSnapshotStore::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let settings = SyncSettings::from_toml_str("").unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert!(settings.file_snapshots().is_none());
    }

    #[test]
    fn partial_toml() {
        let settings = SyncSettings::from_toml_str(
            r#"
            state_buffer = 8
            snapshot_dir = "/tmp/snapshots"
            "#,
        )
        .unwrap();
        assert_eq!(settings.event_buffer, 256);
        assert_eq!(settings.state_buffer, 8);
        assert_eq!(settings.snapshot_dir, Some(PathBuf::from("/tmp/snapshots")));
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = SyncSettings::from_toml_str("event_buffer = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSettings(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");
        std::fs::write(&path, "event_buffer = 16\n").unwrap();
        assert_eq!(SyncSettings::load(&path).unwrap().event_buffer, 16);

        let missing = SyncSettings::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
