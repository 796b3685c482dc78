//! Optional TOML configuration for the CLI.
//!
//! ```toml
//! supported_extensions = ["f3d", "f3z"]
//! collision_policy = "first-wins"   # or "fail"
//! ```
//!
//! Command-line flags override values read from the file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use backup_engine::{BackupOptions, CollisionPolicy, DEFAULT_SUPPORTED_EXTENSIONS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub supported_extensions: Vec<String>,
    pub collision_policy: CollisionPolicy,
}

impl Default for BackupConfig {
    fn default() -> Self {
        BackupConfig {
            supported_extensions: DEFAULT_SUPPORTED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            collision_policy: CollisionPolicy::default(),
        }
    }
}

impl BackupConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn into_options(self) -> BackupOptions {
        BackupOptions::with_extensions(self.supported_extensions)
            .collision_policy(self.collision_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_engine_defaults() {
        assert_eq!(BackupConfig::default().into_options(), BackupOptions::default());
    }

    #[test]
    fn test_load_full_config() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("backup.toml");
        fs::write(
            &path,
            "supported_extensions = [\"F3D\", \".step\"]\ncollision_policy = \"fail\"\n",
        )
        .expect("Failed to write config");

        let options = BackupConfig::load(&path).expect("Failed to load").into_options();

        assert!(options.is_supported("f3d"));
        assert!(options.is_supported("step"));
        assert!(!options.is_supported("f3z"));
        assert_eq!(options.collision_policy, CollisionPolicy::Fail);
    }

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("backup.toml");
        fs::write(&path, "collision_policy = \"fail\"\n").expect("Failed to write config");

        let config = BackupConfig::load(&path).expect("Failed to load");
        assert_eq!(config.supported_extensions, vec!["f3d", "f3z"]);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("backup.toml");
        fs::write(&path, "collision_policy = \"rename\"\n").expect("Failed to write config");

        assert!(matches!(BackupConfig::load(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            BackupConfig::load(&temp_dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
