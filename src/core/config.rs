use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::core::i18n::Language;
use crate::error::{map_io_err, ReplacerError, ReplacerResult};

/// Application configuration, built once at startup and passed by reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Display language
    pub language: Language,
    /// File holding the installed version tag; relative paths resolve
    /// against the executable's directory
    pub version_file: PathBuf,
    /// Directory with optional `<code>.json` string overrides
    pub lang_dir: PathBuf,
    /// Self-update configuration
    pub update: UpdateConfig,
}

/// Self-update configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Whether the startup update check runs at all
    pub enabled: bool,
    /// Base URL of the release API
    pub api_base: String,
    pub repo_owner: String,
    pub repo_name: String,
    /// Timeout for the release index request in seconds
    pub check_timeout_seconds: u64,
    /// Timeout for the asset download in seconds
    pub download_timeout_seconds: u64,
    /// Suffix appended to the executable path for the backup copy
    pub backup_suffix: String,
    /// Suffix appended to the executable path for the downloaded replacement
    pub incoming_suffix: String,
    /// Check `<asset>.sha256` when the release publishes one
    pub verify_checksums: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            language: Language::Japanese,
            version_file: PathBuf::from("version.txt"),
            lang_dir: PathBuf::from("lang"),
            update: UpdateConfig::default(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://api.github.com".to_string(),
            repo_owner: "eightman999".to_string(),
            repo_name: "MultReplacerApp".to_string(),
            check_timeout_seconds: 30,
            download_timeout_seconds: 300,
            backup_suffix: ".bak".to_string(),
            incoming_suffix: ".new".to_string(),
            verify_checksums: true,
        }
    }
}

impl UpdateConfig {
    /// URL of the latest-release descriptor
    pub fn release_index_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.repo_owner,
            self.repo_name
        )
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_seconds)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_seconds)
    }

    fn validate(&self) -> ReplacerResult<()> {
        if self.backup_suffix.is_empty() || self.incoming_suffix.is_empty() {
            return Err(ReplacerError::config_error(
                "backup_suffix and incoming_suffix must not be empty",
            ));
        }
        if self.backup_suffix == self.incoming_suffix {
            return Err(ReplacerError::config_error(
                "backup_suffix and incoming_suffix must differ",
            ));
        }
        if self.check_timeout_seconds == 0 || self.download_timeout_seconds == 0 {
            return Err(ReplacerError::config_error("timeouts must be at least one second"));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Default location of the configuration file
    pub fn default_path() -> ReplacerResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ReplacerError::config_error("Could not determine config directory"))?;
        Ok(config_dir.join("multreplacer").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> ReplacerResult<Self> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());

        let config_str = fs::read_to_string(path).map_err(map_io_err(path))?;
        let config: AppConfig = toml::from_str(&config_str).map_err(|e| {
            ReplacerError::config_error(format!("{}: {}", path.display(), e))
        })?;
        config.update.validate()?;
        Ok(config)
    }

    /// Load the configuration at `path`, writing the defaults there first when
    /// the file does not exist yet
    pub fn load_or_create(path: impl AsRef<Path>) -> ReplacerResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        info!("Creating default configuration at {}", path.display());
        let config = AppConfig::default();
        config.save(path)?;
        Ok(config)
    }

    /// Load or create the configuration in the user's config directory
    pub fn load_or_create_default() -> ReplacerResult<Self> {
        Self::load_or_create(Self::default_path()?)
    }

    /// Save configuration as pretty TOML
    pub fn save(&self, path: impl AsRef<Path>) -> ReplacerResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(map_io_err(parent))?;
        }
        debug!("Saving configuration to {}", path.display());
        fs::write(path, toml::to_string_pretty(self)?).map_err(map_io_err(path))?;
        Ok(())
    }

    /// Resolve a configured path against the executable's directory
    pub fn resolve(&self, path: &Path, exe_dir: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            exe_dir.join(path)
        }
    }

    pub fn version_file_path(&self, exe_dir: &Path) -> PathBuf {
        self.resolve(&self.version_file, exe_dir)
    }

    pub fn lang_dir_path(&self, exe_dir: &Path) -> PathBuf {
        self.resolve(&self.lang_dir, exe_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_release_index_url() {
        let mut update = UpdateConfig::default();
        assert_eq!(
            update.release_index_url(),
            "https://api.github.com/repos/eightman999/MultReplacerApp/releases/latest"
        );

        update.api_base = "http://localhost:8080/".to_string();
        assert_eq!(
            update.release_index_url(),
            "http://localhost:8080/repos/eightman999/MultReplacerApp/releases/latest"
        );
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = AppConfig::load_or_create(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reloaded = AppConfig::load(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "language = \"en\"\n\n[update]\nenabled = false\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.language, Language::English);
        assert!(!config.update.enabled);
        assert_eq!(config.update.backup_suffix, ".bak");
        assert_eq!(config.version_file, PathBuf::from("version.txt"));
    }

    #[test]
    fn test_invalid_suffixes_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[update]\nbackup_suffix = \".x\"\nincoming_suffix = \".x\"\n").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_resolve_relative_paths() {
        let config = AppConfig::default();
        let exe_dir = Path::new("/opt/multreplacer");
        assert_eq!(
            config.version_file_path(exe_dir),
            PathBuf::from("/opt/multreplacer/version.txt")
        );

        let absolute = Path::new("/etc/version.txt");
        assert_eq!(config.resolve(absolute, exe_dir), PathBuf::from("/etc/version.txt"));
    }
}
