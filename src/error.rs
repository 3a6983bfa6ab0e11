use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for multreplacer
#[derive(Error, Debug)]
pub enum ReplacerError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("No release asset matching '{asset}' in release {tag}")]
    AssetNotFound { asset: String, tag: String },

    #[error("Filesystem operation failed: {message} (path: {})", path.display())]
    Filesystem { message: String, path: PathBuf },

    #[error("File is not valid UTF-8: {} ({message})", path.display())]
    Encoding { path: PathBuf, message: String },

    #[error("IO error: {source}")]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Checksum mismatch for {asset}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        asset: String,
        expected: String,
        actual: String,
    },
}

impl ReplacerError {
    /// Create a new IO error with path context
    pub fn io_error(err: std::io::Error, path: Option<impl Into<PathBuf>>) -> Self {
        Self::Io {
            source: err,
            path: path.map(|p| p.into()),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn asset_not_found(asset: impl Into<String>, tag: impl Into<String>) -> Self {
        Self::AssetNotFound {
            asset: asset.into(),
            tag: tag.into(),
        }
    }

    /// Create a new filesystem error for a rename/write on the executable slot
    pub fn filesystem(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Filesystem {
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn encoding(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Encoding {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Stable short tag for the error category, used in logs and to pick a
    /// localized diagnostic
    pub fn kind(&self) -> &'static str {
        match self {
            ReplacerError::Network { .. } => "network",
            ReplacerError::AssetNotFound { .. } => "asset_not_found",
            ReplacerError::Filesystem { .. } => "filesystem",
            ReplacerError::Encoding { .. } => "encoding",
            ReplacerError::Io { .. } => "io",
            ReplacerError::Parse { .. } => "parse",
            ReplacerError::Config { .. } => "config",
            ReplacerError::InvalidArgument { .. } => "invalid_argument",
            ReplacerError::ChecksumMismatch { .. } => "checksum_mismatch",
        }
    }

    /// Whether the update sequence can simply be abandoned after this error.
    /// Filesystem failures on the executable slot need to be surfaced.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ReplacerError::Filesystem { .. })
    }
}

impl From<std::io::Error> for ReplacerError {
    fn from(error: std::io::Error) -> Self {
        ReplacerError::io_error(error, None::<PathBuf>)
    }
}

impl From<serde_json::Error> for ReplacerError {
    fn from(error: serde_json::Error) -> Self {
        ReplacerError::parse_error(error.to_string())
    }
}

impl From<toml::de::Error> for ReplacerError {
    fn from(error: toml::de::Error) -> Self {
        ReplacerError::parse_error(error.to_string())
    }
}

impl From<toml::ser::Error> for ReplacerError {
    fn from(error: toml::ser::Error) -> Self {
        ReplacerError::parse_error(error.to_string())
    }
}

impl From<reqwest::Error> for ReplacerError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ReplacerError::network(format!("request timed out: {}", error))
        } else if let Some(status) = error.status() {
            ReplacerError::network(format!("HTTP {}: {}", status, error))
        } else {
            ReplacerError::network(error.to_string())
        }
    }
}

/// Result type alias using ReplacerError
pub type ReplacerResult<T> = Result<T, ReplacerError>;

/// Extension trait for converting foreign errors to ReplacerError
pub trait ErrorExt<T> {
    /// Convert to ReplacerResult as a filesystem failure on `path`
    fn with_path(self, path: impl Into<PathBuf>) -> ReplacerResult<T>;
}

impl<T, E: fmt::Display> ErrorExt<T> for Result<T, E> {
    fn with_path(self, path: impl Into<PathBuf>) -> ReplacerResult<T> {
        let path = path.into();
        self.map_err(|e| ReplacerError::filesystem(e.to_string(), path))
    }
}

/// Contextual error mapping function
pub fn map_io_err<P: Into<PathBuf>>(path: P) -> impl FnOnce(std::io::Error) -> ReplacerError {
    let path = path.into();
    move |err| ReplacerError::io_error(err, Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(ReplacerError::network("down").kind(), "network");
        assert_eq!(
            ReplacerError::asset_not_found("app.exe", "v1.0.0").kind(),
            "asset_not_found"
        );
        assert_eq!(
            ReplacerError::filesystem("rename failed", "/tmp/app").kind(),
            "filesystem"
        );
        assert_eq!(ReplacerError::encoding("/tmp/a.txt", "bad").kind(), "encoding");
    }

    #[test]
    fn test_filesystem_is_not_recoverable() {
        assert!(!ReplacerError::filesystem("x", "/tmp/app").is_recoverable());
        assert!(ReplacerError::network("x").is_recoverable());
        assert!(ReplacerError::asset_not_found("a", "b").is_recoverable());
    }

    #[test]
    fn test_with_path_maps_to_filesystem() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.with_path("/opt/app").unwrap_err();
        match err {
            ReplacerError::Filesystem { path, message } => {
                assert_eq!(path, PathBuf::from("/opt/app"));
                assert!(message.contains("denied"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_display_messages() {
        let err = ReplacerError::asset_not_found("app.dmg", "v2.0.0");
        assert_eq!(
            err.to_string(),
            "No release asset matching 'app.dmg' in release v2.0.0"
        );
    }
}
