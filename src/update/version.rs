use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ReplacerResult;

/// Opaque release identifier such as `v1.2.3`.
///
/// Tags are only ever compared for equality; there is no ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Tag assumed when no version record exists
    pub fn lowest() -> Self {
        Self("v0.0.0".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Read the locally recorded version.
///
/// A missing or empty file yields [`VersionTag::lowest`], so an update check
/// always happens rather than failing.
pub fn read_local_version(path: impl AsRef<Path>) -> VersionTag {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(raw) => {
            let tag = raw.trim();
            if tag.is_empty() {
                warn!("Version file {} is empty", path.display());
                VersionTag::lowest()
            } else {
                VersionTag::new(tag)
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No version file at {}", path.display());
            VersionTag::lowest()
        }
        Err(e) => {
            warn!("Could not read version file {}: {}", path.display(), e);
            VersionTag::lowest()
        }
    }
}

/// Record the installed version as a single line
pub fn write_local_version(path: impl AsRef<Path>, tag: &VersionTag) -> ReplacerResult<()> {
    crate::document::save_document(path, &format!("{}\n", tag))
}
