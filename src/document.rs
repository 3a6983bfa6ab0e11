use similar::TextDiff;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{map_io_err, ReplacerError, ReplacerResult};
use crate::replace::{self, ReplacementReport, ReplacementSet};

/// Read a whole file as UTF-8 text
pub fn load_document(path: impl AsRef<Path>) -> ReplacerResult<String> {
    let path = path.as_ref();
    debug!("Reading document: {}", path.display());

    let bytes = fs::read(path).map_err(map_io_err(path))?;
    String::from_utf8(bytes).map_err(|e| ReplacerError::encoding(path, e.utf8_error().to_string()))
}

/// Write `text` over `path`.
///
/// The content goes to a temporary file in the same directory first and is
/// then renamed over the target, so a failed write leaves the original intact.
pub fn save_document(path: impl AsRef<Path>, text: &str) -> ReplacerResult<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    debug!("Writing document: {}", path.display());

    let mut temp = tempfile::Builder::new()
        .prefix(".multreplacer-")
        .tempfile_in(dir)
        .map_err(map_io_err(dir))?;
    temp.write_all(text.as_bytes()).map_err(map_io_err(temp.path()))?;
    temp.as_file().sync_all().map_err(map_io_err(temp.path()))?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions()).map_err(map_io_err(path))?;
    }

    temp.persist(path)
        .map_err(|e| ReplacerError::io_error(e.error, Some(path)))?;
    Ok(())
}

/// Unified diff between the original and the replaced text
pub fn preview_diff(original: &str, replaced: &str) -> String {
    TextDiff::from_lines(original, replaced)
        .unified_diff()
        .context_radius(2)
        .header("original", "replaced")
        .to_string()
}

/// A replacement computed in memory and not yet written
#[derive(Debug, Clone)]
pub struct PendingReplacement {
    pub path: PathBuf,
    pub original: String,
    pub replaced: String,
    pub report: ReplacementReport,
}

impl PendingReplacement {
    /// Load `path` and apply `rules` without touching the file
    pub fn prepare(path: impl Into<PathBuf>, rules: &ReplacementSet) -> ReplacerResult<Self> {
        let path = path.into();
        let original = load_document(&path)?;
        let (replaced, report) = replace::apply_with_report(&original, rules);
        Ok(Self {
            path,
            original,
            replaced,
            report,
        })
    }

    pub fn has_changes(&self) -> bool {
        self.original != self.replaced
    }

    pub fn diff(&self) -> String {
        preview_diff(&self.original, &self.replaced)
    }

    /// Write the replaced text back; call only after the user confirmed
    pub fn commit(self) -> ReplacerResult<ReplacementReport> {
        save_document(&self.path, &self.replaced)?;
        info!(
            "Saved {} replacement(s) to {}",
            self.report.total(),
            self.path.display()
        );
        Ok(self.report)
    }
}
