use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::UpdateConfig;
use crate::error::{ErrorExt, ReplacerError, ReplacerResult};

/// Filesystem operations the executable swap needs.
///
/// Every move is a rename; nothing is copied and deleted.
pub trait SlotFs: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl SlotFs for StdFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Observed condition of the installation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Main executable present
    Installed,
    /// Main executable missing, backup present: an update stopped between
    /// the backup and swap renames
    Interrupted,
    /// Neither the executable nor a backup exists
    Missing,
}

/// What [`ExecutableSlot::recover`] had to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub restored_backup: bool,
    pub removed_incoming: bool,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        !self.restored_backup && !self.removed_incoming
    }
}

/// The running executable's path plus its backup and incoming paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableSlot {
    pub current: PathBuf,
    pub backup: PathBuf,
    pub incoming: PathBuf,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

impl ExecutableSlot {
    pub fn new(current: impl Into<PathBuf>, backup_suffix: &str, incoming_suffix: &str) -> Self {
        let current = current.into();
        Self {
            backup: with_suffix(&current, backup_suffix),
            incoming: with_suffix(&current, incoming_suffix),
            current,
        }
    }

    /// Slot for the running executable. When the process was started from
    /// the backup file itself, the slot points at the original main path.
    pub fn for_running_executable(exe: impl Into<PathBuf>, config: &UpdateConfig) -> Self {
        let exe = exe.into();
        let main = exe
            .to_str()
            .and_then(|s| s.strip_suffix(config.backup_suffix.as_str()))
            .map(PathBuf::from)
            .unwrap_or(exe);
        Self::new(main, &config.backup_suffix, &config.incoming_suffix)
    }

    /// Directory holding the executable
    pub fn dir(&self) -> &Path {
        match self.current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    pub fn state(&self, fs: &dyn SlotFs) -> SlotState {
        match (fs.exists(&self.current), fs.exists(&self.backup)) {
            (true, _) => SlotState::Installed,
            (false, true) => SlotState::Interrupted,
            (false, false) => SlotState::Missing,
        }
    }

    /// Bring the slot back to a runnable state after an interrupted update:
    /// restore the backup when the main executable is gone and drop any
    /// leftover incoming file
    pub fn recover(&self, fs: &dyn SlotFs) -> ReplacerResult<RecoveryReport> {
        let mut report = RecoveryReport::default();

        match self.state(fs) {
            SlotState::Installed => {}
            SlotState::Interrupted => {
                warn!(
                    "Executable {} missing, restoring backup {}",
                    self.current.display(),
                    self.backup.display()
                );
                self.roll_back(fs)?;
                report.restored_backup = true;
            }
            SlotState::Missing => {
                return Err(ReplacerError::filesystem(
                    "neither the executable nor its backup exists",
                    &self.current,
                ));
            }
        }

        if fs.exists(&self.incoming) {
            debug!("Removing stale download {}", self.incoming.display());
            fs.remove_file(&self.incoming).with_path(&self.incoming)?;
            report.removed_incoming = true;
        }

        Ok(report)
    }

    /// Rename the current executable to the backup path. A backup left by an
    /// earlier update is removed first, while the current file still exists.
    pub fn back_up(&self, fs: &dyn SlotFs) -> ReplacerResult<()> {
        if !fs.exists(&self.current) {
            return Err(ReplacerError::filesystem(
                "executable to back up does not exist",
                &self.current,
            ));
        }
        if fs.exists(&self.backup) {
            debug!("Removing previous backup {}", self.backup.display());
            fs.remove_file(&self.backup).with_path(&self.backup)?;
        }

        fs.rename(&self.current, &self.backup)
            .map_err(|e| ReplacerError::filesystem(format!("backup rename failed: {}", e), &self.current))?;
        info!("Backed up {} to {}", self.current.display(), self.backup.display());
        Ok(())
    }

    /// Move the downloaded file into the executable path
    pub fn swap_in(&self, fs: &dyn SlotFs) -> ReplacerResult<()> {
        fs.rename(&self.incoming, &self.current)
            .map_err(|e| ReplacerError::filesystem(format!("swap rename failed: {}", e), &self.current))?;
        info!("Installed {} as {}", self.incoming.display(), self.current.display());
        Ok(())
    }

    /// Move the backup back into the executable path
    pub fn roll_back(&self, fs: &dyn SlotFs) -> ReplacerResult<()> {
        fs.rename(&self.backup, &self.current)
            .map_err(|e| ReplacerError::filesystem(format!("restore rename failed: {}", e), &self.current))?;
        info!("Restored {} from backup", self.current.display());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Real filesystem whose renames numbered `fail_from..fail_to` (0-based)
    /// fail, to simulate a crash or a denied rename between steps
    pub(crate) struct FailingRenameFs {
        fail_from: usize,
        fail_to: usize,
        renames: AtomicUsize,
    }

    impl FailingRenameFs {
        /// Only rename number `n` fails
        pub(crate) fn failing_at(n: usize) -> Self {
            Self {
                fail_from: n,
                fail_to: n + 1,
                renames: AtomicUsize::new(0),
            }
        }

        /// Rename number `n` and every later one fail
        pub(crate) fn failing_from(n: usize) -> Self {
            Self {
                fail_from: n,
                fail_to: usize::MAX,
                renames: AtomicUsize::new(0),
            }
        }
    }

    impl SlotFs for FailingRenameFs {
        fn exists(&self, path: &Path) -> bool {
            path.exists()
        }

        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            let n = self.renames.fetch_add(1, Ordering::SeqCst);
            if (self.fail_from..self.fail_to).contains(&n) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "simulated failure"));
            }
            fs::rename(from, to)
        }

        fn remove_file(&self, path: &Path) -> io::Result<()> {
            fs::remove_file(path)
        }
    }

    fn slot_in(dir: &Path) -> ExecutableSlot {
        ExecutableSlot::new(dir.join("app.exe"), ".bak", ".new")
    }

    #[test]
    fn test_paths_use_suffixes() {
        let slot = ExecutableSlot::new("/opt/app.exe", ".bak", ".new");
        assert_eq!(slot.backup, PathBuf::from("/opt/app.exe.bak"));
        assert_eq!(slot.incoming, PathBuf::from("/opt/app.exe.new"));
        assert_eq!(slot.dir(), Path::new("/opt"));
    }

    #[test]
    fn test_started_from_backup_points_at_main() {
        let config = UpdateConfig::default();
        let slot = ExecutableSlot::for_running_executable("/opt/app.exe.bak", &config);
        assert_eq!(slot.current, PathBuf::from("/opt/app.exe"));
        assert_eq!(slot.backup, PathBuf::from("/opt/app.exe.bak"));
    }

    #[test]
    fn test_back_up_and_swap() {
        let dir = tempdir().unwrap();
        let slot = slot_in(dir.path());
        fs::write(&slot.current, "old").unwrap();
        fs::write(&slot.incoming, "new").unwrap();

        slot.back_up(&StdFs).unwrap();
        assert_eq!(slot.state(&StdFs), SlotState::Interrupted);

        slot.swap_in(&StdFs).unwrap();
        assert_eq!(fs::read_to_string(&slot.current).unwrap(), "new");
        assert_eq!(fs::read_to_string(&slot.backup).unwrap(), "old");
        assert!(!slot.incoming.exists());
    }

    #[test]
    fn test_back_up_replaces_stale_backup() {
        let dir = tempdir().unwrap();
        let slot = slot_in(dir.path());
        fs::write(&slot.current, "v2").unwrap();
        fs::write(&slot.backup, "v1").unwrap();

        slot.back_up(&StdFs).unwrap();
        assert_eq!(fs::read_to_string(&slot.backup).unwrap(), "v2");
        assert!(!slot.current.exists());
    }

    #[test]
    fn test_failed_backup_leaves_current_in_place() {
        let dir = tempdir().unwrap();
        let slot = slot_in(dir.path());
        fs::write(&slot.current, "old").unwrap();

        let fs_impl = FailingRenameFs::failing_at(0);
        let err = slot.back_up(&fs_impl).unwrap_err();
        assert_eq!(err.kind(), "filesystem");
        assert_eq!(fs::read_to_string(&slot.current).unwrap(), "old");
    }

    #[test]
    fn test_recover_after_crash_between_renames() {
        let dir = tempdir().unwrap();
        let slot = slot_in(dir.path());
        fs::write(&slot.current, "old").unwrap();
        fs::write(&slot.incoming, "new").unwrap();

        // crash: backup rename happened, swap rename did not
        slot.back_up(&StdFs).unwrap();
        assert!(!slot.current.exists());

        let report = slot.recover(&StdFs).unwrap();
        assert!(report.restored_backup);
        assert!(report.removed_incoming);
        assert_eq!(fs::read_to_string(&slot.current).unwrap(), "old");
        assert!(!slot.backup.exists());
        assert!(!slot.incoming.exists());
    }

    #[test]
    fn test_recover_is_noop_when_installed() {
        let dir = tempdir().unwrap();
        let slot = slot_in(dir.path());
        fs::write(&slot.current, "app").unwrap();
        fs::write(&slot.backup, "older").unwrap();

        let report = slot.recover(&StdFs).unwrap();
        assert!(report.is_clean());
        assert_eq!(fs::read_to_string(&slot.backup).unwrap(), "older");
    }

    #[test]
    fn test_recover_missing_everything_is_filesystem_error() {
        let dir = tempdir().unwrap();
        let slot = slot_in(dir.path());
        let err = slot.recover(&StdFs).unwrap_err();
        assert_eq!(err.kind(), "filesystem");
    }
}
