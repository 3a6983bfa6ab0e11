use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::checksum::{parse_checksum_text, sha256_file};
use super::launcher::{ProcessLauncher, SystemLauncher};
use super::platform::{self, PlatformStrategy};
use super::release::{HttpReleaseSource, ReleaseAsset, ReleaseDescriptor, ReleaseSource};
use super::slot::{ExecutableSlot, SlotFs, StdFs};
use super::version::{read_local_version, write_local_version, VersionTag};
use crate::core::AppConfig;
use crate::error::{map_io_err, ErrorExt, ReplacerError, ReplacerResult};

/// Phases of one update attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Recovering,
    CheckingRemote,
    UpToDate,
    AssetSelection,
    Downloading,
    Verifying,
    BackingUp,
    Swapping,
    Restarting,
    Terminated,
    Failed,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdatePhase::Idle => "idle",
            UpdatePhase::Recovering => "recovering",
            UpdatePhase::CheckingRemote => "checking_remote",
            UpdatePhase::UpToDate => "up_to_date",
            UpdatePhase::AssetSelection => "asset_selection",
            UpdatePhase::Downloading => "downloading",
            UpdatePhase::Verifying => "verifying",
            UpdatePhase::BackingUp => "backing_up",
            UpdatePhase::Swapping => "swapping",
            UpdatePhase::Restarting => "restarting",
            UpdatePhase::Terminated => "terminated",
            UpdatePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of [`UpdateOrchestrator::check_and_update`]
#[derive(Debug)]
pub enum UpdateResult {
    /// Local and remote tags are equal
    UpToDate { version: VersionTag },
    /// The new executable is installed and was launched; the host must exit
    Restarted { from: VersionTag, to: VersionTag },
    /// The attempt stopped in `phase`; normal operation continues
    Failed {
        phase: UpdatePhase,
        error: ReplacerError,
    },
    /// Update checks are turned off in the configuration
    Disabled,
    /// This orchestrator already ran its one check
    AlreadyChecked,
}

impl UpdateResult {
    /// Whether the host should terminate so the new executable takes over
    pub fn requires_exit(&self) -> bool {
        matches!(self, UpdateResult::Restarted { .. })
    }
}

/// Discovers, downloads and installs a newer release of the running
/// executable, then relaunches it.
///
/// Each transition is a separate method so the sequence can be driven with a
/// fake release source, filesystem and launcher.
pub struct UpdateOrchestrator {
    source: Box<dyn ReleaseSource>,
    platform: Box<dyn PlatformStrategy>,
    fs: Box<dyn SlotFs>,
    launcher: Box<dyn ProcessLauncher>,
    slot: ExecutableSlot,
    version_file: PathBuf,
    enabled: bool,
    verify_checksums: bool,
    phase: UpdatePhase,
    checked: bool,
}

impl UpdateOrchestrator {
    pub fn new(
        source: Box<dyn ReleaseSource>,
        platform: Box<dyn PlatformStrategy>,
        slot: ExecutableSlot,
        version_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            platform,
            fs: Box::new(StdFs),
            launcher: Box::new(SystemLauncher),
            slot,
            version_file: version_file.into(),
            enabled: true,
            verify_checksums: true,
            phase: UpdatePhase::Idle,
            checked: false,
        }
    }

    /// Orchestrator for the running executable, wired to the real network,
    /// filesystem and process launcher
    pub fn from_config(config: &AppConfig) -> ReplacerResult<Self> {
        let exe = std::env::current_exe().map_err(|e| ReplacerError::io_error(e, None::<PathBuf>))?;
        let slot = ExecutableSlot::for_running_executable(exe, &config.update);
        let version_file = config.version_file_path(slot.dir());
        let source = HttpReleaseSource::new(&config.update)?;

        Ok(Self::new(Box::new(source), platform::current(), slot, version_file)
            .with_enabled(config.update.enabled)
            .with_checksum_verification(config.update.verify_checksums))
    }

    pub fn with_fs(mut self, fs: Box<dyn SlotFs>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_launcher(mut self, launcher: Box<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub fn slot(&self) -> &ExecutableSlot {
        &self.slot
    }

    pub fn version_file(&self) -> &Path {
        &self.version_file
    }

    pub fn local_version(&self) -> VersionTag {
        read_local_version(&self.version_file)
    }

    fn transition(&mut self, next: UpdatePhase) {
        info!("Update phase {} -> {}", self.phase, next);
        self.phase = next;
    }

    /// Run the whole update sequence once. Never panics and never returns an
    /// error: failures are logged and reported as [`UpdateResult::Failed`].
    ///
    /// Slot recovery runs even when update checks are disabled, so an
    /// interrupted swap is always repaired on the next start.
    pub async fn check_and_update(&mut self) -> UpdateResult {
        if self.checked {
            debug!("Update check already ran for this process");
            return UpdateResult::AlreadyChecked;
        }
        self.checked = true;

        if let Err(error) = self.recover_slot() {
            return self.fail(error);
        }

        if !self.enabled {
            info!("Update check disabled by configuration");
            return UpdateResult::Disabled;
        }

        match self.run().await {
            Ok(result) => result,
            Err(error) => self.fail(error),
        }
    }

    fn fail(&mut self, error: ReplacerError) -> UpdateResult {
        let phase = self.phase;
        if error.is_recoverable() {
            warn!("Update aborted during {}: {}", phase, error);
        } else {
            error!("Update failed during {}: {}", phase, error);
        }
        self.transition(UpdatePhase::Failed);
        UpdateResult::Failed { phase, error }
    }

    async fn run(&mut self) -> ReplacerResult<UpdateResult> {
        let local = self.local_version();
        info!("Current version: {}", local);

        let release = self.check_remote().await?;
        info!("Latest version: {}", release.tag_name);

        if self.compare(&local, &release) {
            self.transition(UpdatePhase::UpToDate);
            return Ok(UpdateResult::UpToDate { version: local });
        }

        let asset = self.select_asset(&release)?.clone();
        self.download(&asset).await?;

        if let Err(e) = self.verify(&release, &asset).await {
            self.discard_incoming();
            return Err(e);
        }

        self.back_up()?;
        self.swap()?;
        self.record_version(&release.tag_name);
        self.restart()?;

        Ok(UpdateResult::Restarted {
            from: local,
            to: release.tag_name,
        })
    }

    /// Restore the backup left by an interrupted update and clear stale
    /// downloads
    pub fn recover_slot(&mut self) -> ReplacerResult<()> {
        self.transition(UpdatePhase::Recovering);
        let report = self.slot.recover(self.fs.as_ref())?;
        if report.restored_backup {
            warn!(
                "Recovered {} from an interrupted update",
                self.slot.current.display()
            );
        }
        Ok(())
    }

    pub async fn check_remote(&mut self) -> ReplacerResult<ReleaseDescriptor> {
        self.transition(UpdatePhase::CheckingRemote);
        self.source.latest_release().await
    }

    /// True when no update is needed. Tags are compared by exact equality.
    pub fn compare(&self, local: &VersionTag, release: &ReleaseDescriptor) -> bool {
        *local == release.tag_name
    }

    pub fn select_asset<'r>(
        &mut self,
        release: &'r ReleaseDescriptor,
    ) -> ReplacerResult<&'r ReleaseAsset> {
        self.transition(UpdatePhase::AssetSelection);
        let wanted = self.platform.asset_name();
        debug!("Looking for asset '{}' ({})", wanted, self.platform.name());

        release
            .find_asset(wanted)
            .ok_or_else(|| ReplacerError::asset_not_found(wanted, release.tag_name.as_str()))
    }

    /// Download into a temporary file beside the executable and promote it to
    /// the incoming path only once the transfer completed
    pub async fn download(&mut self, asset: &ReleaseAsset) -> ReplacerResult<u64> {
        self.transition(UpdatePhase::Downloading);

        let dir = self.slot.dir().to_path_buf();
        let temp = tempfile::Builder::new()
            .prefix(".multreplacer-download-")
            .tempfile_in(&dir)
            .with_path(&dir)?
            .into_temp_path();

        let written = self.source.download_asset(asset, &temp).await?;
        if written == 0 {
            return Err(ReplacerError::network(format!(
                "downloaded asset {} is empty",
                asset.name
            )));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o755))
                .map_err(map_io_err(temp.to_path_buf()))?;
        }

        temp.persist(&self.slot.incoming)
            .with_path(&self.slot.incoming)?;
        info!(
            "Downloaded {} ({} bytes) to {}",
            asset.name,
            written,
            self.slot.incoming.display()
        );
        Ok(written)
    }

    /// Check the download against `<asset>.sha256` when one is published
    pub async fn verify(
        &mut self,
        release: &ReleaseDescriptor,
        asset: &ReleaseAsset,
    ) -> ReplacerResult<()> {
        self.transition(UpdatePhase::Verifying);

        if !self.verify_checksums {
            debug!("Checksum verification disabled");
            return Ok(());
        }
        let Some(checksum_asset) = release.checksum_for(asset) else {
            warn!("Release {} publishes no checksum for {}, installing unverified", release.tag_name, asset.name);
            return Ok(());
        };

        let raw = self
            .source
            .fetch_text(&checksum_asset.browser_download_url)
            .await?;
        let expected = parse_checksum_text(&raw).ok_or_else(|| {
            ReplacerError::parse_error(format!("malformed checksum file {}", checksum_asset.name))
        })?;
        let actual = sha256_file(&self.slot.incoming)?;

        if expected != actual {
            return Err(ReplacerError::ChecksumMismatch {
                asset: asset.name.clone(),
                expected,
                actual,
            });
        }
        debug!("Checksum verified for {}", asset.name);
        Ok(())
    }

    pub fn back_up(&mut self) -> ReplacerResult<()> {
        self.transition(UpdatePhase::BackingUp);
        self.slot.back_up(self.fs.as_ref())
    }

    /// Move the download into place. On failure the backup is renamed back
    /// immediately; if even that fails, the next start recovers it.
    pub fn swap(&mut self) -> ReplacerResult<()> {
        self.transition(UpdatePhase::Swapping);
        let fs = self.fs.as_ref();

        if let Err(swap_err) = self.slot.swap_in(fs) {
            match self.slot.roll_back(fs) {
                Ok(()) => warn!("Swap failed, previous executable restored"),
                Err(rollback_err) => error!(
                    "Swap failed and restore failed ({}); backup {} will be restored on next start",
                    rollback_err,
                    self.slot.backup.display()
                ),
            }
            return Err(swap_err);
        }
        Ok(())
    }

    fn record_version(&self, tag: &VersionTag) {
        if let Err(e) = write_local_version(&self.version_file, tag) {
            warn!(
                "Installed {} but could not record it in {}: {}",
                tag,
                self.version_file.display(),
                e
            );
        }
    }

    /// Launch the new executable. The host terminates the current process
    /// once this returns.
    pub fn restart(&mut self) -> ReplacerResult<()> {
        self.transition(UpdatePhase::Restarting);
        let command = self.platform.launch_command(&self.slot.current);
        self.launcher.spawn(&command)?;
        self.transition(UpdatePhase::Terminated);
        Ok(())
    }

    fn discard_incoming(&self) {
        if self.fs.exists(&self.slot.incoming) {
            if let Err(e) = self.fs.remove_file(&self.slot.incoming) {
                warn!(
                    "Could not remove rejected download {}: {}",
                    self.slot.incoming.display(),
                    e
                );
            }
        }
    }
}
