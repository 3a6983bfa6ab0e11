// Self-update: release discovery, download, executable swap and relaunch

pub mod checksum;
pub mod launcher;
pub mod orchestrator;
pub mod platform;
pub mod release;
pub mod slot;
pub mod version;

pub use launcher::{ProcessLauncher, SystemLauncher};
pub use orchestrator::{UpdateOrchestrator, UpdatePhase, UpdateResult};
pub use platform::{DirectLaunchPlatform, LaunchCommand, OpenCommandPlatform, PlatformStrategy};
pub use release::{HttpReleaseSource, ReleaseAsset, ReleaseDescriptor, ReleaseSource};
pub use slot::{ExecutableSlot, RecoveryReport, SlotFs, SlotState, StdFs};
pub use version::{read_local_version, write_local_version, VersionTag};
