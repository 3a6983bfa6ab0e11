use std::ffi::OsString;
use std::path::Path;

/// A process to start when relaunching into the new executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
}

/// Per-OS conventions for release assets and relaunching
pub trait PlatformStrategy: Send + Sync {
    /// Short platform label for logs
    fn name(&self) -> &'static str;

    /// Name (or name fragment) of the release asset for this platform
    fn asset_name(&self) -> &str;

    /// How to start the executable at `path`
    fn launch_command(&self, path: &Path) -> LaunchCommand;
}

/// macOS: the asset is a disk image handed to `open`
#[derive(Debug, Clone, Default)]
pub struct OpenCommandPlatform;

impl PlatformStrategy for OpenCommandPlatform {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn asset_name(&self) -> &str {
        "app.dmg"
    }

    fn launch_command(&self, path: &Path) -> LaunchCommand {
        LaunchCommand {
            program: OsString::from("open"),
            args: vec![path.as_os_str().to_os_string()],
        }
    }
}

/// Everything else: the asset is the executable itself, started directly
#[derive(Debug, Clone)]
pub struct DirectLaunchPlatform {
    asset_name: String,
}

impl DirectLaunchPlatform {
    pub fn new(asset_name: impl Into<String>) -> Self {
        Self {
            asset_name: asset_name.into(),
        }
    }
}

impl Default for DirectLaunchPlatform {
    fn default() -> Self {
        Self::new("app.exe")
    }
}

impl PlatformStrategy for DirectLaunchPlatform {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn asset_name(&self) -> &str {
        &self.asset_name
    }

    fn launch_command(&self, path: &Path) -> LaunchCommand {
        LaunchCommand {
            program: path.as_os_str().to_os_string(),
            args: Vec::new(),
        }
    }
}

/// Strategy for the platform this binary was built for
pub fn current() -> Box<dyn PlatformStrategy> {
    if cfg!(target_os = "macos") {
        Box::new(OpenCommandPlatform)
    } else {
        Box::new(DirectLaunchPlatform::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_command_platform() {
        let platform = OpenCommandPlatform;
        assert_eq!(platform.asset_name(), "app.dmg");
        let cmd = platform.launch_command(Path::new("/Applications/app"));
        assert_eq!(cmd.program, OsString::from("open"));
        assert_eq!(cmd.args, vec![OsString::from("/Applications/app")]);
    }

    #[test]
    fn test_direct_launch_platform() {
        let platform = DirectLaunchPlatform::default();
        assert_eq!(platform.asset_name(), "app.exe");
        let cmd = platform.launch_command(Path::new("/opt/app.exe"));
        assert_eq!(cmd.program, OsString::from("/opt/app.exe"));
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_current_matches_target() {
        let platform = current();
        if cfg!(target_os = "macos") {
            assert_eq!(platform.name(), "macos");
        } else {
            assert_eq!(platform.name(), "direct");
        }
    }
}
