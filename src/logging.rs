use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when RUST_LOG is not set
const DEFAULT_FILTER: &str = "multreplacer=info";
const VERBOSE_FILTER: &str = "multreplacer=debug";

/// Logger configuration
#[derive(Debug, Clone, Copy)]
pub struct LogOptions {
    /// Raise the default level to debug
    pub verbose: bool,
    /// Whether to enable ANSI color codes in logs
    pub ansi: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            ansi: true,
        }
    }
}

/// Build the env filter, honouring RUST_LOG when present
fn build_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Initialize logging to stderr.
///
/// Returns false when a global subscriber was already installed, which is
/// not treated as an error.
pub fn init_logging(options: LogOptions) -> bool {
    let installed = fmt::Subscriber::builder()
        .with_ansi(options.ansi)
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(options.verbose))
        .with_target(options.verbose)
        .try_init()
        .is_ok();

    if installed {
        info!("Initializing multreplacer v{}", crate::version());
        debug!("Logging options: {:?}", options);
    }

    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        let _ = init_logging(LogOptions::default());
        assert!(!init_logging(LogOptions {
            verbose: true,
            ansi: false
        }));
    }
}
