// MultReplacer - simultaneous multi-pattern text replacement with a
// self-updating host

pub mod core;
pub mod document;
pub mod error;
pub mod logging;
pub mod replace;
pub mod update;

pub use document::{load_document, save_document};
pub use error::{ReplacerError, ReplacerResult};
pub use replace::{ReplacementReport, ReplacementRule, ReplacementSet};
pub use update::{UpdateOrchestrator, UpdateResult};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Replace every rule pattern in `document` in one simultaneous pass
pub fn apply_replacements(document: &str, rules: &ReplacementSet) -> String {
    replace::apply(document, rules)
}

/// Run the startup update check for the running executable. Call this on
/// every start: an interrupted swap is repaired even when `update.enabled`
/// is off, in which case the result is [`UpdateResult::Disabled`].
///
/// Returns [`UpdateResult::Failed`] instead of an error when the orchestrator
/// cannot even be set up, so the caller can always continue.
pub async fn check_and_update(config: &core::AppConfig) -> UpdateResult {
    match UpdateOrchestrator::from_config(config) {
        Ok(mut orchestrator) => orchestrator.check_and_update().await,
        Err(error) => {
            tracing::error!("Could not set up the update check: {}", error);
            UpdateResult::Failed {
                phase: update::UpdatePhase::Idle,
                error,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_replacements_is_simultaneous() {
        let rules = ReplacementSet::from_pairs([("a", "b"), ("b", "c")]);
        assert_eq!(apply_replacements("aab", &rules), "bbc");
    }

    #[tokio::test]
    async fn test_disabled_update_check() {
        let mut config = core::AppConfig::default();
        config.update.enabled = false;
        assert!(matches!(check_and_update(&config).await, UpdateResult::Disabled));
    }
}
