use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::{ReplacementRule, ReplacementSet};
use crate::error::{map_io_err, ReplacerError, ReplacerResult};

/// Separator for inline `before=>after` rules
const INLINE_SEPARATOR: &str = "=>";

/// On-disk rules file: a list of `[[rule]]` tables
#[derive(Debug, Default, Serialize, Deserialize)]
struct RulesFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RuleEntry {
    before: String,
    #[serde(default)]
    after: String,
}

impl ReplacementRule {
    /// Parse `before=>after`, splitting on the first separator
    pub fn parse_inline(raw: &str) -> ReplacerResult<Self> {
        let (before, after) = raw.split_once(INLINE_SEPARATOR).ok_or_else(|| {
            ReplacerError::invalid_argument(format!(
                "rule '{}' has no '{}' separator",
                raw, INLINE_SEPARATOR
            ))
        })?;

        if before.is_empty() {
            return Err(ReplacerError::invalid_argument(format!(
                "rule '{}' has an empty pattern",
                raw
            )));
        }

        Ok(Self::new(before, after))
    }
}

impl ReplacementSet {
    /// Parse a TOML rules document. Entries with an empty `before` are
    /// skipped, mirroring blank rows in the input form.
    pub fn from_toml_str(raw: &str) -> ReplacerResult<Self> {
        let file: RulesFile = toml::from_str(raw)?;
        Ok(file
            .rules
            .into_iter()
            .filter(|entry| !entry.before.is_empty())
            .map(|entry| ReplacementRule::new(entry.before, entry.after))
            .collect())
    }

    pub fn to_toml_string(&self) -> ReplacerResult<String> {
        let file = RulesFile {
            rules: self
                .iter()
                .map(|rule| RuleEntry {
                    before: rule.pattern.clone(),
                    after: rule.replacement.clone(),
                })
                .collect(),
        };
        Ok(toml::to_string_pretty(&file)?)
    }
}

/// Load a TOML rules file from disk
pub fn load_rules_file(path: impl AsRef<Path>) -> ReplacerResult<ReplacementSet> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(map_io_err(path))?;
    let rules = ReplacementSet::from_toml_str(&raw).map_err(|e| {
        ReplacerError::parse_error(format!("{}: {}", path.display(), e))
    })?;
    info!("Loaded {} rule(s) from {}", rules.len(), path.display());
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_inline() {
        let rule = ReplacementRule::parse_inline("cat=>dog").unwrap();
        assert_eq!(rule, ReplacementRule::new("cat", "dog"));

        let rule = ReplacementRule::parse_inline("a=>b=>c").unwrap();
        assert_eq!(rule, ReplacementRule::new("a", "b=>c"));

        let rule = ReplacementRule::parse_inline("remove=>").unwrap();
        assert_eq!(rule.replacement, "");
    }

    #[test]
    fn test_parse_inline_errors() {
        assert!(ReplacementRule::parse_inline("no separator").is_err());
        let err = ReplacementRule::parse_inline("=>x").unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn test_from_toml_str() {
        let raw = r#"
[[rule]]
before = "hello"
after = "hi"

[[rule]]
before = ""
after = "ignored"

[[rule]]
before = "drop me"
"#;
        let rules = ReplacementSet::from_toml_str(raw).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.get(0), Some(&ReplacementRule::new("hello", "hi")));
        assert_eq!(rules.get(1), Some(&ReplacementRule::new("drop me", "")));
    }

    #[test]
    fn test_toml_file_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        let rules = ReplacementSet::from_pairs([("cat", "dog"), ("置き換え", "replace")]);
        fs::write(&path, rules.to_toml_string().unwrap()).unwrap();

        assert_eq!(load_rules_file(&path).unwrap(), rules);
    }

    #[test]
    fn test_load_rules_file_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        fs::write(&path, "[[rule]]\nafter = 3\n").unwrap();

        let err = load_rules_file(&path).unwrap_err();
        assert_eq!(err.kind(), "parse");
    }
}
