//! Multi-pattern replacement engine.
//!
//! All rules are applied to the original document in a single left-to-right
//! scan. Text produced by a replacement is never scanned again, so rules such
//! as `a -> b` and `b -> c` do not cascade. When several patterns match at the
//! same position the longest one wins, and on equal length the rule supplied
//! first wins. Scanning resumes right after the consumed span.

mod rules;

pub use rules::load_rules_file;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One (pattern, replacement) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementRule {
    /// Text to find; an empty pattern never matches
    pub pattern: String,
    /// Text to substitute, possibly empty
    pub replacement: String,
}

impl ReplacementRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    /// Whether this rule can ever match
    pub fn is_active(&self) -> bool {
        !self.pattern.is_empty()
    }
}

/// Ordered set of rules for one engine invocation.
///
/// A repeated pattern keeps the position of its first occurrence and takes
/// the replacement supplied last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementSet {
    rules: Vec<ReplacementRule>,
}

impl ReplacementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, P, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, R)>,
        P: Into<String>,
        R: Into<String>,
    {
        let mut set = Self::new();
        for (pattern, replacement) in pairs {
            set.push(ReplacementRule::new(pattern, replacement));
        }
        set
    }

    /// Append a rule, overwriting the replacement of an existing identical
    /// pattern in place
    pub fn push(&mut self, rule: ReplacementRule) {
        if let Some(existing) = self.rules.iter_mut().find(|r| r.pattern == rule.pattern) {
            debug!("Duplicate pattern {:?}, last replacement wins", rule.pattern);
            existing.replacement = rule.replacement;
        } else {
            self.rules.push(rule);
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplacementRule> {
        self.rules.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ReplacementRule> {
        self.rules.get(index)
    }
}

impl Extend<ReplacementRule> for ReplacementSet {
    fn extend<T: IntoIterator<Item = ReplacementRule>>(&mut self, iter: T) {
        for rule in iter {
            self.push(rule);
        }
    }
}

impl FromIterator<ReplacementRule> for ReplacementSet {
    fn from_iter<T: IntoIterator<Item = ReplacementRule>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// How often each rule fired during one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementReport {
    /// Hit count per rule, in ReplacementSet order
    pub counts: Vec<usize>,
}

impl ReplacementReport {
    fn new(rule_count: usize) -> Self {
        Self {
            counts: vec![0; rule_count],
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn count_for(&self, index: usize) -> usize {
        self.counts.get(index).copied().unwrap_or(0)
    }
}

/// Candidate rules grouped by the first byte of their pattern, each group
/// ordered by descending pattern length and then by rule position
struct CandidateIndex<'r> {
    rules: &'r ReplacementSet,
    by_first_byte: HashMap<u8, Vec<usize>>,
}

impl<'r> CandidateIndex<'r> {
    fn build(rules: &'r ReplacementSet) -> Self {
        let mut by_first_byte: HashMap<u8, Vec<usize>> = HashMap::new();
        for (index, rule) in rules.iter().enumerate() {
            if let Some(&first) = rule.pattern.as_bytes().first() {
                by_first_byte.entry(first).or_default().push(index);
            }
        }
        for group in by_first_byte.values_mut() {
            // stable sort keeps supplied order among equal lengths
            group.sort_by(|&a, &b| rules.rules[b].pattern.len().cmp(&rules.rules[a].pattern.len()));
        }
        Self {
            rules,
            by_first_byte,
        }
    }

    /// Index of the winning rule at byte offset `pos`
    fn best_match(&self, haystack: &[u8], pos: usize) -> Option<usize> {
        let group = self.by_first_byte.get(&haystack[pos])?;
        let rest = &haystack[pos..];
        group
            .iter()
            .copied()
            .find(|&index| rest.starts_with(self.rules.rules[index].pattern.as_bytes()))
    }
}

/// Apply every rule to `document` in one simultaneous pass
pub fn apply(document: &str, rules: &ReplacementSet) -> String {
    apply_with_report(document, rules).0
}

/// Same as [`apply`], also reporting how often each rule fired
pub fn apply_with_report(document: &str, rules: &ReplacementSet) -> (String, ReplacementReport) {
    let mut report = ReplacementReport::new(rules.len());
    if document.is_empty() || !rules.iter().any(ReplacementRule::is_active) {
        return (document.to_string(), report);
    }

    let index = CandidateIndex::build(rules);
    let bytes = document.as_bytes();
    let mut output = String::with_capacity(document.len());
    let mut pos = 0;
    let mut copied_up_to = 0;

    while pos < bytes.len() {
        match index.best_match(bytes, pos) {
            Some(rule_index) => {
                let rule = &rules.rules[rule_index];
                output.push_str(&document[copied_up_to..pos]);
                output.push_str(&rule.replacement);
                pos += rule.pattern.len();
                copied_up_to = pos;
                report.counts[rule_index] += 1;
            }
            None => {
                // patterns are whole strings, so pos always sits on a char boundary
                pos += document[pos..].chars().next().map_or(1, char::len_utf8);
            }
        }
    }
    output.push_str(&document[copied_up_to..]);

    debug!(
        "Applied {} rule(s): {} replacement(s), {} -> {} bytes",
        rules.len(),
        report.total(),
        document.len(),
        output.len()
    );

    (output, report)
}
