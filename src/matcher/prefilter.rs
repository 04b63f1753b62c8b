//! Cheap literal pre-filter applied before any regex evaluation.
//!
//! Most metric names offered to an aggregator do not belong to it. The
//! pre-filter rejects them with a prefix comparison and an optional substring
//! search so that the regex (and the match cache) only see plausible names.

use super::prefix::regex_to_prefix;
use crate::error::{AggregatorError, Result};
use aho_corasick::AhoCorasick;

/// Literal prefix and substring filter for metric names.
#[derive(Debug, Clone)]
pub struct PreFilter {
    /// Required prefix; explicit if configured, otherwise derived from the regex
    prefix: Vec<u8>,
    /// Whether `prefix` came from configuration rather than the regex
    explicit_prefix: bool,
    /// Required substring, searched with a single-pattern automaton
    substring: Option<SubstringFilter>,
}

#[derive(Debug, Clone)]
struct SubstringFilter {
    needle: String,
    automaton: AhoCorasick,
}

impl PreFilter {
    /// Build a pre-filter for `regex`.
    ///
    /// An explicit, non-empty `prefix` always takes precedence over the prefix
    /// derived from the regex. An empty `substring` disables substring checks.
    pub fn new(regex: &str, prefix: Option<&str>, substring: Option<&str>) -> Result<Self> {
        let (prefix, explicit_prefix) = match prefix.filter(|p| !p.is_empty()) {
            Some(p) => (p.as_bytes().to_vec(), true),
            None => (regex_to_prefix(regex), false),
        };

        let substring = match substring.filter(|s| !s.is_empty()) {
            Some(needle) => Some(SubstringFilter {
                needle: needle.to_string(),
                automaton: AhoCorasick::new([needle]).map_err(|e| {
                    AggregatorError::InvalidSubstring(format!("Substring '{needle}': {e}"))
                })?,
            }),
            None => None,
        };

        Ok(Self {
            prefix,
            explicit_prefix,
            substring,
        })
    }

    /// Checks if the name has the required prefix and/or substring.
    pub fn matches(&self, name: &[u8]) -> bool {
        if !name.starts_with(&self.prefix) {
            return false;
        }
        match &self.substring {
            Some(filter) => filter.automaton.is_match(name),
            None => true,
        }
    }

    /// The effective prefix (explicit or derived), possibly empty.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn has_explicit_prefix(&self) -> bool {
        self.explicit_prefix
    }

    pub fn substring(&self) -> Option<&str> {
        self.substring.as_ref().map(|s| s.needle.as_str())
    }
}
