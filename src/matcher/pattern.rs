//! Full regex match and output key expansion.

use crate::error::Result;
use regex::bytes::Regex;

/// Compiled metric name pattern together with its output format template.
///
/// The template uses the regex replacement syntax: `$1` or `${1}` for
/// positional groups and `$name` or `${name}` for named groups. A template
/// without placeholders produces the same output key for every match.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
    format: String,
}

impl PatternMatcher {
    pub fn new(regex: &str, format: &str) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(regex)?,
            format: format.to_string(),
        })
    }

    /// Match `name` and expand the output key, or `None` if it does not match.
    pub fn match_name(&self, name: &[u8]) -> Option<String> {
        let captures = self.regex.captures(name)?;
        let mut key = Vec::with_capacity(self.format.len());
        captures.expand(self.format.as_bytes(), &mut key);
        Some(match String::from_utf8(key) {
            Ok(key) => key,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn format(&self) -> &str {
        &self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_output_key() {
        let matcher = PatternMatcher::new(r"^app\.requests\.", "app.requests.total").unwrap();
        assert_eq!(
            matcher.match_name(b"app.requests.web1").as_deref(),
            Some("app.requests.total")
        );
        assert_eq!(matcher.match_name(b"app.responses.web1"), None);
    }

    #[test]
    fn test_positional_expansion() {
        let matcher =
            PatternMatcher::new(r"^servers\.([^.]+)\.cpu\.(\w+)$", "cpu.$2.${1}_total").unwrap();
        assert_eq!(
            matcher.match_name(b"servers.web1.cpu.user").as_deref(),
            Some("cpu.user.web1_total")
        );
    }

    #[test]
    fn test_named_expansion() {
        let matcher = PatternMatcher::new(
            r"^stats\.(?P<dc>[a-z]+)\.(?P<host>[^.]+)\.requests$",
            "stats.${dc}.all.requests",
        )
        .unwrap();
        assert_eq!(
            matcher.match_name(b"stats.ams.web12.requests").as_deref(),
            Some("stats.ams.all.requests")
        );
        assert_eq!(matcher.match_name(b"stats.ams.web12.errors"), None);
    }

    #[test]
    fn test_unanchored_match_searches() {
        let matcher = PatternMatcher::new(r"cpu\.(\w+)", "all.cpu.$1").unwrap();
        assert_eq!(
            matcher.match_name(b"servers.web1.cpu.idle").as_deref(),
            Some("all.cpu.idle")
        );
    }

    #[test]
    fn test_invalid_regex() {
        let err = PatternMatcher::new(r"^foo(", "x").unwrap_err();
        assert!(err.is_configuration_error());
    }
}
