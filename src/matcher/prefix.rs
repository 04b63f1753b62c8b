//! Static literal prefix extraction from anchored regex patterns.
//!
//! The extracted prefix is a cheap pre-filter: every metric name the pattern
//! can match must start with it. Extraction is conservative and stops at the
//! first character that is not provably literal.

/// Returns the longest static literal prefix of an anchored pattern.
///
/// Only `[A-Za-z0-9_-]` and the escaped dot `\.` are treated as literal. A
/// literal immediately followed by a quantifier that permits zero repetitions
/// (`?`, `*`, `{`) is dropped again, and a pattern containing a top-level
/// alternation yields no prefix at all.
///
/// # Examples
///
/// ```rust
/// use metric_aggregator::matcher::regex_to_prefix;
///
/// assert_eq!(regex_to_prefix(r"^app\.requests\.(\w+)"), b"app.requests.");
/// assert_eq!(regex_to_prefix(r"app\.requests"), b"");
/// assert_eq!(regex_to_prefix(r"^servers?\.cpu"), b"server");
/// ```
pub fn regex_to_prefix(regex: &str) -> Vec<u8> {
    let bytes = regex.as_bytes();
    if bytes.first() != Some(&b'^') || has_alternation(bytes) {
        return Vec::new();
    }

    let mut prefix = Vec::new();
    // length of the prefix before the most recent literal was appended
    let mut before_last = 0;
    let mut i = 1;
    while i < bytes.len() {
        let ch = bytes[i];
        if ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'-' {
            before_last = prefix.len();
            prefix.push(ch);
            i += 1;
        } else if ch == b'\\' && bytes.get(i + 1) == Some(&b'.') {
            before_last = prefix.len();
            prefix.push(b'.');
            i += 2;
        } else {
            if matches!(ch, b'?' | b'*' | b'{') {
                prefix.truncate(before_last);
            }
            break;
        }
    }
    prefix
}

/// Whether the pattern contains an unescaped `|` outside every group and
/// character class.
fn has_alternation(bytes: &[u8]) -> bool {
    let mut in_class = false;
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'[' if !in_class => in_class = true,
            b']' if in_class => in_class = false,
            b'(' if !in_class => depth += 1,
            b')' if !in_class => depth = depth.saturating_sub(1),
            b'|' if !in_class && depth == 0 => return true,
            _ => {}
        }
        i += 1;
    }
    false
}
