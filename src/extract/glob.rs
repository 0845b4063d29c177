//! Glob matching of object keys
//!
//! Keys are matched in full, relative to the bucket root: `*` and `?` stay
//! within one `/`-separated segment, `**` spans any number of segments and
//! `[...]` is a character class.

use crate::error::{ExtractError, Result};
use glob::{MatchOptions, Pattern as GlobPattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Characters that make a pattern segment a glob
const GLOB_META: &[char] = &['*', '?', '['];

/// Split a pattern into its literal directory prefix and the glob remainder
///
/// Returns `(pattern, None)` when the pattern has no glob metacharacters.
/// Otherwise the prefix ends at the last `/` before the first metacharacter
/// and may be empty.
pub fn split_pattern(pattern: &str) -> (&str, Option<&str>) {
    match pattern.find(GLOB_META) {
        None => (pattern, None),
        Some(first_meta) => {
            let split = pattern[..first_meta].rfind('/').map_or(0, |idx| idx + 1);
            (&pattern[..split], Some(&pattern[split..]))
        }
    }
}

/// Check if a pattern contains glob metacharacters
pub fn is_glob(pattern: &str) -> bool {
    split_pattern(pattern).1.is_some()
}

/// Compiled glob pattern for object keys
#[derive(Debug, Clone)]
pub struct KeyMatcher {
    pattern: String,
    compiled: GlobPattern,
}

impl KeyMatcher {
    /// Compile a pattern, rejecting invalid syntax before any remote call
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = pattern.trim_start_matches('/');
        if pattern.is_empty() {
            return Err(ExtractError::Config("glob pattern is empty".to_string()));
        }

        let compiled = GlobPattern::new(pattern).map_err(|e| {
            ExtractError::Config(format!("invalid glob pattern '{}': {}", pattern, e))
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            compiled,
        })
    }

    /// The pattern as given, without a leading `/`
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Check if a key matches the pattern
    pub fn matches(&self, key: &str) -> bool {
        self.compiled.matches_with(key, MATCH_OPTIONS)
    }

    /// Prefix to hand to the store so it only lists candidate keys
    ///
    /// A pattern without metacharacters names a single object and is used as
    /// the prefix verbatim.
    pub fn listing_prefix(&self) -> Option<String> {
        match split_pattern(&self.pattern) {
            (prefix, _) if prefix.is_empty() => None,
            (prefix, _) => Some(prefix.to_string()),
        }
    }
}
