//! Glob patterns for key invalidation
//!
//! Only `*` is special and matches any run of characters, including an
//! empty one. Everything else matches literally and the pattern is
//! anchored to the whole key.

use regex::Regex;

use crate::error::CacheError;

/// Translate a `*` glob into an anchored regular expression
pub fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push('^');
    for (i, literal) in pattern.split('*').enumerate() {
        if i > 0 {
            regex.push_str(".*");
        }
        regex.push_str(&regex::escape(literal));
    }
    regex.push('$');
    regex
}

pub fn compile_glob(pattern: &str) -> Result<Regex, CacheError> {
    Regex::new(&glob_to_regex(pattern)).map_err(|e| CacheError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
