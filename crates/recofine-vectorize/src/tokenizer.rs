//! Word tokenizer: runs of two or more word characters, lower-cased.

use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").unwrap());

/// Split `text` into lower-cased tokens. Single characters are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}
