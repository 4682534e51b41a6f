//! Feature value normalization.
//!
//! Missing or unusable values become the empty string; normalization never
//! fails.

use once_cell::sync::Lazy;
use regex::Regex;

use recofine_core::FeatureKind;

/// Values kept from a multi-valued feature.
pub const MAX_LIST_VALUES: usize = 5;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static LIST_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;|]").unwrap());

/// Normalize one raw feature value according to its kind.
pub fn normalize(value: Option<&str>, kind: FeatureKind) -> String {
    let value = match value {
        Some(v) => v,
        None => return String::new(),
    };
    match kind {
        FeatureKind::Keyword => keyword(value),
        FeatureKind::Text => WHITESPACE
            .replace_all(value.trim(), " ")
            .to_lowercase(),
        FeatureKind::List => LIST_SEPARATOR
            .split(value)
            .map(keyword)
            .filter(|v| !v.is_empty())
            .take(MAX_LIST_VALUES)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Lower-case with all whitespace removed ("Star Wars" → "starwars").
fn keyword(value: &str) -> String {
    WHITESPACE.replace_all(value, "").to_lowercase()
}
