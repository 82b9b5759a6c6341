//! Title string handling
//!
//! The source site renders list entries with a numeric ordinal prefix
//! ("410. Black Book") that must never reach storage or metadata lookups,
//! and the metadata cache keys on an aggressively normalized title form.

use once_cell::sync::Lazy;
use regex::Regex;

/// Leading ordinal prefix emitted by the source's list renderer
static ORDINAL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s+").expect("ordinal prefix regex"));

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

static NON_ALNUM_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("non-alnum regex"));

/// Collapse internal whitespace runs to single spaces and trim the ends
pub fn collapse_whitespace(raw: &str) -> String {
    WHITESPACE_RUN.replace_all(raw.trim(), " ").into_owned()
}

/// Clean a raw extracted title for storage
///
/// Strips the leading `<digits>. ` ordinal and collapses whitespace.
/// Idempotent: cleaning a cleaned title is a no-op.
pub fn clean_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = ORDINAL_PREFIX.replace(trimmed, "");
    collapse_whitespace(&stripped)
}

/// Normalize a title into its metadata lookup form
///
/// Lowercased, every non-alphanumeric run collapsed to a single space,
/// trimmed. Idempotent.
pub fn normalize_title(title: &str) -> String {
    let lower = title.to_lowercase();
    NON_ALNUM_RUN.replace_all(&lower, " ").trim().to_string()
}

/// Build the metadata cache key for a `(title, year)` lookup
///
/// `normalized title` + `_` + (`year` | `"unknown"`).
pub fn metadata_key(title: &str, year: Option<&str>) -> String {
    format!("{}_{}", normalize_title(title), year.unwrap_or("unknown"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_prefix_is_stripped() {
        assert_eq!(clean_title("410. Black Book"), "Black Book");
        assert_eq!(clean_title("1. The Pianist"), "The Pianist");
    }

    #[test]
    fn titles_with_interior_numbers_survive() {
        assert_eq!(clean_title("2001: A Space Odyssey"), "2001: A Space Odyssey");
        assert_eq!(clean_title("300"), "300");
        // decimal point without trailing space is not an ordinal
        assert_eq!(clean_title("8.5"), "8.5");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let once = clean_title("  12.  Blade   Runner ");
        assert_eq!(clean_title(&once), once);
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_title("The Pianist!");
        assert_eq!(normalize_title(&once), once);
        assert_eq!(once, "the pianist");
    }

    #[test]
    fn metadata_key_shape() {
        assert_eq!(metadata_key("The Pianist", None), "the pianist_unknown");
        assert_eq!(metadata_key("The Pianist", Some("2002")), "the pianist_2002");
    }
}
