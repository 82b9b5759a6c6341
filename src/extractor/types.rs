//! Raw extraction output, prior to enrichment.

use crate::model::TitleKind;

/// One item pulled out of a watchlist page
///
/// Carries the provisional kind from the in-page heuristic; the
/// metadata classifier overrides it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedItem {
    /// Title identifier (`tt` + digits), parsed from the anchor href
    pub id: String,
    /// Cleaned title (no ordinal prefix, collapsed whitespace)
    pub title: String,
    /// 4-digit year from the surrounding container, if present
    pub year: Option<String>,
    /// Provisional classification from surrounding text tokens
    pub kind: TitleKind,
    /// True when the title did not come from the anchor's own text
    pub title_from_fallback: bool,
}
