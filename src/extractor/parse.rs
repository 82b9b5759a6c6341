//! Watchlist DOM analysis.
//!
//! Works over the serialized post-scroll DOM so the whole pipeline is pure
//! and testable against fixture HTML. The critical step is the pre-filter:
//! the source's virtual scroller renders every entry twice, once as an
//! empty "shadow" anchor and once with visible text. Shadow anchors MUST
//! be dropped before id-based deduplication, because document order can
//! put the empty copy first and dedup-after would then keep the wrong one.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::ScrapeError;
use crate::model::{ExtractionStats, TitleKind, is_plausible_year};
use crate::utils::titles::{clean_title, collapse_whitespace};

use super::types::ExtractedItem;

static TITLE_ANCHOR_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="/title/tt"]"#).expect("anchor selector"));

/// Title child selectors tried inside the item container, newest site
/// markup first
static CONTAINER_TITLE_SELS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["h3.ipc-title__text", ".ipc-title__text", "h3"]
        .iter()
        .map(|s| Selector::parse(s).expect("container title selector"))
        .collect()
});

static TITLE_ID_IN_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/title/(tt\d+)").expect("href id regex"));

static BARE_TITLE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^tt\d+$").expect("bare id regex"));

/// Anchor text that is nothing but a list ordinal ("410.", "12")
static ORDINAL_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.?$").expect("ordinal-only regex"));

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(19|20)\d{2}").expect("year regex"));

static SERIES_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(tv|series|show|episode)s?\b").expect("series token regex"));

/// Navigational anchor texts the list renderer emits around real entries
const SENTINEL_TEXTS: &[&str] = &["View title", "See more", "›", "‹", "…"];

/// Ancestor hops before we assume we've left the item card
const MAX_CONTAINER_HOPS: usize = 6;

/// Container text longer than this means we walked into the whole list
const MAX_CONTAINER_TEXT: usize = 800;

/// Markers the source renders instead of a watchlist
const PRIVATE_MARKERS: &[&str] = &[
    "this list is not public",
    "list is private",
    "private list",
];
const NOT_FOUND_MARKERS: &[&str] = &["404 error", "error 404", "page not found"];

/// Classify an access-blocked page, if this HTML is one
pub fn detect_access_block(html: &str) -> Option<ScrapeError> {
    let lower = html.to_lowercase();
    if PRIVATE_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(ScrapeError::UpstreamPrivate);
    }
    if NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(ScrapeError::UpstreamNotFound);
    }
    None
}

/// Extract the deduplicated item sequence from a watchlist page
///
/// Pipeline, in document order: collect title anchors → pre-filter
/// shadow/sentinel anchors → parse ids → first-occurrence dedup →
/// resolve title/year/kind. Counters accumulate into `stats`.
pub fn extract_items(html: &str, stats: &mut ExtractionStats) -> Vec<ExtractedItem> {
    let doc = Html::parse_document(html);
    let mut seen: HashSet<String> = HashSet::new();
    let mut items = Vec::new();

    for anchor in doc.select(&TITLE_ANCHOR_SEL) {
        stats.total_anchors += 1;

        let raw_text = collapse_whitespace(&anchor.text().collect::<String>());
        if is_shadow_or_sentinel(&raw_text) {
            continue;
        }
        stats.post_filter += 1;

        let Some(href) = anchor.value().attr("href") else {
            stats.missing_id += 1;
            continue;
        };
        let Some(id) = TITLE_ID_IN_HREF
            .captures(href)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            stats.missing_id += 1;
            continue;
        };

        if !seen.insert(id.clone()) {
            stats.duplicates_skipped += 1;
            continue;
        }

        let container = item_container(anchor);
        let container_text = container.map(|c| bounded_text(c)).unwrap_or_default();

        let (title, fallback) = resolve_title(anchor, container, &raw_text, &id);
        if fallback {
            stats.title_fallbacks += 1;
        }

        let year = YEAR_RE
            .find_iter(&container_text)
            .map(|m| m.as_str().to_string())
            .find(|y| is_plausible_year(y));

        let kind = if SERIES_TOKEN_RE.is_match(&container_text) {
            TitleKind::Series
        } else {
            TitleKind::Movie
        };

        items.push(ExtractedItem {
            id,
            title,
            year,
            kind,
            title_from_fallback: fallback,
        });
    }

    items
}

/// Pre-filter predicate: shadow anchors and navigational chrome
fn is_shadow_or_sentinel(text: &str) -> bool {
    text.is_empty()
        || BARE_TITLE_ID.is_match(text)
        || SENTINEL_TEXTS.contains(&text)
        || text.chars().count() <= 2
}

/// Nearest ancestor that looks like the per-item card
fn item_container(anchor: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut fallback = None;
    for (hops, node) in anchor.ancestors().enumerate() {
        if hops >= MAX_CONTAINER_HOPS {
            break;
        }
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        let class = el.value().attr("class").unwrap_or("");
        if el.value().name() == "li"
            || class.contains("lister-item")
            || class.contains("ipc-metadata-list-summary-item")
        {
            return Some(el);
        }
        fallback = Some(el);
    }
    fallback
}

/// Container text, truncated defensively if we escaped the item card
fn bounded_text(el: ElementRef<'_>) -> String {
    let text = collapse_whitespace(&el.text().collect::<String>());
    if text.len() > MAX_CONTAINER_TEXT {
        let mut end = MAX_CONTAINER_TEXT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text[..end].to_string()
    } else {
        text
    }
}

/// Resolve the item title, preferring the anchor's own text
///
/// Priority: anchor text → container title child → `aria-label` →
/// `title` attribute → sibling text nodes → identifier-derived
/// fallback. Returns `(title, used_fallback)`.
fn resolve_title(
    anchor: ElementRef<'_>,
    container: Option<ElementRef<'_>>,
    raw_text: &str,
    id: &str,
) -> (String, bool) {
    let cleaned = clean_title(raw_text);
    if !cleaned.is_empty() && !ORDINAL_ONLY.is_match(&cleaned) {
        return (cleaned, false);
    }

    if let Some(container) = container {
        for sel in CONTAINER_TITLE_SELS.iter() {
            if let Some(heading) = container.select(sel).next() {
                let text = clean_title(&heading.text().collect::<String>());
                if !text.is_empty() {
                    return (text, true);
                }
            }
        }
    }

    for attr in ["aria-label", "title"] {
        if let Some(value) = anchor.value().attr(attr) {
            let text = clean_title(value);
            if !text.is_empty() {
                return (text, true);
            }
        }
    }

    // Sibling TEXT nodes only: the anchor's own text and any sibling
    // elements stay out of the rung.
    let sibling_text = sibling_text_nodes(anchor);
    let text = clean_title(&sibling_text);
    if !text.is_empty() && !BARE_TITLE_ID.is_match(&text) {
        return (text, true);
    }

    (format!("Untitled ({id})"), true)
}

/// Concatenated text nodes adjacent to the anchor, document order
fn sibling_text_nodes(anchor: ElementRef<'_>) -> String {
    let Some(parent) = anchor.parent() else {
        return String::new();
    };

    parent
        .children()
        .filter(|node| node.id() != anchor.id())
        .filter_map(|node| node.value().as_text().map(|t| t.text.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}
