//! Tests for the watchlist extraction pipeline: shadow-anchor
//! pre-filtering, deduplication, title cleanup, and the year/kind
//! heuristics, all over fixture HTML.

mod common;

use common::{FixtureItem, build_watchlist_html};
use watchscrape::extractor::{detect_access_block, extract_items};
use watchscrape::model::{ExtractionStats, TitleKind};

#[test]
fn shadow_anchors_are_filtered_before_dedup() {
    // 250 entries rendered twice (shadow + text) plus one tail entry
    // that only got its text anchor: 501 anchors total.
    let mut items = Vec::new();
    for i in 0..250 {
        items.push(FixtureItem::new(
            format!("tt{:07}", 1_000_000 + i),
            format!("{}. Film Number {i}", i + 1),
            "1999 1h 40m",
        ));
    }
    items.push(
        FixtureItem::new("tt7654321", "251. The Tail Entry", "2004 2h 10m").without_shadow(),
    );

    let html = build_watchlist_html(&items);
    let mut stats = ExtractionStats::default();
    let extracted = extract_items(&html, &mut stats);

    assert_eq!(extracted.len(), 251);
    assert_eq!(stats.total_anchors, 501);
    assert_eq!(stats.post_filter, 251);
    assert_eq!(stats.duplicates_skipped, 0);
    assert_eq!(stats.missing_id, 0);
}

#[test]
fn ordinal_prefixes_are_stripped_from_titles() {
    let html = build_watchlist_html(&[
        FixtureItem::new("tt0253474", "1. The Pianist", "2002 2h 30m"),
        FixtureItem::new("tt0389557", "410. Black Book", "2006 2h 25m"),
    ]);

    let mut stats = ExtractionStats::default();
    let extracted = extract_items(&html, &mut stats);

    assert_eq!(extracted.len(), 2);
    assert_eq!(extracted[0].title, "The Pianist");
    assert_eq!(extracted[1].title, "Black Book");
    assert_eq!(stats.title_fallbacks, 0);
}

#[test]
fn duplicate_ids_keep_first_occurrence() {
    // Same title rendered twice with text (pagination overlap, not a
    // shadow): second occurrence must be counted and dropped.
    let html = build_watchlist_html(&[
        FixtureItem::new("tt0110912", "1. Pulp Fiction", "1994 2h 34m"),
        FixtureItem::new("tt0110912", "2. Pulp Fiction", "1994 2h 34m"),
        FixtureItem::new("tt0137523", "3. Fight Club", "1999 2h 19m"),
    ]);

    let mut stats = ExtractionStats::default();
    let extracted = extract_items(&html, &mut stats);

    assert_eq!(extracted.len(), 2);
    assert_eq!(extracted[0].id, "tt0110912");
    assert_eq!(extracted[0].title, "Pulp Fiction");
    assert_eq!(extracted[1].id, "tt0137523");
    assert_eq!(stats.duplicates_skipped, 1);
}

#[test]
fn year_and_kind_come_from_the_item_container() {
    let html = build_watchlist_html(&[
        FixtureItem::new("tt0253474", "1. The Pianist", "2002 2h 30m"),
        FixtureItem::new("tt2861424", "2. Rick and Morty", "2013– TV Series"),
        FixtureItem::new("tt1234567", "3. Undated Obscurity", "1h 12m"),
    ]);

    let mut stats = ExtractionStats::default();
    let extracted = extract_items(&html, &mut stats);

    assert_eq!(extracted[0].year.as_deref(), Some("2002"));
    assert_eq!(extracted[0].kind, TitleKind::Movie);

    assert_eq!(extracted[1].year.as_deref(), Some("2013"));
    assert_eq!(extracted[1].kind, TitleKind::Series);

    assert_eq!(extracted[2].year, None);
    assert_eq!(extracted[2].kind, TitleKind::Movie);
}

#[test]
fn sentinel_and_short_anchor_texts_are_dropped() {
    let html = r#"
        <html><body>
        <li class="ipc-metadata-list-summary-item">
            <a href="/title/tt0068646/">The Godfather</a>
            <span>1972 2h 55m</span>
        </li>
        <a href="/title/tt0068646/">View title</a>
        <a href="/title/tt0068646/">›</a>
        <a href="/title/tt0068646/">ok</a>
        <a href="/title/tt0099999/">tt0099999</a>
        </body></html>
    "#;

    let mut stats = ExtractionStats::default();
    let extracted = extract_items(html, &mut stats);

    assert_eq!(extracted.len(), 1);
    assert_eq!(extracted[0].title, "The Godfather");
    assert_eq!(extracted[0].year.as_deref(), Some("1972"));
    assert_eq!(stats.total_anchors, 5);
    assert_eq!(stats.post_filter, 1);
}

#[test]
fn ordinal_only_anchor_falls_back_to_container_heading() {
    // Anchor text that is nothing but a rank never names the title; the
    // container's heading does.
    let html = r#"
        <html><body>
        <li class="ipc-metadata-list-summary-item">
            <h3 class="ipc-title__text">Black Book</h3>
            <a href="/title/tt0389557/">410.</a>
            <span>2006 2h 25m</span>
        </li>
        </body></html>
    "#;

    let mut stats = ExtractionStats::default();
    let extracted = extract_items(html, &mut stats);

    assert_eq!(extracted.len(), 1);
    assert_eq!(extracted[0].title, "Black Book");
    assert!(extracted[0].title_from_fallback);
    assert_eq!(stats.title_fallbacks, 1);
}

#[test]
fn ordinal_only_anchor_falls_back_to_sibling_text_nodes() {
    // No heading in the container and no aria-label/title attributes,
    // so resolution must reach the sibling-text rung. The title lives in
    // a bare text node next to the anchor; the sibling <span> element
    // and the anchor's own text must both stay out of it.
    let html = r#"
        <html><body>
        <li class="ipc-metadata-list-summary-item">
            <div>
                <span>88 metascore</span>
                <a href="/title/tt0095327/">88.</a>
                Grave of the Fireflies
            </div>
            <span>1988 1h 29m</span>
        </li>
        </body></html>
    "#;

    let mut stats = ExtractionStats::default();
    let extracted = extract_items(html, &mut stats);

    assert_eq!(extracted.len(), 1);
    assert_eq!(extracted[0].title, "Grave of the Fireflies");
    assert!(extracted[0].title_from_fallback);
    assert_eq!(extracted[0].year.as_deref(), Some("1988"));
    assert_eq!(stats.title_fallbacks, 1);
}

#[test]
fn anchors_without_parseable_ids_are_counted() {
    let html = r#"
        <html><body>
        <a href="/title/ttx/">A deceptive detail link about /title/tt pages</a>
        <a href="/title/tt0111161/">The Shawshank Redemption</a>
        </body></html>
    "#;

    let mut stats = ExtractionStats::default();
    let extracted = extract_items(html, &mut stats);

    assert_eq!(extracted.len(), 1);
    assert_eq!(extracted[0].id, "tt0111161");
    assert_eq!(stats.missing_id, 1);
}

#[test]
fn implausible_years_are_ignored() {
    let html = build_watchlist_html(&[FixtureItem::new(
        "tt0012349",
        "1. The Kid",
        "2077 was a typo, actually 1921 1h 8m",
    )]);

    let mut stats = ExtractionStats::default();
    let extracted = extract_items(&html, &mut stats);

    assert_eq!(extracted[0].year.as_deref(), Some("1921"));
}

#[test]
fn extraction_order_is_document_order() {
    let html = build_watchlist_html(&[
        FixtureItem::new("tt0000003", "1. Third Oldest", "2020 1h"),
        FixtureItem::new("tt0000002", "2. Second Oldest", "2021 1h"),
        FixtureItem::new("tt0000001", "3. First Oldest", "2022 1h"),
    ]);

    let mut stats = ExtractionStats::default();
    let extracted = extract_items(&html, &mut stats);

    let ids: Vec<&str> = extracted.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["tt0000003", "tt0000002", "tt0000001"]);
}

#[test]
fn access_blocks_are_detected() {
    assert!(matches!(
        detect_access_block("<html><body>This list is not public.</body></html>"),
        Some(watchscrape::ScrapeError::UpstreamPrivate)
    ));
    assert!(matches!(
        detect_access_block("<html><body><h1>404 Error</h1></body></html>"),
        Some(watchscrape::ScrapeError::UpstreamNotFound)
    ));
    assert!(detect_access_block("<html><body><ul></ul></body></html>").is_none());
}
