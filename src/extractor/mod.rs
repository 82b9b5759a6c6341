//! Page extractor: controlled scrolling plus DOM analysis.
//!
//! The scroll half drives the live page; the parse half is pure Rust over
//! the serialized DOM, which keeps the shadow-duplicate filter and title
//! resolution unit-testable without a browser.

pub mod parse;
pub mod scroll;
pub mod types;

use anyhow::Context;
use chromiumoxide::Page;
use tracing::{debug, warn};

use crate::error::{ScrapeError, ScrapeResult};
use crate::model::ExtractionStats;

pub use parse::{detect_access_block, extract_items};
pub use scroll::settle_virtual_list;
pub use types::ExtractedItem;

/// One page's worth of extracted items plus diagnostics
#[derive(Debug, Clone)]
pub struct PageExtract {
    pub items: Vec<ExtractedItem>,
    pub stats: ExtractionStats,
}

/// Scroll out the virtual list on a loaded watchlist page and extract
/// its deduplicated item sequence
///
/// Access-blocked pages (private watchlist, unknown user) surface as the
/// corresponding fatal error so the caller can stop retrying.
pub async fn extract_watchlist_page(page: &Page) -> ScrapeResult<PageExtract> {
    let outcome = settle_virtual_list(page)
        .await
        .context("scroll pass failed")?;

    let html = page.content().await.context("failed to read page DOM")?;

    let mut stats = ExtractionStats::default();
    let items = extract_items(&html, &mut stats);

    if items.is_empty() {
        if let Some(block) = detect_access_block(&html) {
            warn!("watchlist page is access-blocked: {}", block.kind());
            return Err(block);
        }
    }

    debug!(
        "extracted {} items ({} anchors, {} post-filter, {} scroll iterations)",
        items.len(),
        stats.total_anchors,
        stats.post_filter,
        outcome.iterations
    );

    Ok(PageExtract { items, stats })
}
