//! Controlled scrolling for virtually scrolled lists.
//!
//! The source renders watchlist entries lazily as the viewport descends.
//! We scroll to the bottom repeatedly, watching the title-anchor count,
//! and stop once it stops growing (or at the absolute cap), then return
//! to the top and let the DOM stabilize.

use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::Page;
use tracing::{debug, trace};

use crate::utils::constants::{SCROLL_MAX_ITERATIONS, SCROLL_SETTLE_MS, SCROLL_STAGNANT_LIMIT};

const COUNT_TITLE_ANCHORS: &str =
    r#"document.querySelectorAll('a[href*="/title/tt"]').length"#;

/// Result of one scroll pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub iterations: u32,
    pub anchor_count: u64,
}

/// Drive the page's virtual scroller until the item list stops growing
pub async fn settle_virtual_list(page: &Page) -> Result<ScrollOutcome> {
    let mut last_count: u64 = 0;
    let mut stagnant = 0u32;
    let mut iterations = 0u32;

    while iterations < SCROLL_MAX_ITERATIONS {
        iterations += 1;

        page.evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .context("scroll-to-bottom failed")?;
        tokio::time::sleep(Duration::from_millis(SCROLL_SETTLE_MS)).await;

        let count: u64 = page
            .evaluate(COUNT_TITLE_ANCHORS)
            .await
            .context("anchor count failed")?
            .into_value()
            .context("anchor count was not numeric")?;

        trace!("scroll iteration {iterations}: {count} title anchors");

        if count > last_count {
            last_count = count;
            stagnant = 0;
        } else {
            stagnant += 1;
            if stagnant >= SCROLL_STAGNANT_LIMIT {
                break;
            }
        }
    }

    // Let late lazy-loads land, then return to the top so the virtual
    // scroller re-renders the head of the list before we snapshot.
    tokio::time::sleep(Duration::from_secs(2)).await;
    page.evaluate("window.scrollTo(0, 0)")
        .await
        .context("scroll-to-top failed")?;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    debug!("scroll settled after {iterations} iterations, {last_count} anchors");
    Ok(ScrollOutcome {
        iterations,
        anchor_count: last_count,
    })
}
