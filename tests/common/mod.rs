//! Shared fixtures for the watchscrape test suite.

/// One watchlist entry to render into fixture HTML
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct FixtureItem {
    pub id: String,
    /// Raw title as the list renders it (may carry an ordinal prefix)
    pub raw_title: String,
    /// Metadata line under the title ("2002 2h 30m", "2019–2023 TV Series")
    pub meta_line: String,
    /// Render the empty shadow anchor the virtual scroller emits
    pub with_shadow: bool,
}

#[allow(dead_code)]
impl FixtureItem {
    pub fn new(
        id: impl Into<String>,
        raw_title: impl Into<String>,
        meta_line: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            raw_title: raw_title.into(),
            meta_line: meta_line.into(),
            with_shadow: true,
        }
    }

    pub fn without_shadow(mut self) -> Self {
        self.with_shadow = false;
        self
    }
}

/// Render a watchlist page the way the source's detail view lays it out:
/// each entry is a summary item holding a text-bearing title anchor and,
/// when the virtual scroller has its way, an empty poster-overlay anchor
/// pointing at the same title.
#[allow(dead_code)]
pub fn build_watchlist_html(items: &[FixtureItem]) -> String {
    let mut rows = String::new();
    for item in items {
        let shadow = if item.with_shadow {
            format!(
                r#"<div class="ipc-poster"><a href="/title/{id}/?ref_=wl_li_i" class="ipc-lockup-overlay"></a></div>"#,
                id = item.id
            )
        } else {
            String::new()
        };
        rows.push_str(&format!(
            r#"
            <li class="ipc-metadata-list-summary-item">
                {shadow}
                <div class="ipc-metadata-list-summary-item__c">
                    <a class="ipc-title-link-wrapper" href="/title/{id}/?ref_=wl_li_tt"><h3 class="ipc-title__text">{title}</h3></a>
                    <span class="dli-title-metadata">{meta}</span>
                </div>
            </li>
            "#,
            shadow = shadow,
            id = item.id,
            title = item.raw_title,
            meta = item.meta_line,
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><title>Watchlist</title></head>
<body>
    <nav><a href="/chart/top">Top charts</a></nav>
    <ul class="ipc-metadata-list">{rows}</ul>
</body>
</html>"#
    )
}
