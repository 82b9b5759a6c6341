//! Classification override table.
//!
//! The popularity tie-break between movie and series search results is
//! unreliable for a handful of titles that exist prominently as both.
//! Overrides are data, not logic: operators extend the table via a JSON
//! file (`KIND_OVERRIDES_PATH`, `{"normalized title": "movie"|"series"}`)
//! without touching code.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use crate::model::TitleKind;
use crate::utils::titles::normalize_title;

/// Titles whose popularity comparison is known to mislead
const BUILTIN_OVERRIDES: &[(&str, TitleKind)] = &[
    ("fargo", TitleKind::Movie),
    ("scream", TitleKind::Movie),
    ("westworld", TitleKind::Series),
    ("hannibal", TitleKind::Series),
    ("shogun", TitleKind::Series),
    ("the office", TitleKind::Series),
];

/// Normalized-title → kind override table
#[derive(Debug, Clone, Default)]
pub struct KindOverrides {
    map: HashMap<String, TitleKind>,
}

impl KindOverrides {
    /// Built-in table only
    #[must_use]
    pub fn builtin() -> Self {
        let map = BUILTIN_OVERRIDES
            .iter()
            .map(|(title, kind)| ((*title).to_string(), *kind))
            .collect();
        Self { map }
    }

    /// Built-in table extended (and shadowed) by an operator data file
    ///
    /// A missing or malformed file degrades to the built-in table with a
    /// warning; overrides are never worth failing startup over.
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        let mut table = Self::builtin();
        let Some(path) = path else {
            return table;
        };

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("cannot read kind overrides {}: {e}", path.display());
                return table;
            }
        };

        match serde_json::from_str::<HashMap<String, TitleKind>>(&raw) {
            Ok(loaded) => {
                let count = loaded.len();
                for (title, kind) in loaded {
                    table.map.insert(normalize_title(&title), kind);
                }
                info!("loaded {count} kind overrides from {}", path.display());
            }
            Err(e) => warn!("malformed kind overrides {}: {e}", path.display()),
        }

        table
    }

    /// Look up an override for an already-normalized title
    #[must_use]
    pub fn get(&self, normalized_title: &str) -> Option<TitleKind> {
        self.map.get(normalized_title).copied()
    }
}
