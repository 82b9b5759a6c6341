//! Per-egress-identity browser session persistence.
//!
//! Cookies and local-storage snapshots survive between scrape attempts so
//! the source site sees a returning visitor rather than a cold browser.
//! Blobs live on the filesystem under `SESSION_DIR`, one JSON file per
//! identity, with a read-through in-memory cache. Save failures are logged
//! and swallowed: losing a session costs a warm-up, never a job.

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One browser cookie, in CDP wire shape (camelCase fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

/// Local-storage entries captured for one origin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginStorage {
    pub origin: String,
    pub entries: Vec<(String, String)>,
}

/// Opaque browser storage state for one egress identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<SessionCookie>,
    #[serde(default)]
    pub origins: Vec<OriginStorage>,
}

impl StorageState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.is_empty()
    }
}

/// Filesystem-backed session store with in-memory read-through
#[derive(Debug)]
pub struct SessionStore {
    dir: PathBuf,
    memo: DashMap<String, StorageState>,
}

impl SessionStore {
    /// Create a store rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            memo: DashMap::new(),
        })
    }

    fn blob_path(&self, identity: &str) -> PathBuf {
        let safe = sanitize_filename::sanitize(identity);
        let safe = if safe.is_empty() { "default".to_string() } else { safe };
        self.dir.join(format!("{safe}.json"))
    }

    /// Load the storage state for an identity, if one was saved
    pub async fn load(&self, identity: &str) -> Option<StorageState> {
        if let Some(state) = self.memo.get(identity) {
            return Some(state.clone());
        }

        let path = self.blob_path(identity);
        let raw = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice::<StorageState>(&raw) {
            Ok(state) => {
                debug!("loaded session state for {identity} ({} cookies)", state.cookies.len());
                self.memo.insert(identity.to_string(), state.clone());
                Some(state)
            }
            Err(e) => {
                warn!("discarding corrupt session blob {}: {e}", path.display());
                None
            }
        }
    }

    /// Persist the storage state for an identity, overwriting any prior blob
    ///
    /// Failures are logged and swallowed.
    pub async fn save(&self, identity: &str, state: StorageState) {
        self.memo.insert(identity.to_string(), state.clone());

        let path = self.blob_path(identity);
        match serde_json::to_vec_pretty(&state) {
            Ok(bytes) => {
                if let Err(e) = write_atomic(&path, &bytes).await {
                    warn!("failed to persist session state for {identity}: {e}");
                } else {
                    debug!(
                        "saved session state for {identity} ({} cookies, {} origins)",
                        state.cookies.len(),
                        state.origins.len()
                    );
                }
            }
            Err(e) => warn!("failed to serialize session state for {identity}: {e}"),
        }
    }

    /// Drop the stored state for an identity
    pub async fn clear(&self, identity: &str) {
        self.memo.remove(identity);
        let path = self.blob_path(identity);
        if path.exists()
            && let Err(e) = tokio::fs::remove_file(&path).await
        {
            warn!("failed to remove session blob {}: {e}", path.display());
        }
    }
}

/// Write via a temp file + rename so a crash mid-write never leaves a
/// truncated blob behind
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}
