//! Chrome profile directory management.
//!
//! Every launch gets a UUID-named profile directory so concurrent scrapes
//! never contend on Chrome's SingletonLock. Directories are removed on
//! drop unless ownership is transferred to the launch path.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

const PROFILE_PREFIX: &str = "watchscrape_chrome_";

/// RAII wrapper for a Chrome profile directory
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl BrowserProfile {
    /// Create a fresh UUID-named profile directory under temp
    pub fn create() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("{PROFILE_PREFIX}{}", Uuid::new_v4()));

        // create_dir (not create_dir_all): fails on the astronomically
        // unlikely UUID collision instead of silently sharing a profile
        std::fs::create_dir(&path)
            .with_context(|| format!("failed to create profile directory {}", path.display()))?;

        debug!("created Chrome profile directory {}", path.display());
        Ok(Self {
            path,
            cleanup_on_drop: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consume the profile, returning the path and disabling auto-cleanup
    ///
    /// Used when the launch path takes over directory lifetime.
    pub fn into_path(mut self) -> PathBuf {
        self.cleanup_on_drop = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.cleanup_on_drop && self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("failed to clean up profile {}: {e}", self.path.display());
            }
        }
    }
}

/// Check whether a profile's SingletonLock belongs to a dead process
///
/// The lock is a symlink targeting `{hostname}-{pid}`; if that pid is
/// gone, the profile is an orphan from a crashed run.
#[cfg(unix)]
pub fn is_singleton_lock_stale(profile_dir: &Path) -> bool {
    let lock_path = profile_dir.join("SingletonLock");

    if !lock_path.exists() && !lock_path.is_symlink() {
        return true;
    }

    match std::fs::read_link(&lock_path) {
        Ok(target) => {
            let target_str = target.to_string_lossy();
            if let Some(pid_str) = target_str.rsplit('-').next()
                && let Ok(pid) = pid_str.parse::<i32>()
            {
                let alive = unsafe { libc::kill(pid, 0) == 0 };
                if !alive {
                    debug!("SingletonLock stale: pid {pid} no longer exists");
                }
                return !alive;
            }
            // unparseable target: assume active
            false
        }
        // exists but is not a symlink: corrupted, treat as stale
        Err(_) => lock_path.is_file(),
    }
}

#[cfg(not(unix))]
pub fn is_singleton_lock_stale(_profile_dir: &Path) -> bool {
    // no reliable process probe; UUID naming prevents conflicts anyway
    true
}

/// Remove orphaned profile directories left by crashed runs
///
/// Called once at startup. Only touches directories carrying our prefix
/// whose SingletonLock no longer maps to a live process.
pub fn cleanup_stale_profiles() -> Result<usize> {
    let temp_dir = std::env::temp_dir();
    let mut cleaned = 0;

    let entries = std::fs::read_dir(&temp_dir)
        .with_context(|| format!("failed to read temp directory {}", temp_dir.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.starts_with(PROFILE_PREFIX)
            && path.is_dir()
            && is_singleton_lock_stale(&path)
        {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!("failed to remove stale profile {}: {e}", path.display());
            } else {
                cleaned += 1;
            }
        }
    }

    if cleaned > 0 {
        info!("cleaned {cleaned} stale Chrome profile directories");
    }
    Ok(cleaned)
}
