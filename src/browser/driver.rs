//! Browser driver: owns headless Chrome lifecycle and hands out
//! stealth-prepared pages.
//!
//! One driver serves one orchestrator slot. The browser is launched
//! lazily, health-checked with a `version()` ping before reuse, and
//! relaunched transparently after a crash. Pages are leased per job and
//! must be released; release with `commit` persists the page's storage
//! state to the session store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chromiumoxide::browser::Browser;
use chromiumoxide::{Page, cdp};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::session::{OriginStorage, SessionStore, StorageState};
use crate::stealth;

use super::profile::BrowserProfile;
use super::setup::launch_browser;

/// Driver tunables
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub headless: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { headless: true }
    }
}

/// A launched browser plus the plumbing that must die with it
#[derive(Debug)]
struct BrowserHandle {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: Option<PathBuf>,
}

impl BrowserHandle {
    fn cleanup_profile_dir(&mut self) {
        if let Some(path) = self.profile_dir.take()
            && let Err(e) = std::fs::remove_dir_all(&path)
        {
            warn!("failed to remove profile directory {}: {e}", path.display());
        }
    }
}

impl Drop for BrowserHandle {
    fn drop(&mut self) {
        self.handler.abort();
        if self.profile_dir.is_some() {
            self.cleanup_profile_dir();
        }
    }
}

/// A page leased from the driver for the duration of one job
///
/// Release through [`BrowserDriver::release_page`]; dropping without
/// release closes the page best-effort in the background.
#[derive(Debug)]
pub struct PageLease {
    page: Option<Page>,
    identity: String,
}

impl PageLease {
    pub fn page(&self) -> &Page {
        self.page.as_ref().expect("page present until release")
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl Drop for PageLease {
    fn drop(&mut self) {
        if let Some(page) = self.page.take()
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            handle.spawn(async move {
                if let Err(e) = page.close().await {
                    debug!("best-effort page close failed: {e}");
                }
            });
        }
    }
}

/// Health-checked browser lifecycle manager
pub struct BrowserDriver {
    config: DriverConfig,
    sessions: Arc<SessionStore>,
    slot: Mutex<Option<BrowserHandle>>,
}

impl BrowserDriver {
    pub fn new(config: DriverConfig, sessions: Arc<SessionStore>) -> Self {
        Self {
            config,
            sessions,
            slot: Mutex::new(None),
        }
    }

    /// Lease a fresh stealth-prepared page
    ///
    /// Applies the evasion profile, viewport, extra headers, and restores
    /// any saved session state for `identity` before returning. The page
    /// has not navigated anywhere yet.
    pub async fn acquire_page(&self, identity: &str) -> Result<PageLease> {
        let page = {
            let mut slot = self.slot.lock().await;

            // Health check: a crashed Chrome answers nothing
            if let Some(handle) = slot.as_ref()
                && handle.browser.version().await.is_err()
            {
                warn!("browser failed health check, relaunching");
                if let Some(mut dead) = slot.take() {
                    let _ = dead.browser.close().await;
                    let _ = dead.browser.wait().await;
                    dead.cleanup_profile_dir();
                }
            }

            if slot.is_none() {
                let profile = BrowserProfile::create()?;
                let (browser, handler, profile_dir) =
                    launch_browser(self.config.headless, profile.into_path()).await?;
                info!("browser launched (profile {})", profile_dir.display());
                *slot = Some(BrowserHandle {
                    browser,
                    handler,
                    profile_dir: Some(profile_dir),
                });
            }

            let handle = slot.as_ref().expect("slot populated above");
            handle
                .browser
                .new_page("about:blank")
                .await
                .context("failed to open page")?
        };

        stealth::prepare_page(&page)
            .await
            .context("stealth preparation failed")?;

        // Consistent desktop viewport
        page.execute(
            cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams::builder()
                .width(1920)
                .height(1080)
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(anyhow::Error::msg)?,
        )
        .await
        .context("failed to set viewport")?;

        page.execute(cdp::browser_protocol::network::SetExtraHttpHeadersParams {
            headers: cdp::browser_protocol::network::Headers::new(serde_json::json!({
                "Accept-Language": "en-US,en;q=0.9",
                "Accept-Encoding": "gzip, deflate, br",
                "DNT": "1",
                "Upgrade-Insecure-Requests": "1",
            })),
        })
        .await
        .context("failed to set extra headers")?;

        if let Some(state) = self.sessions.load(identity).await
            && !state.is_empty()
        {
            if let Err(e) = restore_storage_state(&page, &state).await {
                warn!("failed to restore session state for {identity}: {e}");
            }
        }

        Ok(PageLease {
            page: Some(page),
            identity: identity.to_string(),
        })
    }

    /// Release a leased page
    ///
    /// With `commit`, the page's cookies and local storage are captured
    /// into the session store first (failures logged, never fatal).
    pub async fn release_page(&self, mut lease: PageLease, commit: bool) {
        let Some(page) = lease.page.take() else {
            return;
        };

        if commit {
            match capture_storage_state(&page).await {
                Ok(state) => self.sessions.save(&lease.identity, state).await,
                Err(e) => warn!("failed to capture session state: {e}"),
            }
        }

        if let Err(e) = page.close().await {
            debug!("page close failed: {e}");
        }
    }

    /// Force-close the browser, e.g. on job deadline or shutdown
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(mut handle) = slot.take() {
            info!("shutting down browser");
            if let Err(e) = handle.browser.close().await {
                warn!("browser close failed: {e}");
            }
            if let Err(e) = handle.browser.wait().await {
                warn!("browser wait failed: {e}");
            }
            handle.cleanup_profile_dir();
        }
    }
}

impl std::fmt::Debug for BrowserDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserDriver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Install saved cookies and local storage on a fresh page
async fn restore_storage_state(page: &Page, state: &StorageState) -> Result<()> {
    if !state.cookies.is_empty() {
        // SessionCookie serializes in CDP wire shape, so the CookieParam
        // conversion is a plain serde round-trip.
        let cookies: Vec<cdp::browser_protocol::network::CookieParam> =
            serde_json::from_value(serde_json::to_value(&state.cookies)?)
                .context("cookie conversion failed")?;
        page.execute(cdp::browser_protocol::network::SetCookiesParams { cookies })
            .await
            .context("failed to set cookies")?;
    }

    for origin in &state.origins {
        if origin.entries.is_empty() {
            continue;
        }
        let payload = serde_json::to_string(origin)?;
        let script = format!(
            r#"
            (() => {{
                try {{
                    const saved = {payload};
                    if (location.origin === saved.origin) {{
                        for (const [key, value] of saved.entries) {{
                            try {{ localStorage.setItem(key, value); }} catch (e) {{}}
                        }}
                    }}
                }} catch (e) {{}}
            }})();
            "#
        );
        page.execute(
            cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams {
                source: script,
                include_command_line_api: None,
                world_name: None,
                run_immediately: None,
            },
        )
        .await
        .context("failed to install local storage restore script")?;
    }

    debug!(
        "restored session state ({} cookies, {} origins)",
        state.cookies.len(),
        state.origins.len()
    );
    Ok(())
}

/// Capture the page's cookies and current-origin local storage
async fn capture_storage_state(page: &Page) -> Result<StorageState> {
    let cookies_resp = page
        .execute(cdp::browser_protocol::network::GetCookiesParams::default())
        .await
        .context("failed to read cookies")?;

    let cookies = serde_json::from_value(serde_json::to_value(&cookies_resp.cookies)?)
        .context("cookie conversion failed")?;

    let origin: Option<OriginStorage> = page
        .evaluate(
            r#"
            (() => {
                try {
                    return {
                        origin: location.origin,
                        entries: Object.keys(localStorage).map(k => [k, localStorage.getItem(k)])
                    };
                } catch (e) {
                    return null;
                }
            })()
            "#,
        )
        .await
        .ok()
        .and_then(|result| result.into_value().ok());

    Ok(StorageState {
        cookies,
        origins: origin.into_iter().filter(|o| !o.entries.is_empty()).collect(),
    })
}
