//! Chrome discovery and launch.
//!
//! Discovery is table-driven: the `CHROMIUM_PATH` override, then the
//! platform's install locations, then a `$PATH` probe for the usual
//! binary names, and as a last resort a managed Chromium download via
//! the chromiumoxide fetcher. Launch applies the hardening argument set;
//! per-page fingerprint work lives in `crate::stealth`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::Handler;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::error::is_benign_cdp_noise;
use crate::utils::constants::CHROME_USER_AGENT;

/// Well-known install locations, vendor builds before distro packages
#[cfg(target_os = "linux")]
const INSTALL_LOCATIONS: &[&str] = &[
    "/opt/google/chrome/chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

#[cfg(target_os = "macos")]
const INSTALL_LOCATIONS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/homebrew/bin/chromium",
];

#[cfg(target_os = "windows")]
const INSTALL_LOCATIONS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files\Chromium\Application\chrome.exe",
];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const INSTALL_LOCATIONS: &[&str] = &[];

/// Binary names probed across `$PATH` when no install location matches
const PATH_BINARY_NAMES: &[&str] = &["chromium", "chromium-browser", "google-chrome", "chrome"];

/// Launch arguments beyond the user agent and window geometry
///
/// Grouped: automation-tell removal, background service suppression,
/// then the quality-of-life switches headless operation needs.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-extensions",
    "--disable-notifications",
    "--disable-popup-blocking",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-component-extensions-with-background-pages",
    "--disable-features=TranslateUI,IsolateOrigins,site-per-process",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-prompt-on-repost",
    "--metrics-recording-only",
    "--password-store=basic",
    "--use-mock-keychain",
    "--no-first-run",
    "--no-default-browser-check",
    "--no-sandbox",
    "--hide-scrollbars",
    "--mute-audio",
];

/// Locate a usable Chrome/Chromium executable on this machine
///
/// `CHROMIUM_PATH` short-circuits discovery when it points at a real
/// file; a dangling override is logged and ignored rather than treated
/// as fatal, since the fetcher can still save the day.
pub fn find_browser_executable() -> Option<PathBuf> {
    if let Some(overridden) = std::env::var_os("CHROMIUM_PATH") {
        let path = PathBuf::from(overridden);
        if path.is_file() {
            info!("using browser from CHROMIUM_PATH: {}", path.display());
            return Some(path);
        }
        warn!(
            "CHROMIUM_PATH points to a non-existent file, ignoring: {}",
            path.display()
        );
    }

    let installed = INSTALL_LOCATIONS.iter().map(PathBuf::from);
    let on_path = std::env::var_os("PATH")
        .map(|path_var| {
            std::env::split_paths(&path_var)
                .flat_map(|dir| PATH_BINARY_NAMES.iter().map(move |name| dir.join(name)))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let found = installed.chain(on_path).find(|p| p.is_file())?;
    info!("found browser at {}", found.display());
    Some(found)
}

/// Download a managed Chromium build and return its executable path
pub async fn download_managed_browser() -> Result<PathBuf> {
    info!("no local browser found, downloading managed Chromium");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("watchscrape")
        .join("chromium");

    std::fs::create_dir_all(&cache_dir).context("failed to create browser cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("failed to build fetcher options")?,
    );

    let revision = fetcher.fetch().await.context("failed to fetch browser")?;
    info!("downloaded Chromium to {}", revision.folder_path.display());
    Ok(revision.executable_path)
}

async fn resolve_executable() -> Result<PathBuf> {
    match find_browser_executable() {
        Some(path) => Ok(path),
        None => download_managed_browser().await,
    }
}

/// Launch Chrome with the hardening argument set
///
/// Returns the browser, its event-drain task (aborted when the browser
/// handle drops), and the profile directory in use.
pub async fn launch_browser(
    headless: bool,
    user_data_dir: PathBuf,
) -> Result<(Browser, JoinHandle<()>, PathBuf)> {
    let executable = resolve_executable().await?;

    let mut builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(60))
        .window_size(1920, 1080)
        .user_data_dir(user_data_dir.clone())
        .chrome_executable(executable)
        .arg(format!("--user-agent={CHROME_USER_AGENT}"));
    for arg in LAUNCH_ARGS {
        builder = builder.arg(*arg);
    }
    builder = if headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    let config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

    debug!("launching browser (headless={headless})");
    let (browser, handler) = Browser::launch(config)
        .await
        .context("failed to launch browser")?;

    let handler_task = task::spawn(drain_cdp_events(handler));
    Ok((browser, handler_task, user_data_dir))
}

/// Drain the CDP event stream for the browser's lifetime
///
/// Known deserialization noise drops to trace; anything else is a real
/// browser-side error.
async fn drain_cdp_events(mut handler: Handler) {
    while let Some(event) = handler.next().await {
        let Err(e) = event else { continue };
        let message = e.to_string();
        if is_benign_cdp_noise(&message) {
            trace!("ignoring CDP noise: {message}");
        } else {
            error!("browser event stream error: {message}");
        }
    }
    debug!("browser event stream closed");
}
