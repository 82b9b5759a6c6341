//! Browser fingerprint evasion.
//!
//! Installs a per-session fingerprint profile and a set of evasion
//! scripts on a page via `Page.addScriptToEvaluateOnNewDocument`, so every
//! document the page loads sees the overrides before its own scripts run.
//! Must be called before the first navigation.

use anyhow::Result;
use chromiumoxide::{Page, cdp};
use tracing::{debug, warn};

mod config;
mod scripts;

pub use config::StealthProfile;

use scripts::EVASION_SCRIPTS;

/// Apply the stealth profile to a fresh page
///
/// Injects the profile preamble, the evasion scripts in order, and
/// finally overrides the user agent (headless token stripped, language
/// and platform aligned with the profile).
pub async fn prepare_page(page: &Page) -> Result<StealthProfile> {
    let session_seed: Vec<u8> = (0..16).map(|_| rand::random::<u8>()).collect();
    let seed_hex = hex::encode(&session_seed);
    let profile = StealthProfile::from_seed(&session_seed);

    debug!("installing stealth profile (seed {})", &seed_hex[..8]);

    let preamble = format!(
        r#"
        window.__wsProfile = {{
            acceptLanguage: "{}",
            platform: "{}",
            language: "{}",
            languages: {},
            screenWidth: {},
            screenHeight: {},
            webglVendor: "{}",
            webglRenderer: "{}",
            hardwareConcurrency: {},
            sessionSeed: "{}"
        }};
        "#,
        profile.accept_language,
        profile.platform,
        profile.language,
        serde_json::to_string(&profile.languages).unwrap_or_else(|_| "[]".to_string()),
        profile.screen_width,
        profile.screen_height,
        profile.webgl_vendor,
        profile.webgl_renderer,
        profile.hardware_concurrency,
        seed_hex,
    );

    install_on_new_document(page, preamble).await?;

    let mut installed = 0usize;
    for (name, source) in EVASION_SCRIPTS {
        match install_on_new_document(page, (*source).to_string()).await {
            Ok(()) => {
                debug!("installed evasion script {name}");
                installed += 1;
            }
            Err(e) => warn!("failed to install evasion script {name}: {e}"),
        }
    }

    if installed == 0 {
        return Err(anyhow::anyhow!(
            "failed to install any of {} evasion scripts",
            EVASION_SCRIPTS.len()
        ));
    }

    // User agent last: strip the Headless marker the browser reports and
    // pin language/platform to the profile.
    let version = page
        .execute(cdp::browser_protocol::browser::GetVersionParams {})
        .await?;
    let user_agent = version.user_agent.replace("Headless", "");

    page.execute(cdp::browser_protocol::network::SetUserAgentOverrideParams {
        user_agent,
        accept_language: Some(profile.accept_language.clone()),
        platform: Some(profile.platform.clone()),
        user_agent_metadata: None,
    })
    .await?;

    debug!(
        "stealth profile active: {}/{} scripts",
        installed,
        EVASION_SCRIPTS.len()
    );
    Ok(profile)
}

async fn install_on_new_document(page: &Page, source: String) -> Result<()> {
    page.execute(
        cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams {
            source,
            include_command_line_api: None,
            world_name: None,
            run_immediately: None,
        },
    )
    .await?;
    Ok(())
}
