//! Fingerprint profile applied to every browser context.

/// WebGL identity pool
///
/// Vendor/renderer pairs observed on common consumer hardware. The pair
/// is chosen per session from the seed so repeated visits within one
/// session stay self-consistent.
pub const WEBGL_IDENTITIES: &[(&str, &str)] = &[
    ("Intel Inc.", "Intel(R) UHD Graphics 630"),
    ("Intel Inc.", "Intel(R) Iris(R) Xe Graphics"),
    ("Google Inc. (NVIDIA)", "ANGLE (NVIDIA, NVIDIA GeForce GTX 1660 Direct3D11 vs_5_0 ps_5_0, D3D11)"),
    ("Google Inc. (AMD)", "ANGLE (AMD, AMD Radeon RX 580 Direct3D11 vs_5_0 ps_5_0, D3D11)"),
];

/// Static browser fingerprint parameters
#[derive(Debug, Clone)]
pub struct StealthProfile {
    pub accept_language: String,
    pub platform: String,
    pub language: String,
    pub languages: Vec<String>,
    pub screen_width: u32,
    pub screen_height: u32,
    pub webgl_vendor: String,
    pub webgl_renderer: String,
    pub hardware_concurrency: u32,
}

impl StealthProfile {
    /// Derive a profile from a per-session seed
    ///
    /// Only the WebGL identity varies; everything else matches the
    /// launch arguments (viewport, UA platform) so the fingerprint is
    /// internally consistent.
    #[must_use]
    pub fn from_seed(seed: &[u8]) -> Self {
        let pick = seed.first().copied().unwrap_or(0) as usize % WEBGL_IDENTITIES.len();
        let (vendor, renderer) = WEBGL_IDENTITIES[pick];
        Self {
            accept_language: "en-US,en;q=0.9".to_string(),
            platform: "Win32".to_string(),
            language: "en-US".to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
            screen_width: 1920,
            screen_height: 1080,
            webgl_vendor: vendor.to_string(),
            webgl_renderer: renderer.to_string(),
            hardware_concurrency: 8,
        }
    }
}
