//! Evasion scripts injected before any page script runs.
//!
//! Each script reads its parameters from `window.__wsProfile`, which the
//! injector installs first. Scripts are defensive: every override is
//! wrapped so a failure in one leaves the rest active.

/// Remove automation indicators left by the driver
///
/// `navigator.webdriver` plus the `cdc_`-prefixed globals ChromeDriver
/// derivatives leak onto `window` and `document`.
pub const WEBDRIVER_CLEANUP: &str = r#"
    (() => {
        try {
            Object.defineProperty(Object.getPrototypeOf(navigator), 'webdriver', {
                get: () => undefined,
                configurable: true
            });
        } catch (e) {}
        try {
            for (const root of [window, document]) {
                for (const key of Object.getOwnPropertyNames(root)) {
                    if (key.startsWith('cdc_') || key.startsWith('$cdc_') || key.startsWith('$wdc_')) {
                        try { delete root[key]; } catch (e) {}
                    }
                }
            }
        } catch (e) {}
    })();
"#;

/// Canvas readback jitter
///
/// Perturbs at most 1 in 1000 pixels by ±1 on one channel, selected by a
/// deterministic hash of the session seed and pixel index. Keeps visual
/// output indistinguishable while breaking pixel-hash fingerprints.
pub const CANVAS_NOISE: &str = r#"
    (() => {
        const cfg = window.__wsProfile || {};
        const seed = cfg.sessionSeed || 'watchscrape';
        let seedHash = 0;
        for (let i = 0; i < seed.length; i++) {
            seedHash = ((seedHash << 5) - seedHash + seed.charCodeAt(i)) | 0;
        }

        const jitter = (data) => {
            for (let i = 0; i < data.length; i += 4) {
                const h = (seedHash ^ (i * 2654435761)) >>> 0;
                if (h % 1000 === 0) {
                    const channel = i + (h % 3);
                    data[channel] = Math.max(0, Math.min(255, data[channel] + ((h & 1) ? 1 : -1)));
                }
            }
        };

        try {
            const origGetImageData = CanvasRenderingContext2D.prototype.getImageData;
            CanvasRenderingContext2D.prototype.getImageData = function (...args) {
                const image = origGetImageData.apply(this, args);
                jitter(image.data);
                return image;
            };
        } catch (e) {}

        try {
            const origToDataURL = HTMLCanvasElement.prototype.toDataURL;
            HTMLCanvasElement.prototype.toDataURL = function (...args) {
                const ctx = this.getContext('2d');
                if (ctx && this.width > 0 && this.height > 0) {
                    try {
                        const image = ctx.getImageData(0, 0, this.width, this.height);
                        ctx.putImageData(image, 0, 0);
                    } catch (e) {}
                }
                return origToDataURL.apply(this, args);
            };
        } catch (e) {}
    })();
"#;

/// WebGL vendor/renderer override
///
/// UNMASKED_VENDOR_WEBGL (37445) and UNMASKED_RENDERER_WEBGL (37446)
/// answered from the session profile instead of the real GPU.
pub const WEBGL_IDENTITY: &str = r#"
    (() => {
        const cfg = window.__wsProfile || {};
        const vendor = cfg.webglVendor || 'Intel Inc.';
        const renderer = cfg.webglRenderer || 'Intel(R) UHD Graphics 630';

        const handler = {
            apply(target, ctx, args) {
                const param = args && args[0];
                if (param === 37445) return vendor;
                if (param === 37446) return renderer;
                return Reflect.apply(target, ctx, args);
            }
        };

        for (const proto of [window.WebGLRenderingContext, window.WebGL2RenderingContext]) {
            if (!proto) continue;
            try {
                proto.prototype.getParameter = new Proxy(proto.prototype.getParameter, handler);
            } catch (e) {}
        }
    })();
"#;

/// Performance timing jitter
///
/// High-resolution timers are a cross-origin fingerprinting channel.
/// Adds a deterministic sub-50ms offset per session while preserving
/// monotonicity.
pub const PERFORMANCE_JITTER: &str = r#"
    (() => {
        const cfg = window.__wsProfile || {};
        const seed = cfg.sessionSeed || 'watchscrape';
        let h = 0;
        for (let i = 0; i < seed.length; i++) {
            h = ((h << 5) - h + seed.charCodeAt(i)) | 0;
        }
        const offset = (Math.abs(h) % 5000) / 100; // 0..50ms

        try {
            const origNow = performance.now.bind(performance);
            let last = 0;
            Object.defineProperty(Performance.prototype, 'now', {
                value: function () {
                    const jittered = origNow() + offset * ((Math.abs(h >> 8) % 100) / 100);
                    last = Math.max(last, jittered);
                    return last;
                },
                configurable: true
            });
        } catch (e) {}
    })();
"#;

/// Navigator surface consistency
///
/// Languages, platform and hardwareConcurrency answered from the profile
/// so they agree with the Accept-Language header and launch arguments.
pub const NAVIGATOR_PROFILE: &str = r#"
    (() => {
        const cfg = window.__wsProfile || {};
        const define = (name, value) => {
            try {
                Object.defineProperty(Object.getPrototypeOf(navigator), name, {
                    get: () => value,
                    configurable: true
                });
            } catch (e) {}
        };
        if (cfg.languages) define('languages', Object.freeze(cfg.languages.slice()));
        if (cfg.language) define('language', cfg.language);
        if (cfg.platform) define('platform', cfg.platform);
        if (cfg.hardwareConcurrency) define('hardwareConcurrency', cfg.hardwareConcurrency);
    })();
"#;

/// Plugin enumeration
///
/// Headless Chrome reports zero plugins; real desktop Chrome always
/// carries its built-in PDF handlers.
pub const NAVIGATOR_PLUGINS: &str = r#"
    (() => {
        try {
            const mockPlugins = [
                { name: 'PDF Viewer', description: 'Portable Document Format', filename: 'internal-pdf-viewer' },
                { name: 'Chrome PDF Viewer', description: 'Portable Document Format', filename: 'internal-pdf-viewer' },
                { name: 'Chromium PDF Viewer', description: 'Portable Document Format', filename: 'internal-pdf-viewer' }
            ];
            const pluginProto = Object.getPrototypeOf(navigator.plugins);
            Object.defineProperty(Object.getPrototypeOf(navigator), 'plugins', {
                get: () => {
                    const plugins = {};
                    mockPlugins.forEach((plugin, i) => {
                        plugins[i] = plugin;
                        plugins[plugin.name] = plugin;
                    });
                    Object.setPrototypeOf(plugins, pluginProto);
                    Object.defineProperty(plugins, 'length', { value: mockPlugins.length });
                    return plugins;
                },
                configurable: true
            });
        } catch (e) {}
    })();
"#;

/// Media codec support
///
/// Bundled Chromium answers "" for the proprietary codecs desktop Chrome
/// ships; sites probe H.264/AAC support as a headless tell.
pub const MEDIA_CODECS: &str = r#"
    (() => {
        try {
            const origCanPlayType = HTMLMediaElement.prototype.canPlayType;
            const proprietary = {
                'video/mp4; codecs="avc1.42E01E"': 'probably',
                'video/mp4; codecs="avc1.42E01E, mp4a.40.2"': 'probably',
                'audio/mp4; codecs="mp4a.40.2"': 'probably',
                'audio/mpeg': 'probably'
            };
            HTMLMediaElement.prototype.canPlayType = function (type) {
                if (type in proprietary) return proprietary[type];
                return origCanPlayType.call(this, type);
            };
        } catch (e) {}
    })();
"#;

/// Minimal chrome.* surface
///
/// Headless Chrome omits `window.chrome`, which several bot checks probe.
pub const CHROME_RUNTIME: &str = r#"
    (() => {
        try {
            if (!window.chrome) {
                window.chrome = {};
            }
            if (!window.chrome.runtime) {
                window.chrome.runtime = {
                    connect: () => ({
                        onMessage: { addListener: () => {}, removeListener: () => {} },
                        postMessage: () => {},
                        disconnect: () => {}
                    })
                };
            }
        } catch (e) {}
    })();
"#;

/// Injection order matters: the profile consumers assume `__wsProfile`
/// exists, and webdriver cleanup must run before site scripts probe it.
pub const EVASION_SCRIPTS: &[(&str, &str)] = &[
    ("webdriver_cleanup", WEBDRIVER_CLEANUP),
    ("navigator_profile", NAVIGATOR_PROFILE),
    ("navigator_plugins", NAVIGATOR_PLUGINS),
    ("chrome_runtime", CHROME_RUNTIME),
    ("media_codecs", MEDIA_CODECS),
    ("webgl_identity", WEBGL_IDENTITY),
    ("canvas_noise", CANVAS_NOISE),
    ("performance_jitter", PERFORMANCE_JITTER),
];
