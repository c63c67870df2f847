//! Anti-detection script injection
//!
//! A fixed table of scripts is registered to run on every new document,
//! masking the most common automation tells (navigator.webdriver, empty
//! plugin lists, missing chrome runtime, headless screen geometry).
//!
//! Application is strictly best-effort: a script that fails to register
//! is logged and skipped, and the session proceeds without it. Detection
//! hardening must never cost a working session.

use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use tracing::{debug, instrument, warn};

/// One named stealth patch
struct StealthScript {
    name: &'static str,
    source: &'static str,
}

const SCRIPTS: &[StealthScript] = &[
    StealthScript {
        name: "webdriver",
        source: r#"
            Object.defineProperty(navigator, 'webdriver', {
                get: () => undefined,
                configurable: true
            });
        "#,
    },
    StealthScript {
        name: "plugins",
        source: r#"
            Object.defineProperty(navigator, 'plugins', {
                get: () => {
                    const plugins = [
                        { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer' },
                        { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai' },
                        { name: 'Native Client', filename: 'internal-nacl-plugin' }
                    ];
                    plugins.item = (i) => plugins[i];
                    plugins.namedItem = (name) => plugins.find(p => p.name === name);
                    plugins.refresh = () => {};
                    return plugins;
                },
                configurable: true
            });
        "#,
    },
    StealthScript {
        name: "languages",
        source: r#"
            Object.defineProperty(navigator, 'languages', {
                get: () => ['en-US', 'en'],
                configurable: true
            });
        "#,
    },
    StealthScript {
        name: "chrome_runtime",
        source: r#"
            if (!window.chrome) {
                window.chrome = {};
            }
            if (!window.chrome.runtime) {
                window.chrome.runtime = {
                    connect: function() {},
                    sendMessage: function() {}
                };
            }
        "#,
    },
    StealthScript {
        name: "permissions",
        source: r#"
            if (navigator.permissions) {
                const originalQuery = navigator.permissions.query.bind(navigator.permissions);
                navigator.permissions.query = (parameters) => (
                    parameters.name === 'notifications' ?
                        Promise.resolve({ state: Notification.permission }) :
                        originalQuery(parameters)
                );
            }
        "#,
    },
    StealthScript {
        name: "screen_dimensions",
        source: r#"
            if (window.outerWidth === 0) {
                Object.defineProperty(window, 'outerWidth', {
                    get: () => window.innerWidth,
                    configurable: true
                });
            }
            if (window.outerHeight === 0) {
                Object.defineProperty(window, 'outerHeight', {
                    get: () => window.innerHeight + 85,
                    configurable: true
                });
            }
        "#,
    },
];

/// Register every stealth script on the page, best-effort.
///
/// Returns the number of scripts that registered successfully. Individual
/// failures are logged at warn level and never propagate.
#[instrument(skip(page))]
pub async fn apply(page: &Page) -> usize {
    let mut applied = 0;

    for script in SCRIPTS {
        match inject(page, script.source).await {
            Ok(()) => {
                applied += 1;
            }
            Err(e) => {
                warn!(script = script.name, error = %e, "Stealth script failed to register");
            }
        }
    }

    debug!(applied, total = SCRIPTS.len(), "Stealth scripts registered");
    applied
}

async fn inject(page: &Page, source: &str) -> crate::error::Result<()> {
    let params = AddScriptToEvaluateOnNewDocumentParams::builder()
        .source(source)
        .build()
        .map_err(crate::error::Error::cdp)?;

    page.execute(params).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_table_names_are_unique() {
        let mut names: Vec<_> = SCRIPTS.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SCRIPTS.len());
    }

    #[test]
    fn test_webdriver_patch_present() {
        let webdriver = SCRIPTS.iter().find(|s| s.name == "webdriver");
        assert!(webdriver.is_some_and(|s| s.source.contains("navigator")));
    }
}
