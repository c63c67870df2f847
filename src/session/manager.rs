//! Browser session lifecycle
//!
//! Each automated service gets its own browser process with a dedicated,
//! persistent profile directory, so cookies and login state survive
//! restarts and services never share identity. Session teardown is
//! idempotent and profile directories are deliberately left in place.

use crate::config::{resolve_headless, AutomationConfig, HeadlessEnv};
use crate::error::{Error, Result};
use crate::session::stealth;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Chrome flags applied to every session
const BASE_ARGS: &[&str] = &[
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-infobars",
    "--disable-blink-features=AutomationControlled",
];

/// Profile directory for a service, under the configured profiles root.
pub fn profile_dir_for(profiles_dir: &str, service: &str) -> PathBuf {
    Path::new(profiles_dir).join(format!("{service}_profile"))
}

/// One live browser session bound to a service
pub struct SessionHandle {
    service: String,
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    profile_dir: PathBuf,
    headless: bool,
    closed: bool,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("service", &self.service)
            .field("profile_dir", &self.profile_dir)
            .field("headless", &self.headless)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Launch a browser for the named service.
    ///
    /// The service must have a section in the configuration. Headless mode
    /// resolves explicit override, then environment, then the configured
    /// default. Stealth scripts are registered best-effort when `apply_stealth`
    /// is set; their failure never fails the launch.
    #[instrument(skip(config), fields(service))]
    pub async fn launch(
        config: &AutomationConfig,
        service: &str,
        headless_override: Option<bool>,
        apply_stealth: bool,
    ) -> Result<Self> {
        let settings = config.service(service)?;
        let global = &config.global_settings;

        let headless = resolve_headless(headless_override, HeadlessEnv::from_env(), global.headless);
        let profile_dir = profile_dir_for(&global.profiles_dir, service);
        std::fs::create_dir_all(&profile_dir)?;

        info!(
            service,
            headless,
            profile = %profile_dir.display(),
            "Launching browser session"
        );

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&profile_dir)
            .viewport(Viewport {
                width: global.window_size.width,
                height: global.window_size.height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .arg(format!(
                "--window-size={},{}",
                global.window_size.width, global.window_size.height
            ));

        if !headless {
            builder = builder.with_head();
        }
        for arg in BASE_ARGS {
            builder = builder.arg(*arg);
        }
        if let Some(ref ua) = global.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }

        let cdp_config = builder.build().map_err(|e| Error::DriverInitialization {
            service: service.to_string(),
            message: format!("invalid browser configuration: {e}"),
        })?;

        let (browser, mut handler) = Browser::launch(cdp_config).await.map_err(|e| {
            Error::DriverInitialization {
                service: service.to_string(),
                message: format!("browser launch failed: {e}"),
            }
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    warn!("Browser handler event error");
                    break;
                }
            }
            debug!("Browser handler finished");
        });

        let entry_url = settings.url.as_deref().unwrap_or("about:blank");
        let page = browser
            .new_page(entry_url)
            .await
            .map_err(|e| Error::DriverInitialization {
                service: service.to_string(),
                message: format!("initial page creation failed: {e}"),
            })?;

        if apply_stealth {
            let applied = stealth::apply(&page).await;
            debug!(service, applied, "Stealth registration complete");
        }

        info!(service, "Browser session ready");

        Ok(Self {
            service: service.to_string(),
            browser,
            handler: handler_task,
            page,
            profile_dir,
            headless,
            closed: false,
        })
    }

    /// The service this session belongs to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The session's main page.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// The persistent profile directory backing this session.
    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    /// Whether the session resolved to headless mode.
    pub fn headless(&self) -> bool {
        self.headless
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Shut the browser down. Safe to call more than once; the profile
    /// directory is left in place so login state survives.
    #[instrument(skip(self), fields(service = %self.service))]
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            debug!("Session already closed");
            return Ok(());
        }
        self.closed = true;

        info!("Closing browser session");
        self.browser.close().await?;
        let _ = tokio::time::timeout(Duration::from_secs(5), &mut self.handler).await;

        Ok(())
    }
}

/// Owns every live session, keyed by service name
#[derive(Debug)]
pub struct SessionManager {
    config: AutomationConfig,
    apply_stealth: bool,
    sessions: HashMap<String, SessionHandle>,
}

impl SessionManager {
    /// Create a manager from loaded configuration. Stealth is on by
    /// default.
    pub fn new(config: AutomationConfig) -> Self {
        Self {
            config,
            apply_stealth: true,
            sessions: HashMap::new(),
        }
    }

    /// Enable or disable stealth registration for future sessions.
    pub fn with_stealth(mut self, apply_stealth: bool) -> Self {
        self.apply_stealth = apply_stealth;
        self
    }

    /// The configuration this manager was built from.
    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// Create (or recreate) the session for a service.
    ///
    /// An existing session for the same service is closed first; two live
    /// sessions never share a service name or profile.
    #[instrument(skip(self))]
    pub async fn create_session(
        &mut self,
        service: &str,
        headless_override: Option<bool>,
    ) -> Result<&SessionHandle> {
        if let Some(mut old) = self.sessions.remove(service) {
            warn!(service, "Replacing existing session");
            if let Err(e) = old.close().await {
                warn!(service, error = %e, "Old session close failed");
            }
        }

        let handle =
            SessionHandle::launch(&self.config, service, headless_override, self.apply_stealth)
                .await?;
        self.sessions.insert(service.to_string(), handle);

        // Just inserted above.
        Ok(&self.sessions[service])
    }

    /// Look up the live session for a service.
    pub fn session(&self, service: &str) -> Option<&SessionHandle> {
        self.sessions.get(service)
    }

    /// Clone the main page of a service's session, if one is live.
    pub fn page(&self, service: &str) -> Option<Page> {
        self.sessions.get(service).map(|s| s.page.clone())
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Close and drop one service's session. A missing session is not an
    /// error; teardown is idempotent.
    #[instrument(skip(self))]
    pub async fn destroy_session(&mut self, service: &str) -> Result<()> {
        match self.sessions.remove(service) {
            Some(mut handle) => handle.close().await,
            None => {
                debug!(service, "No session to destroy");
                Ok(())
            }
        }
    }

    /// Close every live session, continuing past individual failures.
    /// Returns the last error encountered, if any.
    #[instrument(skip(self))]
    pub async fn destroy_all_sessions(&mut self) -> Result<()> {
        let mut last_err = None;
        for (service, mut handle) in self.sessions.drain() {
            if let Err(e) = handle.close().await {
                warn!(service = %service, error = %e, "Session close failed");
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Scope-bound session: closes its browser when dropped.
///
/// Prefer calling [`ScopedSession::close`] explicitly; the `Drop`
/// fallback detaches a best-effort cleanup task and cannot report errors.
#[derive(Debug)]
pub struct ScopedSession {
    handle: Option<SessionHandle>,
}

impl ScopedSession {
    /// Launch a standalone session for a service, outside any manager.
    pub async fn create(
        config: &AutomationConfig,
        service: &str,
        headless_override: Option<bool>,
    ) -> Result<Self> {
        let handle = SessionHandle::launch(config, service, headless_override, true).await?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// The underlying session.
    pub fn handle(&self) -> &SessionHandle {
        // Only None after close() consumed self.
        self.handle.as_ref().unwrap_or_else(|| unreachable!())
    }

    /// The session's main page.
    pub fn page(&self) -> &Page {
        self.handle().page()
    }

    /// Close the session, reporting any shutdown error.
    pub async fn close(mut self) -> Result<()> {
        match self.handle.take() {
            Some(mut handle) => handle.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if handle.is_closed() {
                return;
            }
            if let Ok(rt) = tokio::runtime::Handle::try_current() {
                rt.spawn(async move {
                    if let Err(e) = handle.close().await {
                        warn!(service = handle.service(), error = %e, "Drop-time session close failed");
                    }
                });
            } else {
                warn!(
                    service = handle.service(),
                    "ScopedSession dropped outside a runtime; browser may linger"
                );
            }
        }
    }
}
