//! Configuration loading and headless-mode resolution
//!
//! Configuration lives in a JSON file with a required `global_settings`
//! section plus one section per automated service:
//!
//! ```json
//! {
//!     "global_settings": {
//!         "headless": false,
//!         "window_size": { "width": 1280, "height": 720 },
//!         "user_agent": "Mozilla/5.0 ...",
//!         "log_level": "info",
//!         "default_timeout_secs": 10
//!     },
//!     "chatgpt": { "url": "https://chatgpt.com" }
//! }
//! ```
//!
//! The file is consumed, not owned, by this crate: absence of the file or
//! of required sections is a fatal [`Error::Configuration`] at
//! session-creation time.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Environment variable signalling a CI environment (forces headless)
pub const CI_ENV_VAR: &str = "GITHUB_ACTIONS";

/// Environment variable forcing headless mode regardless of config
pub const HEADLESS_ENV_VAR: &str = "HEADLESS";

/// Browser window dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    /// Window width in pixels
    #[serde(default = "default_width")]
    pub width: u32,
    /// Window height in pixels
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

/// Global settings shared by every session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Configured headless default (lowest precedence tier)
    #[serde(default)]
    pub headless: bool,
    /// Browser window size
    #[serde(default)]
    pub window_size: WindowSize,
    /// User agent override (None = browser default)
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Log level hint for the consumer's tracing subscriber
    #[serde(default)]
    pub log_level: Option<String>,
    /// Default per-selector search timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Root directory for per-service browser profiles
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: String,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_profiles_dir() -> String {
    "profiles".to_string()
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            headless: false,
            window_size: WindowSize::default(),
            user_agent: None,
            log_level: None,
            default_timeout_secs: default_timeout_secs(),
            profiles_dir: default_profiles_dir(),
        }
    }
}

/// Per-service configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Entry URL for the service
    #[serde(default)]
    pub url: Option<String>,
    /// Service-specific extras (selector lists, timeouts) consumed by the
    /// bot layer; opaque to the core.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Top-level automation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Required global section
    pub global_settings: GlobalSettings,
    /// One section per service, keyed by service name
    #[serde(flatten)]
    pub services: HashMap<String, ServiceSettings>,
}

impl AutomationConfig {
    /// Load configuration from a JSON file.
    ///
    /// Fails with [`Error::Configuration`] if the file is missing, is not
    /// valid JSON, or lacks the `global_settings` section.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::configuration(
                "config_file",
                format!("configuration file not found: {}", path.display()),
            ));
        }

        let raw = std::fs::read_to_string(path)?;
        let config: AutomationConfig = serde_json::from_str(&raw).map_err(|e| {
            Error::configuration("config_file", format!("invalid configuration JSON: {e}"))
        })?;

        debug!(
            services = config.services.len(),
            "Configuration loaded from {}",
            path.display()
        );
        Ok(config)
    }

    /// Get the configuration section for a specific service.
    ///
    /// Fails with [`Error::Configuration`] when the section is absent.
    pub fn service(&self, name: &str) -> Result<&ServiceSettings> {
        self.services.get(name).ok_or_else(|| {
            Error::configuration(name, format!("service '{name}' not found in configuration"))
        })
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            global_settings: GlobalSettings::default(),
            services: HashMap::new(),
        }
    }
}

/// Snapshot of the environment signals affecting headless resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessEnv {
    /// CI detection variable is set
    pub ci: bool,
    /// Explicit headless-forcing variable is set
    pub forced: bool,
}

impl HeadlessEnv {
    /// Read both signals from the process environment.
    pub fn from_env() -> Self {
        Self {
            ci: std::env::var_os(CI_ENV_VAR).is_some(),
            forced: std::env::var_os(HEADLESS_ENV_VAR).is_some(),
        }
    }

    /// True when either signal forces headless.
    pub fn forces_headless(&self) -> bool {
        self.ci || self.forced
    }
}

/// Resolve the effective headless mode.
///
/// Precedence, highest first: explicit override, environment signal
/// (CI detection or headless-forcing variable), configured default. The
/// three tiers support both interactive debugging (override) and
/// unattended runs (env signal) without touching the config file.
pub fn resolve_headless(explicit: Option<bool>, env: HeadlessEnv, configured: bool) -> bool {
    match explicit {
        Some(value) => value,
        None if env.forces_headless() => true,
        None => configured,
    }
}
