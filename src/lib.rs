//! Driftlock - Resilient Element Location & Safe Interaction Engine
//!
//! This crate keeps browser automation working against web UIs whose DOM
//! drifts between deployments. Instead of pinning a single selector, every
//! lookup carries an ordered fallback chain; instead of raw clicks and
//! keystrokes, every interaction runs inside a bounded retry loop with
//! stale-handle recovery.
//!
//! # Features
//!
//! - **Fallback Location**: Ordered selector chains with per-selector
//!   timeouts and first-match-wins resolution
//! - **Safe Interaction**: Retry-guarded click, text entry, and text
//!   extraction with stale-element re-resolution
//! - **Session Lifecycle**: Per-service browser profiles, three-tier
//!   headless resolution, best-effort stealth hardening
//! - **Search Statistics**: Selector and strategy success tracking with
//!   snapshot/restore persistence
//!
//! # Architecture
//!
//! ```text
//! Caller ──▶ Interactor ──▶ ElementLocator ──▶ Page (CDP)
//!               │                 │
//!               ▼                 ▼
//!        ┌────────────┐    ┌─────────────┐
//!        │ Humanize   │    │ SearchStats │
//!        └────────────┘    └─────────────┘
//!
//! SessionManager ──▶ SessionHandle (browser + profile + stealth)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use driftlock::config::AutomationConfig;
//! use driftlock::interact::{Interactor, Target};
//! use driftlock::locator::ElementLocator;
//! use driftlock::session::SessionManager;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AutomationConfig::load("config.json")?;
//!     let mut sessions = SessionManager::new(config);
//!     sessions.create_session("chatgpt", None).await?;
//!
//!     let page = sessions.page("chatgpt").ok_or("no session")?;
//!     let interactor = Interactor::new(ElementLocator::new(Duration::from_secs(10)));
//!
//!     let send_button = Target::selectors([
//!         "button[data-testid='send-button']",
//!         "button[aria-label='Send']",
//!         "form button[type='submit']",
//!     ]);
//!     if interactor.safe_click(&page, &send_button, true).await? {
//!         println!("sent");
//!     }
//!
//!     sessions.destroy_all_sessions().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod interact;
pub mod locator;
pub mod session;

// Re-exports for convenience
pub use config::AutomationConfig;
pub use error::{Error, Result};
pub use interact::{Interactor, RetryPolicy, Target};
pub use locator::{ElementLocator, SearchStats, WaitStrategy};
pub use session::{ScopedSession, SessionManager, TypingCadence};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
