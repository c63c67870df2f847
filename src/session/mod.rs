//! Browser session lifecycle, stealth hardening, and human-like input.

pub mod humanize;
pub mod manager;
pub mod stealth;

pub use humanize::{
    move_mouse_along_curve, move_mouse_randomly, scroll_randomly, type_like_human, wait_random,
    TypingCadence,
};
pub use manager::{profile_dir_for, ScopedSession, SessionHandle, SessionManager};
