//! Wait strategies for element search
//!
//! A wait strategy is the predicate the locator polls for before it
//! considers a selector "matched". Exactly one strategy governs a search
//! call. Each variant is rendered to a JavaScript predicate by
//! [`WaitStrategy::predicate_script`]; the engine stays driver-agnostic by
//! only ever evaluating that script and reading back a boolean.

/// Predicate kind controlling when a located node is considered ready
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Node exists in the DOM
    Presence,
    /// Node exists and is visually rendered (non-zero box, not hidden)
    Visible,
    /// Node is visible and interactively clickable (enabled, receives
    /// pointer events)
    Clickable,
    /// Node exists and its rendered text contains the given fragment
    TextPresent(String),
    /// Node exists and carries the given attribute
    AttributePresent(String),
}

impl WaitStrategy {
    /// Stable key used for per-strategy statistics
    pub fn name(&self) -> &'static str {
        match self {
            WaitStrategy::Presence => "presence",
            WaitStrategy::Visible => "visible",
            WaitStrategy::Clickable => "clickable",
            WaitStrategy::TextPresent(_) => "text_present",
            WaitStrategy::AttributePresent(_) => "attribute_present",
        }
    }

    /// All strategy keys, for pre-seeding statistics maps
    pub fn all_names() -> [&'static str; 5] {
        [
            "presence",
            "visible",
            "clickable",
            "text_present",
            "attribute_present",
        ]
    }

    /// Render the polling predicate as a self-contained JS expression that
    /// evaluates to a boolean for the given selector.
    pub fn predicate_script(&self, selector: &str) -> String {
        let selector = js_escape(selector);
        match self {
            WaitStrategy::Presence => {
                format!("document.querySelector('{selector}') !== null")
            }
            WaitStrategy::Visible => format!(
                r#"(() => {{
                    const el = document.querySelector('{selector}');
                    if (!el) return false;
                    const rect = el.getBoundingClientRect();
                    const style = window.getComputedStyle(el);
                    return rect.width > 0 && rect.height > 0
                        && style.visibility !== 'hidden'
                        && style.display !== 'none';
                }})()"#
            ),
            WaitStrategy::Clickable => format!(
                r#"(() => {{
                    const el = document.querySelector('{selector}');
                    if (!el) return false;
                    const rect = el.getBoundingClientRect();
                    const style = window.getComputedStyle(el);
                    if (rect.width === 0 || rect.height === 0) return false;
                    if (style.visibility === 'hidden' || style.display === 'none') return false;
                    if (style.pointerEvents === 'none') return false;
                    return !el.disabled;
                }})()"#
            ),
            WaitStrategy::TextPresent(fragment) => {
                let fragment = js_escape(fragment);
                format!(
                    r#"(() => {{
                        const el = document.querySelector('{selector}');
                        return el !== null && (el.innerText || '').includes('{fragment}');
                    }})()"#
                )
            }
            WaitStrategy::AttributePresent(attr) => {
                let attr = js_escape(attr);
                format!(
                    r#"(() => {{
                        const el = document.querySelector('{selector}');
                        return el !== null && el.hasAttribute('{attr}');
                    }})()"#
                )
            }
        }
    }
}

/// Escape a string for embedding in a single-quoted JS literal
pub(crate) fn js_escape(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
}
