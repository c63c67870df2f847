//! Safe interaction layer
//!
//! Wraps raw element operations in a bounded retry loop with stale-handle
//! recovery. Every operation makes at most `retries + 1` attempts. When a
//! handle goes stale mid-operation and the target was given as a selector
//! list, the element is re-resolved from that list before the next
//! attempt; a direct element handle cannot be re-resolved and simply
//! burns the attempt.
//!
//! Failure semantics are deliberately split: failing to *resolve* a
//! selector-list target at all is an error ([`Error::SelectorNotFound`]),
//! while exhausting attempts against a resolved element is a soft result
//! (`Ok(false)` / `Ok(None)`) so callers can fall through to alternate
//! flows without matching on error variants.

use crate::error::{Error, Result};
use crate::locator::engine::first_match;
use crate::locator::stats::Operation;
use crate::locator::strategy::js_escape;
use crate::locator::{ElementLocator, WaitStrategy, POLL_INTERVAL};
use crate::session::humanize::{type_like_human, TypingCadence};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::{Element, Page};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Clears whatever editable element currently holds focus, covering both
/// form fields and contenteditable nodes.
const CLEAR_FOCUSED_SCRIPT: &str = r#"
    (() => {
        const el = document.activeElement;
        if (!el) return false;
        if ('value' in el) el.value = '';
        if (el.isContentEditable) el.innerText = '';
        el.dispatchEvent(new Event('input', { bubbles: true }));
        return true;
    })()
"#;

/// Clickability check run against a live handle (`this` is the element),
/// mirroring [`WaitStrategy::Clickable`] without going back through the
/// selector.
const ELEMENT_CLICKABLE_FN: &str = r#"
    function() {
        const el = this;
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        if (rect.width === 0 || rect.height === 0) return false;
        if (style.visibility === 'hidden' || style.display === 'none') return false;
        if (style.pointerEvents === 'none') return false;
        return !el.disabled;
    }
"#;

/// Retry bounds for one interaction operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `retries + 1`
    pub retries: u32,
    /// Fixed pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Total attempt count, always `retries + 1`.
    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }
}

/// What an operation acts on: a live handle, or a fallback selector chain
pub enum Target {
    /// A previously resolved element. No re-resolution is possible if it
    /// goes stale.
    Element(Element),
    /// Ordered candidate selectors, resolved through the locator and
    /// re-resolved on staleness.
    Selectors(Vec<String>),
}

impl Target {
    /// Build a selector-chain target from anything string-like.
    pub fn selectors<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Target::Selectors(selectors.into_iter().map(Into::into).collect())
    }
}

impl From<Element> for Target {
    fn from(element: Element) -> Self {
        Target::Element(element)
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Element(_) => f.write_str("Target::Element"),
            Target::Selectors(selectors) => {
                f.debug_tuple("Target::Selectors").field(selectors).finish()
            }
        }
    }
}

/// A target resolved for one operation
enum Resolved<'a> {
    Borrowed(&'a Element),
    Owned(Element),
}

impl Resolved<'_> {
    fn element(&self) -> &Element {
        match self {
            Resolved::Borrowed(el) => el,
            Resolved::Owned(el) => el,
        }
    }
}

/// Outcome of one attempt inside the retry loop
enum Attempt<T> {
    /// The operation finished; stop retrying.
    Done(T),
    /// The handle went stale; recover before the next attempt.
    Stale,
    /// Transient failure or nothing to report yet; just try again.
    Retry,
}

/// One retryable interaction: a single attempt plus stale-handle recovery.
trait RetryOp {
    type Output;
    async fn attempt(&mut self, attempt: u32) -> Attempt<Self::Output>;
    async fn recover(&mut self);
}

/// Drive an operation through at most `policy.attempts()` tries, pausing
/// `policy.backoff` between them. `None` means every attempt was spent.
async fn run_with_retries<O: RetryOp>(policy: RetryPolicy, mut op: O) -> Option<O::Output> {
    for attempt in 0..policy.attempts() {
        if attempt > 0 {
            tokio::time::sleep(policy.backoff).await;
        }
        match op.attempt(attempt).await {
            Attempt::Done(value) => return Some(value),
            Attempt::Stale => op.recover().await,
            Attempt::Retry => {}
        }
    }
    None
}

struct ClickOp<'a> {
    interactor: &'a Interactor,
    page: &'a Page,
    target: &'a Target,
    resolved: Resolved<'a>,
    scroll_first: bool,
}

impl RetryOp for ClickOp<'_> {
    type Output = ();

    async fn attempt(&mut self, attempt: u32) -> Attempt<()> {
        match self
            .interactor
            .click_once(self.resolved.element(), self.scroll_first)
            .await
        {
            Ok(()) => Attempt::Done(()),
            Err(e) if e.is_stale() => {
                warn!(attempt, "Element went stale during click");
                Attempt::Stale
            }
            Err(e) => {
                warn!(attempt, error = %e, "Click attempt failed");
                Attempt::Retry
            }
        }
    }

    async fn recover(&mut self) {
        if let Some(resolved) = self
            .interactor
            .re_resolve(self.page, self.target, &WaitStrategy::Clickable)
            .await
        {
            self.resolved = resolved;
        }
    }
}

struct SendKeysOp<'a> {
    interactor: &'a Interactor,
    page: &'a Page,
    target: &'a Target,
    resolved: Resolved<'a>,
    text: &'a str,
    clear_first: bool,
    cadence: &'a TypingCadence,
}

impl RetryOp for SendKeysOp<'_> {
    type Output = ();

    async fn attempt(&mut self, attempt: u32) -> Attempt<()> {
        match self
            .interactor
            .type_once(
                self.page,
                self.resolved.element(),
                self.text,
                self.clear_first,
                self.cadence,
            )
            .await
        {
            Ok(()) => Attempt::Done(()),
            Err(e) if e.is_stale() => {
                warn!(attempt, "Element went stale during text entry");
                Attempt::Stale
            }
            Err(e) => {
                warn!(attempt, error = %e, "Text entry attempt failed");
                Attempt::Retry
            }
        }
    }

    async fn recover(&mut self) {
        if let Some(resolved) = self
            .interactor
            .re_resolve(self.page, self.target, &WaitStrategy::Clickable)
            .await
        {
            self.resolved = resolved;
        }
    }
}

struct GetTextOp<'a> {
    interactor: &'a Interactor,
    page: &'a Page,
    target: &'a Target,
    resolved: Resolved<'a>,
}

impl RetryOp for GetTextOp<'_> {
    type Output = String;

    async fn attempt(&mut self, attempt: u32) -> Attempt<String> {
        match self.interactor.text_once(self.resolved.element()).await {
            Ok(Some(text)) => Attempt::Done(text),
            Ok(None) => {
                debug!(attempt, "No text yet");
                Attempt::Retry
            }
            Err(e) if e.is_stale() => {
                warn!(attempt, "Element went stale during text extraction");
                Attempt::Stale
            }
            Err(e) => {
                warn!(attempt, error = %e, "Text extraction attempt failed");
                Attempt::Retry
            }
        }
    }

    async fn recover(&mut self) {
        if let Some(resolved) = self
            .interactor
            .re_resolve(self.page, self.target, &WaitStrategy::Presence)
            .await
        {
            self.resolved = resolved;
        }
    }
}

/// Retry-guarded interaction operations built on an [`ElementLocator`]
#[derive(Debug, Clone)]
pub struct Interactor {
    locator: ElementLocator,
    policy: RetryPolicy,
}

impl Interactor {
    /// Create an interactor with the default retry policy.
    pub fn new(locator: ElementLocator) -> Self {
        Self {
            locator,
            policy: RetryPolicy::default(),
        }
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The locator backing this interactor.
    pub fn locator(&self) -> &ElementLocator {
        &self.locator
    }

    /// The active retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn resolve<'a>(
        &self,
        page: &Page,
        target: &'a Target,
        strategy: &WaitStrategy,
    ) -> Result<(Resolved<'a>, Option<String>)> {
        match target {
            Target::Element(el) => Ok((Resolved::Borrowed(el), None)),
            Target::Selectors(selectors) => {
                let outcome = self.locator.find_one(page, selectors, strategy, None).await?;
                Ok((Resolved::Owned(outcome.element), Some(outcome.selector)))
            }
        }
    }

    /// Re-resolve a stale selector-chain target. `None` for element
    /// targets (no chain to re-run) and for failed re-resolution; the
    /// caller keeps the old handle and the remaining attempts report it.
    async fn re_resolve<'a>(
        &self,
        page: &Page,
        target: &'a Target,
        strategy: &WaitStrategy,
    ) -> Option<Resolved<'a>> {
        let Target::Selectors(selectors) = target else {
            return None;
        };
        match self.locator.find_one(page, selectors, strategy, None).await {
            Ok(outcome) => {
                debug!(selector = %outcome.selector, "Re-resolved stale element");
                Some(Resolved::Owned(outcome.element))
            }
            Err(e) => {
                warn!(error = %e, "Stale element re-resolution failed");
                None
            }
        }
    }

    /// Click the target, retrying on stale handles and transient errors.
    ///
    /// With `scroll_first` the element is scrolled into view and given a
    /// moment to settle before each click. Every attempt re-checks that
    /// the handle is still clickable first, since overlays and re-renders
    /// can block a previously clickable node. Returns `Ok(true)` on
    /// success and `Ok(false)` once every attempt is spent. Resolution
    /// failure of a selector-chain target is an error.
    #[instrument(skip(self, page, target))]
    pub async fn safe_click(&self, page: &Page, target: &Target, scroll_first: bool) -> Result<bool> {
        let (resolved, _) = self.resolve(page, target, &WaitStrategy::Clickable).await?;
        let op = ClickOp {
            interactor: self,
            page,
            target,
            resolved,
            scroll_first,
        };

        if run_with_retries(self.policy, op).await.is_some() {
            return Ok(true);
        }
        self.locator
            .stats()
            .record_retries(Operation::Click, self.policy.retries as u64);
        Ok(false)
    }

    async fn click_once(&self, element: &Element, scroll_first: bool) -> Result<()> {
        if scroll_first {
            element.scroll_into_view().await?;
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        self.wait_element_clickable(element).await?;
        element.click().await?;
        Ok(())
    }

    /// Poll the handle itself until it is clickable or the locator's
    /// default timeout closes. Timing out is an ordinary attempt failure,
    /// not a hard error, so the retry loop gets to back off and try again.
    async fn wait_element_clickable(&self, element: &Element) -> Result<()> {
        let deadline = Instant::now() + self.locator.default_timeout();
        loop {
            let returns = element.call_js_fn(ELEMENT_CLICKABLE_FN, false).await?;
            let clickable = returns
                .result
                .value
                .as_ref()
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if clickable {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::cdp("element never became clickable"));
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Clear the target field (when `clear_first`) and type `text` with
    /// human cadence.
    ///
    /// The element is clicked first to take focus. Clearing resets the
    /// field value, then select-all + Delete through key events for
    /// editors that ignore programmatic value changes. Same retry and
    /// result semantics as [`safe_click`].
    ///
    /// [`safe_click`]: Interactor::safe_click
    #[instrument(skip(self, page, target, text, cadence), fields(chars = text.chars().count()))]
    pub async fn safe_send_keys(
        &self,
        page: &Page,
        target: &Target,
        text: &str,
        clear_first: bool,
        cadence: Option<&TypingCadence>,
    ) -> Result<bool> {
        let default_cadence = TypingCadence::default();
        let cadence = cadence.unwrap_or(&default_cadence);
        let (resolved, _) = self.resolve(page, target, &WaitStrategy::Clickable).await?;
        let op = SendKeysOp {
            interactor: self,
            page,
            target,
            resolved,
            text,
            clear_first,
            cadence,
        };

        if run_with_retries(self.policy, op).await.is_some() {
            return Ok(true);
        }
        self.locator
            .stats()
            .record_retries(Operation::SendKeys, self.policy.retries as u64);
        Ok(false)
    }

    async fn type_once(
        &self,
        page: &Page,
        element: &Element,
        text: &str,
        clear_first: bool,
        cadence: &TypingCadence,
    ) -> Result<()> {
        element.scroll_into_view().await?;
        element.click().await?;
        if clear_first {
            self.clear_field(page).await?;
        }
        type_like_human(element, text, cadence).await
    }

    /// Empty the focused field: programmatic value reset first, then
    /// select-all + Delete for editors that ignore value assignment.
    async fn clear_field(&self, page: &Page) -> Result<()> {
        page.evaluate(CLEAR_FOCUSED_SCRIPT).await?;

        // Ctrl modifier bit per the CDP Input domain.
        const CTRL: i64 = 2;
        dispatch_key(page, DispatchKeyEventType::RawKeyDown, "a", "KeyA", 65, CTRL).await?;
        dispatch_key(page, DispatchKeyEventType::KeyUp, "a", "KeyA", 65, CTRL).await?;
        dispatch_key(page, DispatchKeyEventType::RawKeyDown, "Delete", "Delete", 46, 0).await?;
        dispatch_key(page, DispatchKeyEventType::KeyUp, "Delete", "Delete", 46, 0).await?;
        Ok(())
    }

    /// Extract the target's rendered text.
    ///
    /// Tries the element's inner text first, then falls back to reading
    /// `innerText` and `textContent` straight off the handle, so a
    /// concurrent re-render cannot swap a different node underneath the
    /// read. Returns `Ok(None)` once every attempt yields nothing;
    /// whitespace-only text counts as nothing.
    #[instrument(skip(self, page, target))]
    pub async fn safe_get_text(&self, page: &Page, target: &Target) -> Result<Option<String>> {
        let (resolved, _) = self.resolve(page, target, &WaitStrategy::Presence).await?;
        let op = GetTextOp {
            interactor: self,
            page,
            target,
            resolved,
        };

        match run_with_retries(self.policy, op).await {
            Some(text) => Ok(Some(text)),
            None => {
                self.locator
                    .stats()
                    .record_retries(Operation::GetText, self.policy.retries as u64);
                Ok(None)
            }
        }
    }

    async fn text_once(&self, element: &Element) -> Result<Option<String>> {
        if let Some(text) = element.inner_text().await? {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }

        // Rendered text can come back empty while the node still carries
        // data (hidden containers, streaming placeholders).
        for property in ["innerText", "textContent"] {
            let returns = element.call_js_fn(property_fn(property), false).await?;
            if let Some(text) = returns.result.value.as_ref().and_then(|v| v.as_str()) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Ok(Some(trimmed.to_string()));
                }
            }
        }

        Ok(None)
    }

    /// Wait for the target to leave the DOM.
    ///
    /// Candidates are tried in order, each against the full timeout: the
    /// first selector that stops matching any node settles the result as
    /// `Ok(true)` (a selector that never matched counts immediately). A
    /// selector that keeps matching through its whole window falls
    /// through to the next candidate; `Ok(false)` means every candidate
    /// still matched at its deadline.
    #[instrument(skip(self, page, selectors))]
    pub async fn wait_for_disappearance(
        &self,
        page: &Page,
        selectors: &[String],
        timeout: Option<Duration>,
    ) -> Result<bool> {
        let timeout = timeout.unwrap_or(self.locator.default_timeout());

        let gone = first_match(selectors.len(), |idx| {
            let selector = &selectors[idx];
            debug!(%selector, "Waiting for selector to stop matching");
            self.wait_gone(page, selector, timeout)
        })
        .await;

        match &gone {
            Some((idx, ())) => debug!(selector = %selectors[*idx], "Element gone"),
            None => debug!("Element still present at every deadline"),
        }
        Ok(gone.is_some())
    }

    /// Poll the absence predicate for one selector until it holds or the
    /// window closes.
    async fn wait_gone(&self, page: &Page, selector: &str, timeout: Duration) -> Option<()> {
        let script = absence_script(selector);
        let deadline = Instant::now() + timeout;

        loop {
            match page.evaluate(script.as_str()).await {
                Ok(result) => {
                    if result.into_value::<bool>().unwrap_or(false) {
                        return Some(());
                    }
                }
                Err(e) => {
                    // A page mid-navigation has no matching element either
                    // way; keep polling until the deadline settles it.
                    debug!(%selector, error = %e, "Absence poll failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Smooth-scroll the target into the viewport center and let the
    /// scroll settle. Returns `Ok(false)` when the scroll itself fails on
    /// an otherwise resolved element.
    #[instrument(skip(self, page, target))]
    pub async fn scroll_to_element(&self, page: &Page, target: &Target) -> Result<bool> {
        let (resolved, selector) = self.resolve(page, target, &WaitStrategy::Presence).await?;

        let scrolled = match selector {
            Some(selector) => {
                let script = format!(
                    r#"(() => {{
                        const el = document.querySelector('{}');
                        if (!el) return false;
                        el.scrollIntoView({{ behavior: 'smooth', block: 'center' }});
                        return true;
                    }})()"#,
                    js_escape(&selector)
                );
                match page.evaluate(script.as_str()).await {
                    Ok(result) => result.into_value::<bool>().unwrap_or(false),
                    Err(e) => {
                        warn!(error = %e, "Scroll script failed");
                        false
                    }
                }
            }
            None => match resolved.element().scroll_into_view().await {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %e, "Scroll into view failed");
                    false
                }
            },
        };

        if scrolled {
            // Let the smooth scroll animation finish.
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Ok(scrolled)
    }
}

/// Property read bound to the live handle (`this` is the element), so the
/// fallback never re-queries the selector and reads a different node.
fn property_fn(property: &str) -> String {
    format!("function() {{ return this.{property}; }}")
}

/// Negated presence predicate: true once no node matches the selector.
/// Absence deliberately ignores visibility; a hidden node still counts
/// as present.
fn absence_script(selector: &str) -> String {
    format!(
        "document.querySelector('{}') === null",
        js_escape(selector)
    )
}

async fn dispatch_key(
    page: &Page,
    event: DispatchKeyEventType,
    key: &str,
    code: &str,
    virtual_key_code: i64,
    modifiers: i64,
) -> Result<()> {
    let params = DispatchKeyEventParams::builder()
        .r#type(event)
        .key(key)
        .code(code)
        .windows_virtual_key_code(virtual_key_code)
        .native_virtual_key_code(virtual_key_code)
        .modifiers(modifiers)
        .build()
        .map_err(Error::cdp)?;
    page.execute(params).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 3);
        assert_eq!(policy.backoff, Duration::from_millis(500));
        assert_eq!(policy.attempts(), 4);
    }

    #[test]
    fn test_zero_retries_still_attempts_once() {
        let policy = RetryPolicy {
            retries: 0,
            backoff: Duration::ZERO,
        };
        assert_eq!(policy.attempts(), 1);
    }

    #[test]
    fn test_target_from_selector_list() {
        let target = Target::selectors(["div.main", "div"]);
        match target {
            Target::Selectors(selectors) => {
                assert_eq!(selectors, vec!["div.main".to_string(), "div".to_string()]);
            }
            Target::Element(_) => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_clear_script_handles_missing_focus() {
        assert!(CLEAR_FOCUSED_SCRIPT.contains("document.activeElement"));
        assert!(CLEAR_FOCUSED_SCRIPT.contains("return false"));
    }

    #[test]
    fn test_interactor_policy_override() {
        let interactor = Interactor::new(ElementLocator::default()).with_retry_policy(RetryPolicy {
            retries: 1,
            backoff: Duration::from_millis(100),
        });
        assert_eq!(interactor.retry_policy().attempts(), 2);
    }

    #[test]
    fn test_absence_script_is_negated_presence() {
        let script = absence_script("div.spinner");
        assert!(script.contains("querySelector('div.spinner')"));
        assert!(script.contains("=== null"));
        // Absence is about the DOM, not rendering.
        assert!(!script.contains("visibility"));
        assert!(!script.contains("getBoundingClientRect"));
    }

    #[test]
    fn test_absence_script_escapes_quotes() {
        let script = absence_script("div[data-state='loading']");
        assert!(script.contains("div[data-state=\\'loading\\']"));
    }

    #[test]
    fn test_text_fallbacks_read_the_handle_not_the_selector() {
        for property in ["innerText", "textContent"] {
            let function = property_fn(property);
            assert!(function.contains(&format!("this.{property}")));
            assert!(!function.contains("querySelector"));
        }
    }

    #[test]
    fn test_element_clickable_fn_matches_clickable_strategy_checks() {
        for check in ["getBoundingClientRect", "pointerEvents", "disabled", "visibility"] {
            assert!(
                ELEMENT_CLICKABLE_FN.contains(check),
                "missing {check} check"
            );
            assert!(
                WaitStrategy::Clickable.predicate_script("button").contains(check),
                "strategy missing {check} check"
            );
        }
    }

    #[tokio::test]
    async fn test_disappearance_settles_on_first_gone_candidate() {
        // One candidate keeps matching forever, the other never matched
        // at all: the never-matching candidate settles the wait at once.
        let gone = first_match(2, |idx| async move {
            match idx {
                0 => None, // e.g. a spinner that never leaves the DOM
                _ => Some(()),
            }
        })
        .await;
        assert_eq!(gone, Some((1, ())));
    }

    struct FlakyOp<'a> {
        calls: &'a std::cell::Cell<u32>,
        recoveries: &'a std::cell::Cell<u32>,
        succeed_on: Option<u32>,
        stale_on: Option<u32>,
    }

    impl RetryOp for FlakyOp<'_> {
        type Output = u32;

        async fn attempt(&mut self, attempt: u32) -> Attempt<u32> {
            self.calls.set(self.calls.get() + 1);
            if Some(attempt) == self.stale_on {
                return Attempt::Stale;
            }
            if Some(attempt) == self.succeed_on {
                return Attempt::Done(attempt);
            }
            Attempt::Retry
        }

        async fn recover(&mut self) {
            self.recoveries.set(self.recoveries.get() + 1);
        }
    }

    #[tokio::test]
    async fn test_retry_loop_spends_exactly_retries_plus_one_attempts() {
        let calls = std::cell::Cell::new(0);
        let recoveries = std::cell::Cell::new(0);
        let policy = RetryPolicy {
            retries: 3,
            backoff: Duration::ZERO,
        };
        let outcome = run_with_retries(
            policy,
            FlakyOp {
                calls: &calls,
                recoveries: &recoveries,
                succeed_on: None,
                stale_on: None,
            },
        )
        .await;
        assert_eq!(outcome, None);
        assert_eq!(calls.get(), policy.attempts());
    }

    #[tokio::test]
    async fn test_retry_loop_stops_at_first_success() {
        let calls = std::cell::Cell::new(0);
        let recoveries = std::cell::Cell::new(0);
        let policy = RetryPolicy {
            retries: 3,
            backoff: Duration::ZERO,
        };
        let outcome = run_with_retries(
            policy,
            FlakyOp {
                calls: &calls,
                recoveries: &recoveries,
                succeed_on: Some(1),
                stale_on: None,
            },
        )
        .await;
        assert_eq!(outcome, Some(1));
        assert_eq!(calls.get(), 2);
        assert_eq!(recoveries.get(), 0);
    }

    #[tokio::test]
    async fn test_retry_loop_recovers_after_stale_attempt() {
        let calls = std::cell::Cell::new(0);
        let recoveries = std::cell::Cell::new(0);
        let policy = RetryPolicy {
            retries: 2,
            backoff: Duration::ZERO,
        };
        let outcome = run_with_retries(
            policy,
            FlakyOp {
                calls: &calls,
                recoveries: &recoveries,
                succeed_on: Some(1),
                stale_on: Some(0),
            },
        )
        .await;
        assert_eq!(outcome, Some(1));
        assert_eq!(calls.get(), 2);
        assert_eq!(recoveries.get(), 1);
    }
}
