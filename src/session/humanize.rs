//! Human-like input primitives
//!
//! Keystroke cadence, cursor movement, idle scrolling, and randomized
//! waits. Keystroke delays are drawn from a Gaussian centered on the
//! midpoint of the configured range and clamped to its bounds, so the
//! cadence clusters around a natural rhythm without hard outliers.

use crate::error::Result;
use chromiumoxide::layout::Point;
use chromiumoxide::{Element, Page};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::time::Duration;
use tracing::{debug, instrument};

/// Keystroke timing profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypingCadence {
    /// Lower bound on inter-keystroke delay
    pub min_delay: Duration,
    /// Upper bound on inter-keystroke delay
    pub max_delay: Duration,
    /// Probability of a transient typo (typed then backspaced)
    pub typo_probability: f64,
}

impl Default for TypingCadence {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(30),
            max_delay: Duration::from_millis(100),
            typo_probability: 0.01,
        }
    }
}

impl TypingCadence {
    /// Draw one inter-keystroke delay for the given character.
    fn delay_for(&self, c: char) -> Duration {
        let base = bounded_gaussian(
            self.min_delay.as_secs_f64(),
            self.max_delay.as_secs_f64(),
        );
        Duration::from_secs_f64(base * char_delay_multiplier(c))
    }
}

/// Sample from a Gaussian centered on the midpoint of `[min, max]` with a
/// standard deviation of one sixth of the range, clamped to the bounds.
pub(crate) fn bounded_gaussian(min: f64, max: f64) -> f64 {
    if max <= min {
        return min;
    }
    let mean = (min + max) / 2.0;
    let sd = (max - min) / 6.0;
    match Normal::new(mean, sd) {
        Ok(dist) => dist.sample(&mut rand::rng()).clamp(min, max),
        Err(_) => mean,
    }
}

/// Pause multiplier per character class. Word boundaries and punctuation
/// take longer than letters, matching real typing rhythm.
pub(crate) fn char_delay_multiplier(c: char) -> f64 {
    if c.is_whitespace() {
        1.5
    } else if c.is_ascii_punctuation() {
        2.0
    } else {
        1.0
    }
}

/// Neighboring key on a QWERTY row, used for plausible typos.
fn typo_for(c: char) -> char {
    const ROWS: [&str; 3] = ["qwertyuiop", "asdfghjkl", "zxcvbnm"];
    let lower = c.to_ascii_lowercase();
    for row in ROWS {
        if let Some(idx) = row.find(lower) {
            let shifted = if idx + 1 < row.len() { idx + 1 } else { idx.saturating_sub(1) };
            if let Some(neighbor) = row.chars().nth(shifted) {
                return neighbor;
            }
        }
    }
    'x'
}

/// Type text into an element one character at a time with human cadence.
///
/// Occasionally (per [`TypingCadence::typo_probability`]) types a wrong
/// neighboring key, pauses, and corrects it with Backspace. The element
/// must already hold focus.
#[instrument(skip(element, text, cadence), fields(chars = text.chars().count()))]
pub async fn type_like_human(
    element: &Element,
    text: &str,
    cadence: &TypingCadence,
) -> Result<()> {
    for c in text.chars() {
        if c.is_alphanumeric() && rand::rng().random_bool(cadence.typo_probability) {
            let wrong = typo_for(c);
            element.type_str(wrong.to_string()).await?;
            tokio::time::sleep(cadence.delay_for(wrong).mul_f64(2.0)).await;
            element.press_key("Backspace").await?;
            tokio::time::sleep(cadence.delay_for(c)).await;
        }

        element.type_str(c.to_string()).await?;
        tokio::time::sleep(cadence.delay_for(c)).await;
    }

    debug!("Finished human-cadence typing");
    Ok(())
}

/// Move the cursor from one point to another along a jittered path.
///
/// The path is 5 to 10 intermediate points on the straight line, each
/// offset by up to ±20px, with a short pause between steps.
#[instrument(skip(page))]
pub async fn move_mouse_along_curve(page: &Page, from: Point, to: Point) -> Result<()> {
    let steps = rand::rng().random_range(5..=10);

    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        let (jx, jy) = if i < steps {
            let mut rng = rand::rng();
            (rng.random_range(-20.0..=20.0), rng.random_range(-20.0..=20.0))
        } else {
            // Land exactly on the target.
            (0.0, 0.0)
        };

        let x = from.x + (to.x - from.x) * t + jx;
        let y = from.y + (to.y - from.y) * t + jy;
        page.move_mouse(Point::new(x, y)).await?;

        let pause = rand::rng().random_range(10..40);
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }

    Ok(())
}

/// Random coordinate inside `[margin, size - margin)`, degrading to the
/// midpoint when the dimension is too small to leave both margins.
pub(crate) fn random_coord(rng: &mut impl Rng, size: f64, margin: f64) -> f64 {
    if size <= margin * 2.0 {
        size / 2.0
    } else {
        rng.random_range(margin..(size - margin))
    }
}

/// Signed scroll distance of 100 to 500 px, equally likely up or down.
pub(crate) fn random_scroll_amount(rng: &mut impl Rng) -> i64 {
    let magnitude: i64 = rng.random_range(100..500);
    if rng.random_bool(0.5) {
        magnitude
    } else {
        -magnitude
    }
}

/// Drift the cursor to a random point inside the window.
#[instrument(skip(page))]
pub async fn move_mouse_randomly(page: &Page, width: u32, height: u32) -> Result<()> {
    let (from, to) = {
        let mut rng = rand::rng();
        let margin = 10.0;
        let (w, h) = (f64::from(width), f64::from(height));
        let from = Point::new(
            random_coord(&mut rng, w, margin),
            random_coord(&mut rng, h, margin),
        );
        let to = Point::new(
            random_coord(&mut rng, w, margin),
            random_coord(&mut rng, h, margin),
        );
        (from, to)
    };
    move_mouse_along_curve(page, from, to).await
}

/// Scroll the page up or down by a small random amount, sometimes
/// drifting partway back, like a reader skimming.
#[instrument(skip(page))]
pub async fn scroll_randomly(page: &Page) -> Result<()> {
    let amount = random_scroll_amount(&mut rand::rng());
    page.evaluate(format!(
        "window.scrollBy({{ top: {amount}, behavior: 'smooth' }});"
    ))
    .await?;
    tokio::time::sleep(Duration::from_millis(rand::rng().random_range(500..1500))).await;

    if rand::rng().random_bool(0.3) {
        let back = -amount / 2;
        page.evaluate(format!(
            "window.scrollBy({{ top: {back}, behavior: 'smooth' }});"
        ))
        .await?;
        tokio::time::sleep(Duration::from_millis(rand::rng().random_range(200..500))).await;
    }

    Ok(())
}

/// Sleep for a uniformly random duration in `[min, max]`.
pub async fn wait_random(min: Duration, max: Duration) {
    let duration = if max <= min {
        min
    } else {
        let span = (max - min).as_millis() as u64;
        min + Duration::from_millis(rand::rng().random_range(0..=span))
    };
    tokio::time::sleep(duration).await;
}
