//! Visibility assertions for test suites driving a real UI.
//!
//! ```ignore
//! assert_visible(region.element("ok")?, &eventually_visible());
//! ```
use std::time::Duration;

use crate::engine::element::Element;
use crate::errors::{ClickshotError, ClickshotResult};

pub const EVENTUAL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visible {
    timeout: Duration,
}

/// Visible right now, with a single capture.
pub fn visible() -> Visible {
    Visible {
        timeout: Duration::ZERO,
    }
}

/// Visible at some point within the next 30 seconds.
pub fn eventually_visible() -> Visible {
    eventually_visible_within(EVENTUAL_TIMEOUT)
}

pub fn eventually_visible_within(timeout: Duration) -> Visible {
    Visible { timeout }
}

impl Visible {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A missing reference image saves the screenshot and is returned as an error
    /// rather than counting as a mismatch.
    pub fn matches(&self, element: &mut Element) -> ClickshotResult<bool> {
        match element.is_visible(self.timeout) {
            Err(e @ ClickshotError::ImageNotFound(_)) => {
                save_quietly(element);
                Err(e)
            }
            other => other,
        }
    }

    pub fn describe(&self) -> &'static str {
        "to be visible"
    }

    /// Also saves the last screenshot for diagnosis.
    pub fn describe_mismatch(&self, element: &Element) -> &'static str {
        save_quietly(element);
        "it was not found"
    }
}

fn save_quietly(element: &Element) {
    if let Err(e) = element.save_last_screenshot() {
        tracing::warn!(element = %element, error = %e, "could not save diagnostic screenshot");
    }
}

/// Panics unless `element` satisfies `matcher`.
pub fn assert_visible(element: &mut Element, matcher: &Visible) {
    match matcher.matches(element) {
        Ok(true) => {}
        Ok(false) => panic!(
            "\nExpected: {}\n     but: {}\n",
            matcher.describe(),
            matcher.describe_mismatch(element)
        ),
        Err(e) => panic!("\nExpected: {}\n     but: {element}: {e}\n", matcher.describe()),
    }
}

/// Panics if `element` is visible.
pub fn assert_not_visible(element: &mut Element, matcher: &Visible) {
    match matcher.matches(element) {
        Ok(false) => {}
        Ok(true) => panic!("\nExpected: not {}\n     but: it was\n", matcher.describe()),
        Err(e) => panic!("\nExpected: not {}\n     but: {element}: {e}\n", matcher.describe()),
    }
}
