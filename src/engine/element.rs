use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::config::Config;
use crate::devices::Devices;
use crate::engine::events::Event;
use crate::engine::retry::{retry_with_timeout, Attempt, RetryPolicy};
use crate::errors::{ClickshotError, ClickshotResult};
use crate::executor::input::Button;
use crate::perception::locater::Locater;
use crate::perception::screenshot::ScreenGrabber;
use crate::perception::types::Rect;

/// Pause between moving the pointer and pressing the button.
pub const SETTLE_DELAY: Duration = Duration::from_millis(10);

/// How long an operator gets to act after skipping a missing reference image.
pub const OPERATOR_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElementConfig {
    pub name: String,
    #[serde(default)]
    pub click_offset: (i32, i32),
    /// Where the element normally sits. Checked with a single capture before the
    /// full search.
    #[serde(default)]
    pub expected_rect: Option<Rect>,
    #[serde(default)]
    pub post_click_delay_ms: Option<u64>,
}

impl ElementConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            click_offset: (0, 0),
            expected_rect: None,
            post_click_delay_ms: None,
        }
    }

    pub fn with_click_offset(mut self, dx: i32, dy: i32) -> Self {
        self.click_offset = (dx, dy);
        self
    }

    pub fn with_expected_rect(mut self, rect: Rect) -> Self {
        self.expected_rect = Some(rect);
        self
    }

    pub fn with_post_click_delay(mut self, delay: Duration) -> Self {
        self.post_click_delay_ms = Some(delay.as_millis() as u64);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickOptions {
    pub button: Button,
    pub count: u32,
    /// Falls back to the configured `click_retry_seconds`.
    pub timeout: Option<Duration>,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            button: Button::Left,
            count: 1,
            timeout: None,
        }
    }
}

/// One on-screen target: a reference image searched for inside its region's
/// boundary.
pub struct Element {
    name: String,
    full_name: String,
    image_path: PathBuf,
    screenshot_path: PathBuf,
    boundary: Option<Rect>,
    click_offset: (i32, i32),
    expected_rect: Option<Rect>,
    post_click_delay: Option<Duration>,
    settings: Config,
    locater: Locater,
    devices: Devices,
}

impl Element {
    pub fn new(
        config: &ElementConfig,
        region: &str,
        boundary: Option<Rect>,
        settings: &Config,
        devices: Devices,
    ) -> Self {
        let full_name = format!("{region}-{}", config.name);
        let file_name = format!("{full_name}.png");
        Self {
            name: config.name.clone(),
            image_path: settings.image_dir().join(&file_name),
            screenshot_path: settings.screenshot_dir().join(&file_name),
            full_name,
            boundary,
            click_offset: config.click_offset,
            expected_rect: config.expected_rect,
            post_click_delay: config.post_click_delay_ms.map(Duration::from_millis),
            settings: settings.clone(),
            locater: Locater::new(ScreenGrabber::new(devices.screen.clone())),
            devices,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn boundary(&self) -> Option<Rect> {
        self.boundary
    }

    /// Find the element (retrying up to the timeout) and click it. A diagnostic
    /// screenshot is saved before any search failure is returned.
    pub fn click(&mut self, opts: ClickOptions) -> ClickshotResult<()> {
        let timeout = opts.timeout.unwrap_or_else(|| self.settings.default_timeout());
        let Some(rect) = self.search_or_save(timeout)? else {
            return Ok(());
        };

        let (x, y) = self.click_point(rect);
        let pointer = &self.devices.pointer;
        pointer.move_to(x, y)?;
        self.devices.clock.sleep(SETTLE_DELAY);
        pointer.click(opts.button, opts.count)?;
        tracing::info!(element = %self.full_name, x, y, button = ?opts.button, "clicked");

        if let Some(delay) = self.post_click_delay {
            self.devices.clock.sleep(delay);
        }
        Ok(())
    }

    /// `false` when the element is not found within `timeout`. Any other failure,
    /// such as a missing reference image, is returned as an error.
    pub fn is_visible(&mut self, timeout: Duration) -> ClickshotResult<bool> {
        match self.search(timeout) {
            Ok(_) => Ok(true),
            Err(ClickshotError::ElementNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Search without clicking.
    pub fn wait_until_visible(&mut self, timeout: Option<Duration>) -> ClickshotResult<()> {
        let timeout = timeout.unwrap_or_else(|| self.settings.default_timeout());
        self.search_or_save(timeout).map(|_| ())
    }

    /// Persist the most recent capture next to the other diagnostics. Returns the
    /// written path, or `None` when nothing has been captured yet.
    pub fn save_last_screenshot(&self) -> ClickshotResult<Option<PathBuf>> {
        let Some(screenshot) = self.locater.last_screenshot() else {
            return Ok(None);
        };
        let written = screenshot.save(&self.screenshot_path)?;
        self.devices.reporter.report(&Event::ScreenshotSaved {
            expected_image: self.image_path.clone(),
            screenshot: written.clone(),
        });
        Ok(Some(written))
    }

    fn search_or_save(&mut self, timeout: Duration) -> ClickshotResult<Option<Rect>> {
        self.search(timeout).map_err(|e| {
            if let Err(save_err) = self.save_last_screenshot() {
                tracing::warn!(
                    element = %self.full_name,
                    error = %save_err,
                    "could not save diagnostic screenshot"
                );
            }
            e
        })
    }

    /// Locate the element in screen coordinates. `None` means the operator chose
    /// to go on without a reference image.
    fn search(&mut self, timeout: Duration) -> ClickshotResult<Option<Rect>> {
        self.devices.abort.arm()?;

        if self.settings.interactive && !self.image_path.exists() && self.operator_skips() {
            return Ok(None);
        }

        let mut failed_attempts = 0u32;
        if let Some(expected) = self.expected_rect {
            match self
                .locater
                .location_matches_expected(&self.image_path, expected)
            {
                Ok(true) => return Ok(Some(expected)),
                Ok(false) => failed_attempts += 1,
                Err(e) if e.is_recoverable() => failed_attempts += 1,
                Err(e) => return Err(e),
            }
        }

        let found = self.locate_with_retry(timeout, &mut failed_attempts)?;

        if self.expected_rect != Some(found) {
            self.devices.reporter.report(&Event::UnexpectedLocation {
                element: self.name.clone(),
                expected: self.expected_rect,
                actual: found,
            });
        }
        if self.settings.warn_for_delayed_detections && failed_attempts > 0 {
            self.devices.reporter.report(&Event::DelayedDetection {
                element: self.name.clone(),
                failed_attempts,
            });
        }
        Ok(Some(found))
    }

    fn locate_with_retry(
        &mut self,
        timeout: Duration,
        failed_attempts: &mut u32,
    ) -> ClickshotResult<Rect> {
        let policy = RetryPolicy::new(timeout)
            .with_interval(self.settings.retry_interval())
            .with_progress(self.settings.log_progress);
        let devices = &self.devices;
        let locater = &mut self.locater;
        let image_path = self.image_path.as_path();
        let boundary = self.boundary;
        let name = self.name.as_str();

        retry_with_timeout(
            &policy,
            devices.clock.as_ref(),
            devices.reporter.as_ref(),
            || match locater.locate(image_path, boundary) {
                Ok(rect) => Ok(rect),
                Err(e) if e.is_recoverable() => {
                    *failed_attempts += 1;
                    if devices.abort.tripped() {
                        devices.reporter.report(&Event::Aborted {
                            element: name.to_string(),
                            reason: devices.abort.reason(),
                        });
                        Err(Attempt::Abort(e))
                    } else {
                        Err(Attempt::Recoverable(e))
                    }
                }
                Err(e) => Err(Attempt::Abort(e)),
            },
        )
    }

    fn operator_skips(&self) -> bool {
        let question = format!(
            "Reference image {} for {} is missing. Continue without it?",
            self.image_path.display(),
            self.full_name
        );
        if !self.devices.confirm.confirm(&question) {
            return false;
        }
        self.devices.reporter.report(&Event::OperatorSkipped {
            element: self.name.clone(),
        });
        self.devices.clock.sleep(OPERATOR_GRACE);
        true
    }

    fn click_point(&self, rect: Rect) -> (i32, i32) {
        let (cx, cy) = rect.center();
        let scaling = self.settings.screenshot_scaling.max(1) as i32;
        (
            (cx + self.click_offset.0) / scaling,
            (cy + self.click_offset.1) / scaling,
        )
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Element name='{}'>", self.name)
    }
}
