//! Finds a reference image on screen.
//!
//! Every call captures first and loads the reference image second, so a fresh
//! screenshot is available for diagnostics whichever step fails.
use std::path::Path;

use crate::errors::{ClickshotError, ClickshotResult};
use crate::perception::image::{Image, DEFAULT_THRESHOLD};
use crate::perception::screenshot::ScreenGrabber;
use crate::perception::types::Rect;

pub struct Locater {
    grabber: ScreenGrabber,
    threshold: f64,
    last_screenshot: Option<Image>,
}

impl Locater {
    pub fn new(grabber: ScreenGrabber) -> Self {
        Self {
            grabber,
            threshold: DEFAULT_THRESHOLD,
            last_screenshot: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Most recent capture, or `None` before the first search.
    pub fn last_screenshot(&self) -> Option<&Image> {
        self.last_screenshot.as_ref()
    }

    /// Search `boundary` (whole display when `None`) for the image at `image_path`.
    /// The returned rectangle is in screen coordinates.
    pub fn locate(&mut self, image_path: &Path, boundary: Option<Rect>) -> ClickshotResult<Rect> {
        let region = self.grabber.region(boundary)?;
        let screenshot = self.last_screenshot.insert(self.grabber.grab(Some(region))?);

        let template = Image::load(image_path)?;
        let found = screenshot.match_template(&template, self.threshold)?;

        tracing::debug!(
            image = %image_path.display(),
            rect = %found,
            "template matched"
        );
        Ok(found.offset(region.left, region.top))
    }

    /// Check whether the image sits exactly at `expected`, with a single capture of
    /// that rectangle. `Ok(false)` means the pixels there do not match.
    pub fn location_matches_expected(
        &mut self,
        image_path: &Path,
        expected: Rect,
    ) -> ClickshotResult<bool> {
        let screenshot = self.last_screenshot.insert(self.grabber.grab(Some(expected))?);

        let template = Image::load(image_path)?;
        match screenshot.match_template(&template, self.threshold) {
            Ok(_) => Ok(true),
            Err(ClickshotError::ElementNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
