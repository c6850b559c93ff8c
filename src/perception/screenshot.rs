// Screen capture: platform source plus HiDPI correction.
use std::rc::Rc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use xcap::Monitor;

use crate::errors::{ClickshotError, ClickshotResult};
use crate::perception::image::Image;
use crate::perception::types::Rect;

/// Raw pixel source for a rectangle of the display.
///
/// Implementations may return the region at the display's backing-store scale;
/// `ScreenGrabber` resizes it back to logical pixels.
pub trait ScreenSource {
    /// Logical bounds of the primary display.
    fn display_bounds(&self) -> ClickshotResult<Rect>;

    fn capture(&self, rect: Rect) -> ClickshotResult<RgbaImage>;
}

/// Capture backed by `xcap`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapScreen;

impl XcapScreen {
    fn primary() -> ClickshotResult<Monitor> {
        let monitors = Monitor::all()
            .map_err(|e| ClickshotError::Capture(format!("Failed to enumerate monitors: {e}")))?;
        let mut fallback = None;
        for monitor in monitors {
            if monitor.is_primary() {
                return Ok(monitor);
            }
            fallback.get_or_insert(monitor);
        }
        fallback.ok_or_else(|| ClickshotError::Capture("No monitor found".into()))
    }
}

impl ScreenSource for XcapScreen {
    fn display_bounds(&self) -> ClickshotResult<Rect> {
        let monitor = Self::primary()?;
        Ok(Rect::new(
            monitor.x(),
            monitor.y(),
            monitor.width(),
            monitor.height(),
        ))
    }

    fn capture(&self, rect: Rect) -> ClickshotResult<RgbaImage> {
        let monitor = Monitor::from_point(rect.left, rect.top).map_err(|e| {
            ClickshotError::Capture(format!("No monitor at ({}, {}): {e}", rect.left, rect.top))
        })?;
        let full = monitor
            .capture_image()
            .map_err(|e| ClickshotError::Capture(format!("Failed to capture monitor: {e}")))?;

        let bounds = Rect::new(monitor.x(), monitor.y(), monitor.width(), monitor.height());
        let (x, y, w, h) = backing_crop(rect, bounds, full.dimensions())?;

        tracing::trace!(
            monitor = %monitor.name(),
            x, y, w, h,
            "monitor captured and cropped"
        );
        // xcap returns its own `image` version's buffer; rewrap the raw pixels.
        let (fw, fh) = full.dimensions();
        let full = RgbaImage::from_raw(fw, fh, full.into_raw())
            .ok_or_else(|| ClickshotError::Capture("Invalid capture buffer".into()))?;
        Ok(imageops::crop_imm(&full, x, y, w, h).to_image())
    }
}

/// Backing-store crop `(x, y, w, h)` of `rect` inside a monitor whose logical
/// bounds are `monitor` and whose capture measures `full` pixels. A rect that does
/// not lie wholly on the monitor is an error rather than a clamped, stretched crop.
fn backing_crop(
    rect: Rect,
    monitor: Rect,
    full: (u32, u32),
) -> ClickshotResult<(u32, u32, u32, u32)> {
    // Backing-store pixels per logical pixel (2.0 on most HiDPI panels).
    let scale = full.0 as f64 / monitor.width.max(1) as f64;
    let px = |v: f64| (v * scale).round();

    let x = px((rect.left - monitor.left) as f64);
    let y = px((rect.top - monitor.top) as f64);
    let w = px(rect.width as f64);
    let h = px(rect.height as f64);
    if x < 0.0 || y < 0.0 || w < 1.0 || h < 1.0 || x + w > full.0 as f64 || y + h > full.1 as f64
    {
        return Err(ClickshotError::Capture(format!(
            "Region {rect} is not within monitor bounds {monitor}"
        )));
    }
    Ok((x as u32, y as u32, w as u32, h as u32))
}

/// Captures display regions as RGB `Image`s sized exactly to the request.
#[derive(Clone)]
pub struct ScreenGrabber {
    source: Rc<dyn ScreenSource>,
}

impl ScreenGrabber {
    pub fn new(source: Rc<dyn ScreenSource>) -> Self {
        Self { source }
    }

    /// The rectangle `grab(rect)` will capture.
    pub fn region(&self, rect: Option<Rect>) -> ClickshotResult<Rect> {
        match rect {
            Some(rect) => Ok(rect),
            None => self.source.display_bounds(),
        }
    }

    /// Capture `rect`, or the whole primary display when `None`.
    pub fn grab(&self, rect: Option<Rect>) -> ClickshotResult<Image> {
        let rect = self.region(rect)?;
        if rect.is_empty() {
            return Err(ClickshotError::Capture(format!(
                "Cannot capture empty region {rect}"
            )));
        }

        let raw = self.source.capture(rect)?;
        let rgb = DynamicImage::ImageRgba8(raw).to_rgb8();

        if rgb.dimensions() != (rect.width, rect.height) {
            tracing::debug!(
                captured_w = rgb.width(),
                captured_h = rgb.height(),
                w = rect.width,
                h = rect.height,
                "capture size differs from request; resizing"
            );
            let resized = imageops::resize(&rgb, rect.width, rect.height, FilterType::Nearest);
            return Ok(Image::new(resized));
        }

        Ok(Image::new(rgb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{crop, noise_image, FakeScreen};

    #[test]
    fn returns_rgb_pixels_of_requested_rect() {
        let desktop = noise_image(20, 10, 1);
        let screen = Rc::new(FakeScreen::showing(desktop.clone()));
        let grabber = ScreenGrabber::new(screen.clone());

        let rect = Rect::new(2, 3, 5, 4);
        let image = grabber.grab(Some(rect)).unwrap();

        assert_eq!(image.data(), Some(&crop(&desktop, rect)));
        assert_eq!(*screen.requests.borrow(), vec![rect]);
    }

    #[test]
    fn defaults_to_whole_display() {
        let screen = Rc::new(FakeScreen::showing(noise_image(32, 18, 2)));
        let grabber = ScreenGrabber::new(screen.clone());

        let image = grabber.grab(None).unwrap();

        assert_eq!(image.dimensions(), Some((32, 18)));
        assert_eq!(*screen.requests.borrow(), vec![Rect::new(0, 0, 32, 18)]);
    }

    #[test]
    fn resizes_hidpi_capture_to_requested_size() {
        let desktop = noise_image(16, 16, 3);
        let screen = Rc::new(FakeScreen::showing(desktop.clone()).with_scale(2));
        let grabber = ScreenGrabber::new(screen);

        let rect = Rect::new(4, 4, 6, 3);
        let image = grabber.grab(Some(rect)).unwrap();

        assert_eq!(image.dimensions(), Some((6, 3)));
        assert_eq!(image.data(), Some(&crop(&desktop, rect)));
    }

    #[test]
    fn backing_crop_scales_to_capture_pixels() {
        let monitor = Rect::new(0, 0, 1440, 900);

        assert_eq!(
            backing_crop(Rect::new(100, 50, 40, 20), monitor, (2880, 1800)).unwrap(),
            (200, 100, 80, 40)
        );
        assert_eq!(
            backing_crop(Rect::new(1400, 880, 40, 20), monitor, (2880, 1800)).unwrap(),
            (2800, 1760, 80, 40)
        );
    }

    #[test]
    fn backing_crop_is_relative_to_the_monitor_origin() {
        let monitor = Rect::new(1920, 0, 1280, 1024);

        assert_eq!(
            backing_crop(Rect::new(2000, 10, 5, 5), monitor, (1280, 1024)).unwrap(),
            (80, 10, 5, 5)
        );
    }

    #[test]
    fn backing_crop_rejects_rect_past_monitor_edge() {
        let monitor = Rect::new(0, 0, 1440, 900);

        for rect in [
            Rect::new(1420, 10, 40, 20),
            Rect::new(10, 890, 40, 20),
            Rect::new(0, 0, 1441, 900),
        ] {
            assert!(
                matches!(
                    backing_crop(rect, monitor, (2880, 1800)),
                    Err(ClickshotError::Capture(_))
                ),
                "{rect} should not be cropped"
            );
        }
    }

    #[test]
    fn refuses_empty_region() {
        let screen = Rc::new(FakeScreen::showing(noise_image(8, 8, 4)));
        let grabber = ScreenGrabber::new(screen.clone());

        let result = grabber.grab(Some(Rect::new(0, 0, 0, 5)));

        assert!(matches!(result, Err(ClickshotError::Capture(_))));
        assert_eq!(screen.capture_count(), 0);
    }

    #[test]
    fn capture_errors_propagate() {
        let screen = Rc::new(FakeScreen::showing(noise_image(8, 8, 4)).broken());
        let grabber = ScreenGrabber::new(screen);

        assert!(matches!(
            grabber.grab(None),
            Err(ClickshotError::Capture(_))
        ));
    }
}
