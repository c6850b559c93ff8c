//! Pixel buffer wrapper used for both screen captures and reference images.
//!
//! Images are always held as 8-bit RGB. Template matching scores every alignment
//! with the normalized squared difference over all three channels, so a score of
//! `0.0` is a pixel-perfect match and larger scores are worse.
use std::path::{Path, PathBuf};

use image::RgbImage;
use imageproc::integral_image::{integral_squared_image, sum_image_pixels};

use crate::errors::{ClickshotError, ClickshotResult};
use crate::perception::types::Rect;

/// Highest dissimilarity score still accepted as a match.
pub const DEFAULT_THRESHOLD: f64 = 0.001;

/// Best alignment of a template inside a larger image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub rect: Rect,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image {
    data: Option<RgbImage>,
}

impl From<RgbImage> for Image {
    fn from(data: RgbImage) -> Self {
        Self { data: Some(data) }
    }
}

impl Image {
    pub fn new(data: RgbImage) -> Self {
        Self::from(data)
    }

    /// Placeholder with no pixel data; width and height are unset.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn data(&self) -> Option<&RgbImage> {
        self.data.as_ref()
    }

    pub fn width(&self) -> Option<u32> {
        self.data.as_ref().map(|d| d.width())
    }

    pub fn height(&self) -> Option<u32> {
        self.data.as_ref().map(|d| d.height())
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.data.as_ref().map(|d| d.dimensions())
    }

    pub fn load(path: impl AsRef<Path>) -> ClickshotResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClickshotError::ImageNotFound(path.to_path_buf()));
        }
        let data = image::open(path)?.to_rgb8();
        tracing::trace!(path = %path.display(), w = data.width(), h = data.height(), "image loaded");
        Ok(Self::from(data))
    }

    /// Writes the image as `path`, or as `path` with `_2`, `_3`, … appended to the
    /// file stem when that name is taken. Returns the path actually written.
    pub fn save(&self, path: impl AsRef<Path>) -> ClickshotResult<PathBuf> {
        let data = self.data.as_ref().ok_or(ClickshotError::EmptyImage)?;
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let unique = unique_path(path);
        data.save(&unique)?;
        tracing::debug!(path = %unique.display(), "image saved");
        Ok(unique)
    }

    /// Locate `template` inside this image. Fails with `ElementNotFound` when no
    /// alignment scores at or below `threshold`; the score in that error is the
    /// lowest one seen before each alignment was given up on, so it only bounds the
    /// true best from below.
    pub fn match_template(&self, template: &Image, threshold: f64) -> ClickshotResult<Rect> {
        let (haystack, needle) = self.pair(template)?;
        match search(haystack, needle, threshold) {
            Ok(found) => Ok(found.rect),
            Err(score) => Err(ClickshotError::ElementNotFound { score, threshold }),
        }
    }

    /// Lowest-scoring alignment of `template`, with its exact score.
    /// A template that does not fit inside this image never matches.
    pub fn best_match(&self, template: &Image) -> ClickshotResult<Match> {
        let (haystack, needle) = self.pair(template)?;
        search(haystack, needle, f64::INFINITY)
            .map_err(|score| ClickshotError::ElementNotFound { score, threshold: 0.0 })
    }

    fn pair<'a>(&'a self, template: &'a Image) -> ClickshotResult<(&'a RgbImage, &'a RgbImage)> {
        let haystack = self.data.as_ref().ok_or(ClickshotError::EmptyImage)?;
        let needle = template.data.as_ref().ok_or(ClickshotError::EmptyImage)?;
        Ok((haystack, needle))
    }
}

/// First free name among `path`, `stem_2.ext`, `stem_3.ext`, …
/// The filesystem is checked for every candidate.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut count: u32 = 2;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem}_{count}.{ext}"),
            None => format!("{stem}_{count}"),
        };
        let candidate = path.with_file_name(name);
        if !candidate.exists() {
            return candidate;
        }
        count += 1;
    }
}

// ── Matching ────────────────────────────────────────────────────────────────

/// Normalized squared difference, summed over the R, G and B channels:
///
/// `score(x, y) = Σ(T - I)² / sqrt(ΣT² · ΣI²)`
///
/// Returns the lowest-scoring alignment with a score no greater than `limit`, ties
/// going to the first in raster order. Each alignment is abandoned as soon as its
/// running difference can no longer beat `limit` or the best so far, so unrelated
/// screen content costs a pixel or two per position. `Err` carries the lowest score
/// seen when nothing qualified.
fn search(haystack: &RgbImage, needle: &RgbImage, limit: f64) -> Result<Match, f64> {
    let (hw, hh) = haystack.dimensions();
    let (nw, nh) = needle.dimensions();
    if nw == 0 || nh == 0 || nw > hw || nh > hh {
        return Err(1.0);
    }

    let template_energy: u64 = needle.as_raw().iter().map(|&v| square(v)).sum();
    let energy = integral_squared_image::<_, u64>(haystack);

    let mut best: Option<Match> = None;
    let mut lowest = f64::INFINITY;
    for y in 0..=hh - nh {
        for x in 0..=hw - nw {
            let window: u64 = sum_image_pixels(&energy, x, y, x + nw - 1, y + nh - 1)
                .iter()
                .sum();
            let denom = (template_energy as f64 * window as f64).sqrt();
            let bound = best.map_or(limit, |b| b.score.min(limit));

            let score = if denom > f64::EPSILON {
                match window_diff(haystack, needle, x, y, cutoff(bound * denom * SLACK)) {
                    Diff::Full(d) => d as f64 / denom,
                    Diff::Abandoned(d) => {
                        lowest = lowest.min(d as f64 / denom);
                        continue;
                    }
                }
            } else {
                // Blank template or window: only an exact match scores 0.
                match window_diff(haystack, needle, x, y, 0) {
                    Diff::Full(_) => 0.0,
                    Diff::Abandoned(_) => 1.0,
                }
            };

            if score > limit {
                lowest = lowest.min(score);
            } else if best.map_or(true, |b| score < b.score) {
                let found = Match {
                    rect: Rect::new(x as i32, y as i32, nw, nh),
                    score,
                };
                // Nothing scores below a perfect match.
                if score == 0.0 {
                    return Ok(found);
                }
                best = Some(found);
            }
        }
    }
    best.ok_or(lowest)
}

enum Diff {
    Full(u64),
    Abandoned(u64),
}

/// Σ(T - I)² for the window at (x, y), stopping once it exceeds `cutoff`.
fn window_diff(haystack: &RgbImage, needle: &RgbImage, x: u32, y: u32, cutoff: u64) -> Diff {
    let hay = haystack.as_raw();
    let hay_stride = haystack.width() as usize * 3;
    let row_len = needle.width() as usize * 3;

    let mut sum = 0u64;
    for (r, template_row) in needle.as_raw().chunks_exact(row_len).enumerate() {
        let start = (y as usize + r) * hay_stride + x as usize * 3;
        let window_row = &hay[start..start + row_len];
        for (t, i) in template_row.chunks_exact(3).zip(window_row.chunks_exact(3)) {
            sum += square(t[0].abs_diff(i[0]))
                + square(t[1].abs_diff(i[1]))
                + square(t[2].abs_diff(i[2]));
            if sum > cutoff {
                return Diff::Abandoned(sum);
            }
        }
    }
    Diff::Full(sum)
}

/// Widens the cutoff past float rounding; the exact score decides acceptance.
const SLACK: f64 = 1.0 + 1e-9;

/// Largest integer difference whose score stays within the bound.
fn cutoff(max_diff: f64) -> u64 {
    if max_diff >= u64::MAX as f64 {
        u64::MAX
    } else {
        max_diff.floor() as u64
    }
}

fn square(v: u8) -> u64 {
    (v as u64) * (v as u64)
}
