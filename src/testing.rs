//! In-memory stand-ins for the screen, pointer, clock and operator prompt.
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use image::{DynamicImage, RgbImage, RgbaImage};

use crate::devices::Devices;
use crate::engine::events::RecordingReporter;
use crate::engine::retry::Clock;
use crate::errors::{ClickshotError, ClickshotResult};
use crate::executor::confirm::Confirm;
use crate::executor::input::{Button, Pointer};
use crate::executor::safety::PointerFailSafe;
use crate::perception::screenshot::ScreenSource;
use crate::perception::types::Rect;

/// Deterministic pseudo-random RGB pixels.
pub fn noise_image(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    RgbImage::from_fn(width, height, |_, _| {
        let mut px = [0u8; 3];
        for c in &mut px {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            *c = (state >> 33) as u8;
        }
        image::Rgb(px)
    })
}

pub fn write_png(dir: &Path, name: &str, img: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    img.save(&path).unwrap();
    path
}

pub fn crop(img: &RgbImage, rect: Rect) -> RgbImage {
    image::imageops::crop_imm(img, rect.left as u32, rect.top as u32, rect.width, rect.height)
        .to_image()
}

// ── Screen ──────────────────────────────────────────────────────────────────

/// Serves crops of a fixed desktop image. Queued frames replace the desktop one per
/// capture; the last frame stays on screen. `scale` simulates a HiDPI backing store.
pub struct FakeScreen {
    desktop: RefCell<RgbImage>,
    frames: RefCell<VecDeque<RgbImage>>,
    scale: u32,
    pub requests: RefCell<Vec<Rect>>,
    fail: Cell<bool>,
}

impl FakeScreen {
    pub fn showing(desktop: RgbImage) -> Self {
        Self {
            desktop: RefCell::new(desktop),
            frames: RefCell::new(VecDeque::new()),
            scale: 1,
            requests: RefCell::new(Vec::new()),
            fail: Cell::new(false),
        }
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn then_showing(self, frame: RgbImage) -> Self {
        self.frames.borrow_mut().push_back(frame);
        self
    }

    pub fn broken(self) -> Self {
        self.fail.set(true);
        self
    }

    pub fn capture_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl ScreenSource for FakeScreen {
    fn display_bounds(&self) -> ClickshotResult<Rect> {
        let desktop = self.desktop.borrow();
        Ok(Rect::new(0, 0, desktop.width(), desktop.height()))
    }

    fn capture(&self, rect: Rect) -> ClickshotResult<RgbaImage> {
        self.requests.borrow_mut().push(rect);
        if self.fail.get() {
            return Err(ClickshotError::Capture("display went away".into()));
        }
        if let Some(next) = self.frames.borrow_mut().pop_front() {
            *self.desktop.borrow_mut() = next;
        }
        let shot = crop(&self.desktop.borrow(), rect);
        let shot = if self.scale > 1 {
            image::imageops::resize(
                &shot,
                shot.width() * self.scale,
                shot.height() * self.scale,
                image::imageops::FilterType::Nearest,
            )
        } else {
            shot
        };
        Ok(DynamicImage::ImageRgb8(shot).to_rgba8())
    }
}

// ── Pointer ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickRecord {
    pub at: (i32, i32),
    pub button: Button,
    pub count: u32,
}

/// Pointer whose position can be scripted: each `position()` call consumes the
/// next scripted position, if any.
pub struct FakePointer {
    current: Cell<(i32, i32)>,
    scripted: RefCell<VecDeque<(i32, i32)>>,
    pub moves: RefCell<Vec<(i32, i32)>>,
    pub clicks: RefCell<Vec<ClickRecord>>,
}

impl FakePointer {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            current: Cell::new((x, y)),
            scripted: RefCell::new(VecDeque::new()),
            moves: RefCell::new(Vec::new()),
            clicks: RefCell::new(Vec::new()),
        }
    }

    pub fn script(&self, positions: &[(i32, i32)]) {
        self.scripted.borrow_mut().extend(positions.iter().copied());
    }

    pub fn last_click(&self) -> Option<ClickRecord> {
        self.clicks.borrow().last().copied()
    }
}

impl Pointer for FakePointer {
    fn position(&self) -> ClickshotResult<(i32, i32)> {
        if let Some(next) = self.scripted.borrow_mut().pop_front() {
            self.current.set(next);
        }
        Ok(self.current.get())
    }

    fn move_to(&self, x: i32, y: i32) -> ClickshotResult<()> {
        self.current.set((x, y));
        self.moves.borrow_mut().push((x, y));
        Ok(())
    }

    fn click(&self, button: Button, count: u32) -> ClickshotResult<()> {
        self.clicks.borrow_mut().push(ClickRecord {
            at: self.current.get(),
            button,
            count,
        });
        Ok(())
    }
}

// ── Clock ───────────────────────────────────────────────────────────────────

/// Returns scripted readings (in seconds) first; afterwards time only moves
/// when something sleeps.
#[derive(Default)]
pub struct FakeClock {
    readings: RefCell<VecDeque<Duration>>,
    now: Cell<Duration>,
    pub sleeps: RefCell<Vec<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readings(seconds: &[u64]) -> Self {
        let clock = Self::default();
        clock
            .readings
            .borrow_mut()
            .extend(seconds.iter().map(|s| Duration::from_secs(*s)));
        clock
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        if let Some(next) = self.readings.borrow_mut().pop_front() {
            self.now.set(next);
        }
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.now.set(self.now.get() + duration);
    }
}

// ── Operator prompt ─────────────────────────────────────────────────────────

pub struct ScriptedConfirm {
    answer: bool,
    pub questions: RefCell<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            questions: RefCell::new(Vec::new()),
        }
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, question: &str) -> bool {
        self.questions.borrow_mut().push(question.to_string());
        self.answer
    }
}

// ── Bundle ──────────────────────────────────────────────────────────────────

/// Typed handles onto the fakes behind a `Devices` bundle.
pub struct Rig {
    pub screen: Rc<FakeScreen>,
    pub pointer: Rc<FakePointer>,
    pub clock: Rc<FakeClock>,
    pub reporter: Rc<RecordingReporter>,
    pub confirm: Rc<ScriptedConfirm>,
}

impl Rig {
    pub fn new(screen: FakeScreen) -> Self {
        Self {
            screen: Rc::new(screen),
            pointer: Rc::new(FakePointer::at(500, 500)),
            clock: Rc::new(FakeClock::new()),
            reporter: Rc::new(RecordingReporter::default()),
            confirm: Rc::new(ScriptedConfirm::answering(false)),
        }
    }

    pub fn with_clock(mut self, clock: FakeClock) -> Self {
        self.clock = Rc::new(clock);
        self
    }

    pub fn with_confirm(mut self, confirm: ScriptedConfirm) -> Self {
        self.confirm = Rc::new(confirm);
        self
    }

    pub fn devices(&self) -> Devices {
        let pointer: Rc<dyn Pointer> = self.pointer.clone();
        Devices {
            screen: self.screen.clone(),
            abort: Rc::new(PointerFailSafe::new(pointer.clone())),
            pointer,
            confirm: self.confirm.clone(),
            clock: self.clock.clone(),
            reporter: self.reporter.clone(),
        }
    }
}
