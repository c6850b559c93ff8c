use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::PathBuf;

use crate::perception::types::Rect;

/// Something a search wants the operator to know about. None of these change
/// control flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A reference image could not be read; searching continues.
    MissingImage { message: String },
    /// The search was cancelled through the fail-safe.
    Aborted { element: String, reason: String },
    /// Whole seconds spent searching so far.
    Progress { seconds: u64 },
    ProgressEnd,
    DelayedDetection { element: String, failed_attempts: u32 },
    /// Found somewhere other than its configured rectangle (or none was configured).
    UnexpectedLocation {
        element: String,
        expected: Option<Rect>,
        actual: Rect,
    },
    ScreenshotSaved {
        expected_image: PathBuf,
        screenshot: PathBuf,
    },
    /// Interactive mode: the operator chose to carry on without the reference image.
    OperatorSkipped { element: String },
}

impl Event {
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::MissingImage { .. }
                | Self::Aborted { .. }
                | Self::DelayedDetection { .. }
                | Self::UnexpectedLocation { .. }
        )
    }
}

pub trait Reporter {
    fn report(&self, event: &Event);
}

/// Sends events to `tracing`. The screenshot pair and the progress counter also go
/// straight to stderr so they show up without a subscriber.
#[derive(Debug, Default)]
pub struct TracingReporter {
    counter_width: Cell<usize>,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn draw_counter(&self, seconds: u64) {
        let text = format!("{seconds}...");
        let erase = "\u{8}".repeat(self.counter_width.replace(text.len()));
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{erase}{text}").and_then(|_| stderr.flush());
    }
}

impl Reporter for TracingReporter {
    fn report(&self, event: &Event) {
        match event {
            Event::MissingImage { message } => {
                tracing::warn!(%message, "reference image missing; still searching");
            }
            Event::Aborted { element, reason } => {
                tracing::warn!(%element, %reason, "Aborted - {reason}");
            }
            Event::Progress { seconds } => {
                tracing::trace!(seconds, "still searching");
                self.draw_counter(*seconds);
            }
            Event::ProgressEnd => {
                if self.counter_width.replace(0) > 0 {
                    eprintln!();
                }
            }
            Event::DelayedDetection {
                element,
                failed_attempts,
            } => {
                tracing::warn!(%element, failed_attempts, "{element} was not present immediately");
            }
            Event::UnexpectedLocation {
                element,
                expected,
                actual,
            } => match expected {
                Some(expected) => tracing::warn!(
                    %element,
                    %expected,
                    %actual,
                    "Location of {element} was {actual}, expected {expected}"
                ),
                None => tracing::warn!(
                    %element,
                    %actual,
                    "Location of {element} was {actual}, no expected location configured"
                ),
            },
            Event::ScreenshotSaved {
                expected_image,
                screenshot,
            } => {
                tracing::info!(
                    expected_image = %expected_image.display(),
                    screenshot = %screenshot.display(),
                    "diagnostic screenshot saved"
                );
                eprintln!("Expected Image: {}", expected_image.display());
                eprintln!("Screenshot: {}", screenshot.display());
            }
            Event::OperatorSkipped { element } => {
                tracing::info!(%element, "operator chose to continue without reference image");
            }
        }
    }
}

/// Keeps every event in memory, for tests and for callers that want to inspect
/// what happened after the fact.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: RefCell<Vec<Event>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn warnings(&self) -> Vec<Event> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.is_warning())
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &Event) {
        self.events.borrow_mut().push(event.clone());
    }
}
