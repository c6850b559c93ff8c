// Polling retry loop bounded by a timeout, with an abort exit.
use std::fmt::Display;
use std::time::{Duration, Instant};

use crate::engine::events::{Event, Reporter};
use crate::errors::ClickshotError;

/// Monotonic time source. `now` is measured from an arbitrary fixed origin.
pub trait Clock {
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Outcome of one failed attempt.
#[derive(Debug)]
pub enum Attempt<E> {
    /// Try again if there is time left.
    Recoverable(E),
    /// Stop now and return the error.
    Abort(E),
}

/// Errors the retry loop can classify.
pub trait Retryable: Display {
    /// A file the attempt depends on does not exist (yet).
    fn is_missing_file(&self) -> bool {
        false
    }
}

impl Retryable for ClickshotError {
    fn is_missing_file(&self) -> bool {
        matches!(self, ClickshotError::ImageNotFound(_))
    }
}

impl Retryable for std::io::Error {
    fn is_missing_file(&self) -> bool {
        self.kind() == std::io::ErrorKind::NotFound
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Pause between a failed attempt and the next one.
    pub interval: Duration,
    pub log_progress: bool,
}

impl RetryPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: Duration::ZERO,
            log_progress: false,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_progress(mut self, log_progress: bool) -> Self {
        self.log_progress = log_progress;
        self
    }
}

/// Run `attempt` until it succeeds, aborts, or fails after more than
/// `policy.timeout` has elapsed since the loop started. The clock is read once at
/// the start and once after every failed attempt. A zero timeout allows exactly
/// one attempt.
pub fn retry_with_timeout<T, E, F>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    reporter: &dyn Reporter,
    mut attempt: F,
) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Result<T, Attempt<E>>,
{
    let start = clock.now();
    let mut progress = Progress::new(policy.log_progress, reporter);
    let mut warned_missing = false;

    loop {
        let error = match attempt() {
            Ok(value) => {
                progress.finish();
                return Ok(value);
            }
            Err(Attempt::Abort(error)) => {
                progress.finish();
                return Err(error);
            }
            Err(Attempt::Recoverable(error)) => error,
        };

        if error.is_missing_file() && !warned_missing {
            warned_missing = true;
            reporter.report(&Event::MissingImage {
                message: error.to_string(),
            });
        }

        let elapsed = clock.now().saturating_sub(start);
        if policy.timeout.is_zero() || elapsed > policy.timeout {
            tracing::debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_ms = policy.timeout.as_millis() as u64,
                "retry timed out"
            );
            progress.finish();
            return Err(error);
        }

        progress.advance_to(elapsed.as_secs());
        if !policy.interval.is_zero() {
            clock.sleep(policy.interval);
        }
    }
}

struct Progress<'a> {
    enabled: bool,
    next_second: u64,
    reporter: &'a dyn Reporter,
}

impl<'a> Progress<'a> {
    fn new(enabled: bool, reporter: &'a dyn Reporter) -> Self {
        Self {
            enabled,
            next_second: 0,
            reporter,
        }
    }

    fn advance_to(&mut self, seconds: u64) {
        if !self.enabled {
            return;
        }
        while self.next_second <= seconds {
            self.reporter.report(&Event::Progress {
                seconds: self.next_second,
            });
            self.next_second += 1;
        }
    }

    fn finish(&mut self) {
        if self.enabled && self.next_second > 0 {
            self.reporter.report(&Event::ProgressEnd);
        }
    }
}
