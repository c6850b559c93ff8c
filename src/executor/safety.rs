// Operator fail-safe: parking the pointer in a screen corner cancels a search.
use std::rc::Rc;

use crate::errors::ClickshotResult;
use crate::executor::input::Pointer;

/// Pointer position reserved as the operator's "stop" signal.
pub const ABORT_POSITION: (i32, i32) = (0, 0);

/// Where the pointer is parked when a search starts on the abort position.
pub const NEUTRAL_POSITION: (i32, i32) = (10, 10);

/// Cancellation signal polled between failed search attempts.
pub trait AbortProbe {
    /// Called once before a search begins. Must leave the probe un-tripped.
    fn arm(&self) -> ClickshotResult<()>;

    fn tripped(&self) -> bool;

    /// Human-readable reason used in the abort warning.
    fn reason(&self) -> String;
}

pub struct PointerFailSafe {
    pointer: Rc<dyn Pointer>,
    sentinel: (i32, i32),
    neutral: (i32, i32),
}

impl PointerFailSafe {
    pub fn new(pointer: Rc<dyn Pointer>) -> Self {
        Self {
            pointer,
            sentinel: ABORT_POSITION,
            neutral: NEUTRAL_POSITION,
        }
    }
}

impl AbortProbe for PointerFailSafe {
    fn arm(&self) -> ClickshotResult<()> {
        if self.pointer.position()? == self.sentinel {
            tracing::debug!(
                x = self.neutral.0,
                y = self.neutral.1,
                "pointer parked on abort position; nudging it away"
            );
            self.pointer.move_to(self.neutral.0, self.neutral.1)?;
        }
        Ok(())
    }

    fn tripped(&self) -> bool {
        match self.pointer.position() {
            Ok(pos) => pos == self.sentinel,
            Err(e) => {
                tracing::debug!(error = %e, "pointer position unavailable; fail-safe not checked");
                false
            }
        }
    }

    fn reason(&self) -> String {
        format!(
            "mouse pointer moved to ({}, {})",
            self.sentinel.0, self.sentinel.1
        )
    }
}
