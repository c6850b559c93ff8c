use std::rc::Rc;

use crate::engine::events::{Reporter, TracingReporter};
use crate::engine::retry::{Clock, SystemClock};
use crate::errors::ClickshotResult;
use crate::executor::confirm::{Confirm, StdinConfirm};
use crate::executor::input::{EnigoPointer, Pointer};
use crate::executor::safety::{AbortProbe, PointerFailSafe};
use crate::perception::screenshot::{ScreenSource, XcapScreen};

/// Handles onto the outside world an element works through. Cloning shares the
/// underlying devices.
#[derive(Clone)]
pub struct Devices {
    pub screen: Rc<dyn ScreenSource>,
    pub pointer: Rc<dyn Pointer>,
    pub abort: Rc<dyn AbortProbe>,
    pub confirm: Rc<dyn Confirm>,
    pub clock: Rc<dyn Clock>,
    pub reporter: Rc<dyn Reporter>,
}

impl Devices {
    /// The real display and mouse, a stdin prompt, and `tracing` output.
    pub fn system() -> ClickshotResult<Self> {
        let pointer: Rc<dyn Pointer> = Rc::new(EnigoPointer::new()?);
        Ok(Self {
            screen: Rc::new(XcapScreen),
            abort: Rc::new(PointerFailSafe::new(pointer.clone())),
            pointer,
            confirm: Rc::new(StdinConfirm),
            clock: Rc::new(SystemClock::new()),
            reporter: Rc::new(TracingReporter::new()),
        })
    }

    pub fn with_reporter(mut self, reporter: Rc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }
}
