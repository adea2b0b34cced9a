//! Interrupt handling (SIGINT/SIGTERM).
//!
//! A raised interrupt routes the controller through the same
//! cleanup-and-cancel path as a timeout. Sleeps are short-slice waits
//! that re-check the flag, so a signal aborts a wait immediately instead
//! of waiting out the interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of interruptible sleeps.
const SLICE: Duration = Duration::from_millis(100);

/// Shared interrupt flag, set from the signal handler.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the SIGINT/SIGTERM handler. Call once at startup.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let raised = Arc::clone(&self.raised);
        ctrlc::set_handler(move || {
            raised.store(true, Ordering::SeqCst);
        })
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Raise the flag directly (tests and in-process cancellation).
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Sleep for `duration`, waking early when the flag is raised.
    /// Returns false when the sleep was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.is_raised() {
                return false;
            }
            let left = duration.saturating_sub(start.elapsed());
            if left.is_zero() {
                return true;
            }
            thread::sleep(left.min(SLICE));
        }
    }
}
