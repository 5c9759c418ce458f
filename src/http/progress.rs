//! Monotonic upload progress reporting.

use super::request::ProgressFn;
use parking_lot::Mutex;

/// Converts raw byte counts into whole percentages and forwards only values
/// that move forward.
pub struct ProgressTracker {
    sink: ProgressFn,
    last: Mutex<Option<u8>>,
}

impl ProgressTracker {
    pub fn new(sink: ProgressFn) -> Self {
        Self {
            sink,
            last: Mutex::new(None),
        }
    }

    pub fn report_bytes(&self, sent: u64, total: u64) {
        self.report(percent(sent, total));
    }

    /// Forward `value` (clamped to 100) unless an equal or larger value was
    /// already reported.
    pub fn report(&self, value: u8) {
        let value = value.min(100);
        let mut last = self.last.lock();
        if last.is_some_and(|previous| previous >= value) {
            return;
        }
        *last = Some(value);
        (self.sink)(value);
    }

    pub fn finish(&self) {
        self.report(100);
    }

    pub fn last(&self) -> Option<u8> {
        *self.last.lock()
    }
}

fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (sent.min(total).saturating_mul(100) / total) as u8
}
