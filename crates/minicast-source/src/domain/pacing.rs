//! Byte-rate pacing.
//!
//! A live source should not push a whole file in one burst: the relay would
//! forward it just as fast and slow listeners would be dropped.  [`Pacer`]
//! keeps the cumulative byte count on a fixed schedule.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    bytes_per_sec: u64,
}

impl Pacer {
    /// `0` means unpaced.
    pub fn new(bytes_per_sec: u64) -> Self {
        Self { bytes_per_sec }
    }

    pub fn is_paced(&self) -> bool {
        self.bytes_per_sec > 0
    }

    /// How long to sleep so that `sent` bytes are not ahead of schedule,
    /// `elapsed` after streaming started.  `None` when on or behind schedule.
    pub fn delay(&self, sent: u64, elapsed: Duration) -> Option<Duration> {
        if !self.is_paced() {
            return None;
        }
        let due = Duration::from_secs_f64(sent as f64 / self.bytes_per_sec as f64);
        due.checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}
