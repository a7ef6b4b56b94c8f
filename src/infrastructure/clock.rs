//! Clocks
use chrono::{DateTime, Utc};

use crate::application::ports::Clock;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// Always returns the same instant; keeps promotion windows deterministic in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    pub const fn new(time: DateTime<Utc>) -> Self { Self { time } }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> { self.time }
}
