//! Injectable time source.

use chrono::{Local, NaiveDateTime};

/// Wall-clock seam for schedule and countdown decisions. The supervisor
/// only ever reads time through this trait, which is what lets the
/// integration tests steer it.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local system time. Schedules are household wall-clock times, so local
/// rather than UTC is the right base.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
