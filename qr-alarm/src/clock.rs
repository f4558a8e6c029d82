//! Wall-clock source.
//!
//! Timers and deadlines run on tokio's monotonic clock; this trait only
//! answers "what time is it" for trigger computations and status display.

use time::{OffsetDateTime, UtcOffset};

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    /// Offset used to interpret a bare time of day ("07:30").
    fn local_offset(&self) -> UtcOffset {
        self.now().offset()
    }
}

/// System wall clock in a fixed local offset.
///
/// The offset is captured once at startup. Querying the local offset from
/// a multi-threaded process is refused by `time` on most Unix platforms,
/// so the daemon resolves it before the runtime starts.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// Resolve the local offset now, falling back to UTC.
    pub fn local() -> Self {
        Self::new(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }

    fn local_offset(&self) -> UtcOffset {
        self.offset
    }
}
