use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

/// MockTime is a helper to replace SystemTime::now() for testing purposes.
///
/// It stores nanoseconds since the unix epoch so it can be shared between the
/// test and a running session without locking.
pub struct MockTime {
    cur_now: AtomicU64,
}

impl Default for MockTime {
    fn default() -> Self {
        MockTime {
            cur_now: AtomicU64::new(0),
        }
    }
}

impl MockTime {
    pub fn new(now: SystemTime) -> Self {
        let t = MockTime::default();
        t.set_now(now);
        t
    }

    /// set_now sets the current time.
    pub fn set_now(&self, now: SystemTime) {
        let nanos = now
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        self.cur_now.store(nanos, Ordering::SeqCst);
    }

    /// now returns the current time.
    pub fn now(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_nanos(self.cur_now.load(Ordering::SeqCst))
    }

    /// advance advances duration d
    pub fn advance(&self, d: Duration) {
        self.cur_now
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }
}
