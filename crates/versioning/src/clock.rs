//! Time source for version identifiers

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Source of "now" for identifier generation and marker content
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock that moves forward by `tick` after every reading
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    now: DateTime<Utc>,
    tick: Duration,
}

impl ManualClock {
    /// Clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::ticking(start, Duration::zero())
    }

    /// Clock starting at `start` that advances by `tick` per reading
    pub fn ticking(start: DateTime<Utc>, tick: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState { now: start, tick })),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.inner.lock().now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut state = self.inner.lock();
        let now = state.now;
        state.now = now + state.tick;
        now
    }
}
