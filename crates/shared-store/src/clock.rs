use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use shared_types::Clock;

/// Test clock. Optionally advances by a fixed step on every reading so that
/// successive timestamps are strictly increasing.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<(DateTime<Utc>, Duration)>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::ticking(start, Duration::zero())
    }

    pub fn ticking(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new((start, step))),
        }
    }

    /// 2025-01-01T00:00:00Z, advancing one second per reading.
    pub fn fixture() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::ticking(start, Duration::seconds(1))
    }

    pub fn advance(&self, by: Duration) {
        self.state.lock().0 += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.state.lock().0 = to;
    }

    pub fn peek(&self) -> DateTime<Utc> {
        self.state.lock().0
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut state = self.state.lock();
        let reading = state.0;
        state.0 = reading + state.1;
        reading
    }
}
