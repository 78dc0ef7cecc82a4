use crate::domain::simulator::simulator::{SharedSimulator, SystemSimulator};

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Manually driven clock. Clones share the same time, so a test can keep one
/// handle and advance the clock seen by the coordinator.
#[derive(Debug, Clone)]
pub struct MockSimulator {
    time: Arc<AtomicI64>,
}

impl MockSimulator {
    pub fn new(time_ms: i64) -> MockSimulator {
        MockSimulator { time: Arc::new(AtomicI64::new(time_ms)) }
    }

    pub fn set_time(&self, time_ms: i64) {
        self.time.store(time_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.time.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl SystemSimulator for MockSimulator {
    fn get_current_time_in_ms(&self) -> i64 {
        self.time.load(Ordering::SeqCst)
    }

    fn clone_box(&self) -> SharedSimulator {
        SharedSimulator(Arc::new(self.clone()))
    }
}
