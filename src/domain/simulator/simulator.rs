use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Clock used by the coordinator. All timestamps in the scheduler are in ms.
pub trait SystemSimulator: std::fmt::Debug + Send + Sync {
    fn get_current_time_in_ms(&self) -> i64;
    fn clone_box(&self) -> SharedSimulator;
}

#[derive(Debug)]
pub struct SharedSimulator(pub Arc<dyn SystemSimulator>);

impl Clone for SharedSimulator {
    fn clone(&self) -> Self {
        self.0.clone_box()
    }
}

impl std::ops::Deref for SharedSimulator {
    type Target = dyn SystemSimulator;
    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

/// Wall clock. In simulation mode the clock starts at 0 when the simulator is
/// created, otherwise it reports the unix time.
#[derive(Debug, Clone)]
pub struct Simulator {
    is_simulation: bool,
    started: Instant,
}

impl Simulator {
    pub fn new(is_simulation: bool) -> Simulator {
        Simulator { is_simulation, started: Instant::now() }
    }

    fn get_system_time_ms() -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_millis() as i64
    }
}

impl SystemSimulator for Simulator {
    fn get_current_time_in_ms(&self) -> i64 {
        if self.is_simulation { self.started.elapsed().as_millis() as i64 } else { Self::get_system_time_ms() }
    }

    fn clone_box(&self) -> SharedSimulator {
        SharedSimulator(Arc::new(self.clone()))
    }
}
