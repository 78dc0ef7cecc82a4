use std::collections::{BTreeMap, BTreeSet};

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval, interval_at};

use crate::domain::mec_system_model::coordinator::coordinator::SchedulerCoordinator;
use crate::domain::mec_system_model::messages::{Grant, InitFeedback, NodeStatusUpdate, RuntimeFeedback};
use crate::domain::mec_system_model::request::Request;
use crate::domain::mec_system_model::utils::id::{NodeId, VehicleId};
use crate::error::Result;

/// Inbound message for a coordinator running inside a [`CoordinatorDriver`].
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    Request(Request),
    NodeStatus(NodeStatusUpdate),
    InitFeedback(InitFeedback),
    RuntimeFeedback(RuntimeFeedback),
    VehicleDeparture(VehicleId),
    Topology(BTreeMap<NodeId, BTreeSet<NodeId>>),
    BecomeLeader,
    StepDown,
    Shutdown,
}

impl CoordinatorEvent {
    /// Hands the event to the matching coordinator operation. `Shutdown` is a no-op here.
    pub fn apply_to(self, coordinator: &mut SchedulerCoordinator) {
        match self {
            CoordinatorEvent::Request(request) => {
                coordinator.record_request(request);
            }
            CoordinatorEvent::NodeStatus(update) => coordinator.record_node_status(update),
            CoordinatorEvent::InitFeedback(feedback) => coordinator.record_init_feedback(feedback),
            CoordinatorEvent::RuntimeFeedback(feedback) => coordinator.record_runtime_feedback(feedback),
            CoordinatorEvent::VehicleDeparture(vehicle_id) => coordinator.record_vehicle_departure(&vehicle_id),
            CoordinatorEvent::Topology(adjacency) => coordinator.set_topology(adjacency),
            CoordinatorEvent::BecomeLeader => coordinator.initialize_as_leader(),
            CoordinatorEvent::StepDown => coordinator.reset_state(),
            CoordinatorEvent::Shutdown => {}
        }
    }
}

/// Runs a coordinator on the tokio runtime.
///
/// Events only mutate state. A scheduling cycle runs at every interval tick,
/// preceded by `check_lost_grant`; `pre_schedule_check` fires `appStopInterval`
/// before each tick. Grants are forwarded to the outbound channel.
pub struct CoordinatorDriver {
    coordinator: SchedulerCoordinator,
    events: mpsc::Receiver<CoordinatorEvent>,
    grants: mpsc::Sender<Grant>,
}

impl CoordinatorDriver {
    pub fn new(coordinator: SchedulerCoordinator, events: mpsc::Receiver<CoordinatorEvent>, grants: mpsc::Sender<Grant>) -> Self {
        CoordinatorDriver { coordinator, events, grants }
    }

    /// Creates the driver together with its event sender and grant receiver.
    pub fn channel(
        coordinator: SchedulerCoordinator,
        capacity: usize,
    ) -> (Self, mpsc::Sender<CoordinatorEvent>, mpsc::Receiver<Grant>) {
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (grant_tx, grant_rx) = mpsc::channel(capacity);
        (Self::new(coordinator, event_rx, grant_tx), event_tx, grant_rx)
    }

    /// Runs until `Shutdown` arrives or every event sender is dropped, then hands
    /// the coordinator back. An invalid selection stops the driver with that error.
    pub async fn run(mut self) -> Result<SchedulerCoordinator> {
        let period = Duration::from_millis(self.coordinator.config().scheduling_interval_ms as u64);
        let lead = Duration::from_millis(self.coordinator.config().app_stop_interval_ms as u64);

        let start = Instant::now();
        let mut cycle_ticks = interval(period);
        cycle_ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut check_ticks = interval_at(start + period.saturating_sub(lead), period);
        check_ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!("CoordinatorDriver: started, cycle every {:?}.", period);
        loop {
            tokio::select! {
                _ = cycle_ticks.tick() => {
                    self.coordinator.check_lost_grant();
                    self.coordinator.run_scheduling_cycle()?;
                    self.forward_grants().await;
                }
                _ = check_ticks.tick() => {
                    self.coordinator.pre_schedule_check();
                    self.forward_grants().await;
                }
                event = self.events.recv() => {
                    match event {
                        None | Some(CoordinatorEvent::Shutdown) => break,
                        Some(event) => event.apply_to(&mut self.coordinator),
                    }
                }
            }
        }

        self.forward_grants().await;
        log::info!("CoordinatorDriver: stopped.");
        Ok(self.coordinator)
    }

    async fn forward_grants(&mut self) {
        for grant in self.coordinator.drain_grants() {
            if self.grants.send(grant).await.is_err() {
                log::warn!("CoordinatorDriver: grant receiver dropped, grant discarded.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::mec_system_model::messages::VehicleLinkObservation;
    use crate::domain::mec_system_model::node_resource::sample_status;
    use crate::domain::mec_system_model::profile::ProfileDatabase;
    use crate::domain::mec_system_model::request::sample_request;
    use crate::domain::mec_system_model::scheduler_config::SchedulerConfig;
    use crate::domain::simulator::simulator::SharedSimulator;
    use crate::domain::simulator::simulator_mock::MockSimulator;

    #[tokio::test]
    async fn driver_forwards_grants_and_returns_coordinator() {
        let profile = Arc::new(ProfileDatabase::new().with_execution_time("resnet", "rtx", 0.05));
        let clock = MockSimulator::new(0);
        let config = SchedulerConfig { scheduling_interval_ms: 20, app_stop_interval_ms: 5, ..SchedulerConfig::default() };
        let coordinator = SchedulerCoordinator::new(config, profile, SharedSimulator(Arc::new(clock))).unwrap();
        let (driver, events, mut grants) = CoordinatorDriver::channel(coordinator, 16);
        let handle = tokio::spawn(driver.run());

        let mut status = sample_status("rsu1", 10, 5, 0);
        status.vehicle_link =
            Some(VehicleLinkObservation { vehicle_id: VehicleId::new("veh1"), bytes_per_band: 2000.0, timestamp_ms: 0 });
        events.send(CoordinatorEvent::BecomeLeader).await.unwrap();
        events.send(CoordinatorEvent::NodeStatus(status)).await.unwrap();
        events.send(CoordinatorEvent::Request(sample_request("veh1", 1))).await.unwrap();

        let grant = tokio::time::timeout(Duration::from_secs(2), grants.recv()).await.unwrap().unwrap();
        assert_eq!(grant.job_id.as_str(), "veh1:1");
        assert!(grant.is_start);

        events.send(CoordinatorEvent::Shutdown).await.unwrap();
        let coordinator = handle.await.unwrap().unwrap();
        assert!(coordinator.is_active());
    }
}
