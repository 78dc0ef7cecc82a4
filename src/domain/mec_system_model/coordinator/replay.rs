use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use crate::api::scenario_dto::{EventDto, ScenarioDto, TimedEventDto, TopologyDto};
use crate::domain::mec_system_model::coordinator::coordinator::{CycleReport, SchedulerCoordinator};
use crate::domain::mec_system_model::coordinator::runtime::CoordinatorEvent;
use crate::domain::mec_system_model::messages::{Grant, InitFeedback, NodeStatusUpdate, ResourceReport, RuntimeFeedback};
use crate::domain::mec_system_model::profile::ProfileDatabase;
use crate::domain::mec_system_model::reachability::ReachabilityGraph;
use crate::domain::mec_system_model::request::Request;
use crate::domain::mec_system_model::scheduler_config::SchedulerConfig;
use crate::domain::mec_system_model::utils::id::{NodeId, VehicleId};
use crate::domain::simulator::simulator::{SharedSimulator, SystemSimulator};
use crate::domain::simulator::simulator_mock::MockSimulator;
use crate::error::Result;

/// Outcome of one replayed cycle: the cycle report and every grant sent around it.
#[derive(Debug, Clone)]
pub struct ReplayedCycle {
    pub report: CycleReport,
    pub grants: Vec<Grant>,
}

/// Replays a recorded scenario against a coordinator on a simulated clock.
///
/// Cycle `k` (starting at 1) runs at `k × schedulingInterval`; its pre-schedule
/// check runs `appStopInterval` earlier. Events are delivered once the clock
/// reaches their timestamp.
#[derive(Debug)]
pub struct ScenarioRunner {
    coordinator: SchedulerCoordinator,
    clock: MockSimulator,
    events: VecDeque<(i64, CoordinatorEvent)>,
    auto_acknowledge: bool,
    cycles: i64,
}

impl ScenarioRunner {
    pub fn new(config: SchedulerConfig, scenario: ScenarioDto) -> Result<Self> {
        let clock = MockSimulator::new(0);
        let profile = Arc::new(ProfileDatabase::from(scenario.profile));
        let topology = scenario_topology(scenario.topology.as_ref(), config.max_hops)?;
        let mut coordinator = SchedulerCoordinator::new(config, profile, SharedSimulator(Arc::new(clock.clone())))?;
        if let Some(adjacency) = topology {
            coordinator.set_topology(adjacency);
        }

        let timed = scenario_events(scenario.events);
        log::info!("ScenarioRunner: {} events loaded.", timed.len());

        coordinator.initialize_as_leader();
        Ok(ScenarioRunner {
            coordinator,
            clock,
            events: timed.into(),
            auto_acknowledge: scenario.auto_acknowledge,
            cycles: 0,
        })
    }

    pub fn coordinator(&self) -> &SchedulerCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut SchedulerCoordinator {
        &mut self.coordinator
    }

    pub fn remaining_events(&self) -> usize {
        self.events.len()
    }

    pub fn run_cycle(&mut self) -> Result<ReplayedCycle> {
        self.cycles += 1;
        let interval = self.coordinator.config().scheduling_interval_ms;
        let lead = self.coordinator.config().app_stop_interval_ms;
        let cycle_time = self.cycles * interval;

        let mut grants = Vec::new();

        self.advance_to(cycle_time - lead);
        self.coordinator.pre_schedule_check();
        let stops = self.coordinator.drain_grants();
        grants.extend(self.acknowledge(stops));

        self.advance_to(cycle_time);
        self.coordinator.check_lost_grant();
        let report = self.coordinator.run_scheduling_cycle()?;
        let issued = self.coordinator.drain_grants();
        grants.extend(self.acknowledge(issued));

        Ok(ReplayedCycle { report, grants })
    }

    fn advance_to(&mut self, time_ms: i64) {
        self.clock.set_time(time_ms);
        while self.events.front().is_some_and(|(at_ms, _)| *at_ms <= time_ms) {
            let Some((_, event)) = self.events.pop_front() else {
                break;
            };
            event.apply_to(&mut self.coordinator);
        }
    }

    /// Plays the part of the edge nodes: start grants initialize successfully,
    /// stop grants are confirmed. The nodes report their figures after the change.
    fn acknowledge(&mut self, grants: Vec<Grant>) -> Vec<Grant> {
        if !self.auto_acknowledge {
            return grants;
        }
        let now = self.clock.get_current_time_in_ms();
        for grant in &grants {
            let sign = if grant.is_stop { 1 } else { -1 };
            let free_bandwidth = self
                .coordinator
                .node(&grant.offload_node_id)
                .map(|entry| (entry.resource.free_bandwidth + sign * grant.bandwidth).clamp(0, entry.resource.bandwidth_capacity))
                .unwrap_or(0);
            let free_compute = self
                .coordinator
                .node(&grant.process_node_id)
                .map(|entry| (entry.resource.free_compute + sign * grant.compute_units).clamp(0, entry.resource.compute_capacity))
                .unwrap_or(0);
            let report = ResourceReport {
                offload_node_id: grant.offload_node_id.clone(),
                process_node_id: grant.process_node_id.clone(),
                free_bandwidth,
                free_compute,
                bandwidth_timestamp_ms: now,
                compute_timestamp_ms: now,
            };

            if grant.is_stop {
                self.coordinator.record_runtime_feedback(RuntimeFeedback {
                    job_id: grant.job_id.clone(),
                    success: true,
                    granted_bandwidth: 0,
                    report,
                });
            } else {
                self.coordinator.record_init_feedback(InitFeedback { job_id: grant.job_id.clone(), success: true, report });
            }
        }
        grants
    }
}

/// Converts the recorded events into coordinator events, ordered by delivery time.
pub fn scenario_events(events: Vec<TimedEventDto>) -> Vec<(i64, CoordinatorEvent)> {
    let mut timed: Vec<(i64, CoordinatorEvent)> = events
        .into_iter()
        .map(|timed| {
            let event = match timed.event {
                EventDto::Request(dto) => CoordinatorEvent::Request(Request::from(dto)),
                EventDto::NodeStatus(dto) => CoordinatorEvent::NodeStatus(NodeStatusUpdate::from(dto)),
                EventDto::InitFeedback(dto) => CoordinatorEvent::InitFeedback(InitFeedback::from(dto)),
                EventDto::RuntimeFeedback(dto) => CoordinatorEvent::RuntimeFeedback(RuntimeFeedback::from(dto)),
                EventDto::VehicleDeparture { vehicle_id } => CoordinatorEvent::VehicleDeparture(VehicleId::new(vehicle_id)),
            };
            (timed.at_ms, event)
        })
        .collect();
    timed.sort_by_key(|(at_ms, _)| *at_ms);
    timed
}

/// Node adjacency of the scenario's backhaul matrix, if it has one.
pub fn scenario_topology(
    topology: Option<&TopologyDto>,
    max_hops: u32,
) -> Result<Option<BTreeMap<NodeId, BTreeSet<NodeId>>>> {
    let Some(topology) = topology else {
        return Ok(None);
    };
    let nodes: Vec<NodeId> = topology.nodes.iter().map(|n| NodeId::new(n.as_str())).collect();
    let graph = ReachabilityGraph::from_matrix(&nodes, &topology.adjacency, max_hops)?;
    Ok(Some(graph.adjacency().clone()))
}
