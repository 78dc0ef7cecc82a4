use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::mec_system_model::coordinator::job_state::{GrantedService, JobState, StopOrigin};
use crate::domain::mec_system_model::messages::{Grant, InitFeedback, NodeStatusUpdate, ResourceReport, RuntimeFeedback};
use crate::domain::mec_system_model::node_resource::{NodeEntry, NodeStore};
use crate::domain::mec_system_model::profile::ResourceProfileSource;
use crate::domain::mec_system_model::reachability::ReachabilityGraph;
use crate::domain::mec_system_model::request::Request;
use crate::domain::mec_system_model::scheduler_config::{Objective, SchedulerConfig};
use crate::domain::mec_system_model::scheme::Scheme;
use crate::domain::mec_system_model::scheme::scheme_type::SchemeType;
use crate::domain::mec_system_model::scheme::selection::SelectedInstance;
use crate::domain::mec_system_model::scheme::snapshot::{NodeView, SchedulingSnapshot, SchemeParams};
use crate::domain::mec_system_model::scheme::strategy::SelectionStrategy;
use crate::domain::mec_system_model::utils::id::{JobId, NodeId, VehicleId};
use crate::domain::mec_system_model::utils::statistics::{self, ANALYTICS_TARGET, StatParameter, StatisticEvent};
use crate::domain::mec_system_model::vehicle_link::{VehicleLink, VehicleLinkTable};
use crate::domain::simulator::simulator::SharedSimulator;
use crate::error::{Error, Result};

/// How a scheduling cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The coordinator is not the acting scheduler.
    Inactive,
    /// Stop confirmations were still outstanding; they were cleared and nothing was selected.
    AwaitingStops(usize),
    /// No request was waiting for admission.
    Idle,
    /// The selection took too long and its result was thrown away.
    Discarded,
    Completed,
}

/// Summary of one `run_scheduling_cycle` call.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub time_ms: i64,
    pub scheme: SchemeType,
    pub outcome: CycleOutcome,
    pub pending: usize,
    pub candidates: usize,
    pub granted: Vec<JobId>,
    /// Selected instances whose nodes no longer had the resources at grant time.
    pub dropped: usize,
    pub running: usize,
    pub granted_utility: f64,
    /// Utility over one scheduling interval, running jobs included unless everything is rescheduled.
    pub interval_utility: f64,
    pub generation_time: Duration,
    pub selection_time: Duration,
}

impl CycleReport {
    fn new(time_ms: i64, scheme: SchemeType) -> Self {
        CycleReport {
            time_ms,
            scheme,
            outcome: CycleOutcome::Completed,
            pending: 0,
            candidates: 0,
            granted: Vec::new(),
            dropped: 0,
            running: 0,
            granted_utility: 0.0,
            interval_utility: 0.0,
            generation_time: Duration::ZERO,
            selection_time: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
struct JobRecord {
    request: Request,
    state: JobState,
}

/// Admission control and grant protocol of the MEC scheduler.
///
/// The coordinator owns all scheduling state. Inbound messages are recorded
/// through the `record_*` methods; `run_scheduling_cycle` selects and grants
/// new jobs; outbound grants queue up until `drain_grants` is called.
#[derive(Debug)]
pub struct SchedulerCoordinator {
    config: SchedulerConfig,
    scheme: Scheme,
    profile: Arc<dyn ResourceProfileSource>,
    reachability: ReachabilityGraph,
    simulator: SharedSimulator,

    jobs: BTreeMap<JobId, JobRecord>,
    nodes: NodeStore,
    links: VehicleLinkTable,
    departed: HashSet<VehicleId>,
    outbox: Vec<Grant>,
    active: bool,
}

impl SchedulerCoordinator {
    /// Validates `config` and builds an inactive coordinator.
    pub fn new(config: SchedulerConfig, profile: Arc<dyn ResourceProfileSource>, simulator: SharedSimulator) -> Result<Self> {
        let config = config.validated()?;
        let scheme = Scheme::new(config.scheme, config.seed);
        let reachability = ReachabilityGraph::new(BTreeMap::new(), config.max_hops);

        log::info!(
            "SchedulerCoordinator: created with scheme {} ({}), interval {} ms, forwarding {}.",
            config.scheme,
            config.objective,
            config.scheduling_interval_ms,
            config.enable_forwarding
        );

        Ok(SchedulerCoordinator {
            config,
            scheme,
            profile,
            reachability,
            simulator,
            jobs: BTreeMap::new(),
            nodes: NodeStore::new(),
            links: VehicleLinkTable::new(),
            departed: HashSet::new(),
            outbox: Vec::new(),
            active: false,
        })
    }

    /// Swaps in another selection strategy, keeping the generator of the configured scheme.
    pub fn with_strategy(mut self, strategy: Box<dyn SelectionStrategy>) -> Self {
        self.scheme = Scheme::with_strategy(self.config.scheme, strategy);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn now(&self) -> i64 {
        self.simulator.get_current_time_in_ms()
    }

    pub fn job_state(&self, job_id: &JobId) -> Option<&JobState> {
        self.jobs.get(job_id).map(|record| &record.state)
    }

    pub fn request(&self, job_id: &JobId) -> Option<&Request> {
        self.jobs.get(job_id).map(|record| &record.request)
    }

    pub fn jobs(&self) -> impl Iterator<Item = (&JobId, &JobState)> {
        self.jobs.iter().map(|(id, record)| (id, &record.state))
    }

    pub fn node(&self, node_id: &NodeId) -> Option<&NodeEntry> {
        self.nodes.get(node_id)
    }

    pub fn vehicle_link(&self, vehicle_id: &VehicleId, node_id: &NodeId) -> Option<&VehicleLink> {
        self.links.get(vehicle_id, node_id)
    }

    pub fn reachability(&self) -> &ReachabilityGraph {
        &self.reachability
    }

    /// Grants queued since the last call, in issue order.
    pub fn drain_grants(&mut self) -> Vec<Grant> {
        mem::take(&mut self.outbox)
    }

    pub fn queued_grants(&self) -> &[Grant] {
        &self.outbox
    }

    /// Registers a new job. Returns false for an id that is already known.
    pub fn record_request(&mut self, request: Request) -> bool {
        if self.jobs.contains_key(&request.job_id) {
            log::debug!("SchedulerCoordinator: duplicate request for {} ignored.", request.job_id);
            return false;
        }

        log::info!(
            "SchedulerCoordinator: request {} from {} (input {} B, period {} ms, service {}, stop at {} ms).",
            request.job_id,
            request.vehicle_id,
            request.input_size,
            request.period_ms,
            request.service,
            request.stop_time_ms
        );
        self.jobs.insert(request.job_id.clone(), JobRecord { request, state: JobState::Unscheduled });
        true
    }

    pub fn record_node_status(&mut self, update: NodeStatusUpdate) {
        if self.nodes.record_status(&update) {
            log::info!(
                "SchedulerCoordinator: node {} registered ({} bands, {} compute units).",
                update.node_id,
                update.free_bandwidth,
                update.free_compute
            );
        }

        if let Some(observation) = &update.vehicle_link {
            if self.departed.contains(&observation.vehicle_id) {
                log::trace!("SchedulerCoordinator: link of departed vehicle {} ignored.", observation.vehicle_id);
            } else if !self.links.observe(&update.node_id, observation) {
                log::trace!("SchedulerCoordinator: stale link {} -> {} ignored.", observation.vehicle_id, update.node_id);
            }
        }
    }

    /// Marks the vehicle as gone. Its waiting requests are pruned by the next cycle.
    pub fn record_vehicle_departure(&mut self, vehicle_id: &VehicleId) {
        log::info!("SchedulerCoordinator: vehicle {} departed.", vehicle_id);
        self.departed.insert(vehicle_id.clone());
        self.links.remove_vehicle(vehicle_id);
    }

    pub fn record_init_feedback(&mut self, feedback: InitFeedback) {
        let Some(record) = self.jobs.get_mut(&feedback.job_id) else {
            log::debug!("SchedulerCoordinator: init feedback for unknown job {} ignored.", feedback.job_id);
            return;
        };
        if record.state.is_unscheduled() {
            log::debug!("SchedulerCoordinator: init feedback for unscheduled job {} ignored.", feedback.job_id);
            return;
        }

        apply_report(&mut self.nodes, &feedback.report);

        let state = mem::replace(&mut record.state, JobState::Unscheduled);
        record.state = match state {
            JobState::Initializing(mut service) => {
                release_hold(&mut self.nodes, &feedback.job_id, &mut service);
                if feedback.success {
                    log::info!("SchedulerCoordinator: {} initialized on {}.", feedback.job_id, service.process_node_id);
                    JobState::Running(service)
                } else {
                    log::warn!("SchedulerCoordinator: initialization of {} failed, job is unscheduled again.", feedback.job_id);
                    JobState::Unscheduled
                }
            }
            JobState::Stopping { mut service, prior: StopOrigin::Initializing } => {
                release_hold(&mut self.nodes, &feedback.job_id, &mut service);
                if feedback.success {
                    JobState::Stopping { service, prior: StopOrigin::Running }
                } else {
                    JobState::Unscheduled
                }
            }
            other => {
                log::debug!("SchedulerCoordinator: init feedback for {} job {} ignored.", other.name(), feedback.job_id);
                other
            }
        };
    }

    pub fn record_runtime_feedback(&mut self, feedback: RuntimeFeedback) {
        let Some(record) = self.jobs.get_mut(&feedback.job_id) else {
            log::debug!("SchedulerCoordinator: runtime feedback for unknown job {} ignored.", feedback.job_id);
            return;
        };
        if record.state.is_unscheduled() {
            log::debug!("SchedulerCoordinator: runtime feedback for unscheduled job {} ignored.", feedback.job_id);
            return;
        }

        apply_report(&mut self.nodes, &feedback.report);

        let state = mem::replace(&mut record.state, JobState::Unscheduled);
        record.state = match state {
            JobState::Stopping { mut service, prior } => {
                if prior == StopOrigin::Initializing {
                    release_hold(&mut self.nodes, &feedback.job_id, &mut service);
                }
                log::info!("SchedulerCoordinator: stop of {} confirmed.", feedback.job_id);
                JobState::Unscheduled
            }
            JobState::Running(mut service) => {
                if feedback.success {
                    service.bandwidth = feedback.granted_bandwidth;
                    JobState::Running(service)
                } else {
                    log::warn!("SchedulerCoordinator: band adjustment of {} rejected, job is unscheduled again.", feedback.job_id);
                    JobState::Unscheduled
                }
            }
            other => {
                log::debug!("SchedulerCoordinator: runtime feedback for {} job {} ignored.", other.name(), feedback.job_id);
                other
            }
        };
    }

    /// Replaces the backhaul topology. Only consulted when forwarding is enabled.
    pub fn set_topology(&mut self, adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>) {
        self.reachability.set_topology(adjacency);
        if !self.config.enable_forwarding {
            log::debug!("SchedulerCoordinator: topology stored, forwarding is disabled.");
        }
    }

    /// Sends a stop instruction for an initializing or running job. Returns whether
    /// an instruction was sent; jobs in any other state are left alone.
    pub fn stop_service(&mut self, job_id: &JobId) -> Result<bool> {
        let record = self.jobs.get_mut(job_id).ok_or_else(|| Error::UnknownJob(job_id.clone()))?;

        let state = mem::replace(&mut record.state, JobState::Unscheduled);
        let (service, prior) = match state {
            JobState::Initializing(service) => (service, StopOrigin::Initializing),
            JobState::Running(service) => (service, StopOrigin::Running),
            other => {
                log::debug!("SchedulerCoordinator: {} is {}, no stop sent.", job_id, other.name());
                record.state = other;
                return Ok(false);
            }
        };

        log::info!("SchedulerCoordinator: stopping {} on {}.", job_id, service.process_node_id);
        let grant = build_grant(&self.nodes, job_id, &record.request, &service, false, true);
        record.state = JobState::Stopping { service, prior };
        self.outbox.push(grant);
        Ok(true)
    }

    /// Stops running jobs whose last round would overrun their stop time, and
    /// every granted job when everything is rescheduled each cycle.
    pub fn pre_schedule_check(&mut self) -> usize {
        if !self.active {
            return 0;
        }

        let now = self.now();
        let reschedule_all = self.config.reschedule_all;
        let targets: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(_, record)| match record.state {
                JobState::Running(_) => reschedule_all || record.request.must_stop(now),
                JobState::Initializing(_) => reschedule_all,
                _ => false,
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut stopped = 0;
        for job_id in targets {
            if let Ok(true) = self.stop_service(&job_id) {
                stopped += 1;
            }
        }
        stopped
    }

    /// Resends the grant of every job whose initialization has not been
    /// acknowledged within the grant acknowledgement interval.
    pub fn check_lost_grant(&mut self) -> usize {
        let now = self.now();
        let mut resent = 0;
        for (job_id, record) in &self.jobs {
            let JobState::Initializing(service) = &record.state else {
                continue;
            };
            if now - service.grant_time_ms > self.config.grant_ack_interval_ms {
                log::info!("SchedulerCoordinator: grant of {} not acknowledged, resending.", job_id);
                self.outbox.push(build_grant(&self.nodes, job_id, &record.request, service, true, false));
                resent += 1;
            }
        }
        resent
    }

    /// Steps down as the acting scheduler: forgets all node state and returns
    /// every granted job to the unscheduled pool.
    pub fn reset_state(&mut self) {
        log::info!("SchedulerCoordinator: resetting state.");
        self.active = false;
        self.nodes.clear();
        self.links.clear();
        self.outbox.clear();
        for record in self.jobs.values_mut() {
            record.state = JobState::Unscheduled;
        }
    }

    pub fn initialize_as_leader(&mut self) {
        log::info!("SchedulerCoordinator: acting as scheduler from {} ms.", self.now());
        self.active = true;
    }

    /// Runs one admission cycle: prune, generate, select, validate and grant.
    ///
    /// Fails with [`Error::InvalidSelection`] when the strategy returns a job
    /// twice or a job without positive utility or offload budget; no grant is
    /// issued in that case.
    pub fn run_scheduling_cycle(&mut self) -> Result<CycleReport> {
        let now = self.now();
        let mut report = CycleReport::new(now, self.scheme.scheme_type());
        if !self.active {
            report.outcome = CycleOutcome::Inactive;
            return Ok(report);
        }

        let cleared = self.clear_stop_waits();
        if cleared > 0 {
            report.outcome = CycleOutcome::AwaitingStops(cleared);
            self.finish_cycle(&mut report);
            return Ok(report);
        }

        self.prune(now);

        let pending: Vec<JobId> =
            self.jobs.iter().filter(|(_, record)| record.state.is_unscheduled()).map(|(id, _)| id.clone()).collect();
        report.pending = pending.len();
        if pending.is_empty() {
            log::debug!("SchedulerCoordinator: no request to schedule at {} ms.", now);
            report.outcome = CycleOutcome::Idle;
            self.finish_cycle(&mut report);
            return Ok(report);
        }

        let snapshot = self.build_snapshot(now, &pending);
        let outcome = self.scheme.run(&snapshot);
        report.candidates = outcome.candidates.len();
        report.generation_time = outcome.generation_time;
        report.selection_time = outcome.selection_time;

        let planned = self.validate_selection(&snapshot, &outcome.selected)?;

        let budget_ms = (self.config.scheduling_interval_ms - self.config.app_stop_interval_ms).max(0) as u64;
        if outcome.selection_time >= Duration::from_millis(budget_ms) {
            log::warn!(
                "SchedulerCoordinator: selection took {:?}, more than the {} ms budget; result discarded.",
                outcome.selection_time,
                budget_ms
            );
            report.outcome = CycleOutcome::Discarded;
            self.finish_cycle(&mut report);
            return Ok(report);
        }

        let grant_time = if self.config.count_exe_time { now + outcome.selection_time.as_millis() as i64 } else { now };
        for (job_id, service) in planned {
            self.issue_grant(job_id, service, grant_time, &mut report);
        }
        self.finish_cycle(&mut report);
        Ok(report)
    }

    /// Returns every stopping job to the state it was stopped from.
    fn clear_stop_waits(&mut self) -> usize {
        let mut cleared = 0;
        for (job_id, record) in self.jobs.iter_mut() {
            if !record.state.is_stopping() {
                continue;
            }
            if let JobState::Stopping { service, prior } = mem::replace(&mut record.state, JobState::Unscheduled) {
                record.state = match prior {
                    StopOrigin::Initializing => JobState::Initializing(service),
                    StopOrigin::Running => JobState::Running(service),
                };
                log::debug!("SchedulerCoordinator: stop of {} unconfirmed, back to {}.", job_id, record.state.name());
                cleared += 1;
            }
        }
        if cleared > 0 {
            log::info!("SchedulerCoordinator: {} stop confirmations outstanding, selection skipped.", cleared);
        }
        cleared
    }

    fn prune(&mut self, now: i64) {
        let interval = self.config.scheduling_interval_ms;
        let expired: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(_, record)| record.state.is_unscheduled())
            .filter(|(_, record)| {
                let request = &record.request;
                self.departed.contains(&request.vehicle_id) || request.period_ms <= 0 || request.is_expiring(now, interval)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for job_id in expired {
            log::info!("SchedulerCoordinator: request {} removed.", job_id);
            self.jobs.remove(&job_id);
        }

        let removed = self.links.prune(now, self.config.conn_outdate_interval_ms);
        if removed > 0 {
            log::debug!("SchedulerCoordinator: {} outdated vehicle links removed.", removed);
        }

        let silence = self.config.node_silence_ms();
        for entry in self.nodes.iter_mut() {
            let (bandwidth, compute) = entry.resource.zero_silent(now, silence);
            if bandwidth || compute {
                log::debug!(
                    "SchedulerCoordinator: node {} silent (bandwidth {}, compute {}), figures zeroed.",
                    entry.resource.node_id,
                    bandwidth,
                    compute
                );
            }
        }
    }

    fn build_snapshot(&self, now: i64, pending: &[JobId]) -> SchedulingSnapshot {
        let nodes: Vec<NodeView> = self
            .nodes
            .iter()
            .map(|entry| NodeView {
                node_id: entry.resource.node_id.clone(),
                device_type: entry.resource.device_type.clone(),
                free_bandwidth: entry.available_bandwidth(),
                free_compute: entry.available_compute(),
                compute_capacity: entry.resource.compute_capacity,
            })
            .collect();

        let jobs = pending
            .iter()
            .filter_map(|job_id| self.jobs.get(job_id))
            .map(|record| {
                let links: Vec<(NodeId, f64)> = self
                    .links
                    .links_of(&record.request.vehicle_id)
                    .map(|(node_id, link)| (node_id.clone(), link.bytes_per_band))
                    .collect();
                (&record.request, links)
            })
            .collect();

        let reachability = if self.config.enable_forwarding { Some(&self.reachability) } else { None };
        SchedulingSnapshot::build(now, SchemeParams::from(&self.config), self.profile.clone(), nodes, jobs, reachability)
    }

    fn validate_selection(&self, snapshot: &SchedulingSnapshot, selected: &[SelectedInstance]) -> Result<Vec<(JobId, GrantedService)>> {
        let scheme = self.scheme.scheme_type().to_string();
        let invalid = |job_id: JobId, reason: String| Error::InvalidSelection { scheme: scheme.clone(), job_id, reason };

        let mut seen = HashSet::new();
        let mut planned = Vec::with_capacity(selected.len());
        for instance in selected {
            let job_id = snapshot
                .job_id(instance.job)
                .cloned()
                .ok_or_else(|| invalid(JobId::new(format!("#{}", instance.job.0)), "job index out of range".to_string()))?;
            let (Some(offload_node_id), Some(process_node_id)) =
                (snapshot.node_id(instance.offload_node).cloned(), snapshot.node_id(instance.process_node).cloned())
            else {
                return Err(invalid(job_id, "node index out of range".to_string()));
            };
            if !seen.insert(instance.job) {
                return Err(invalid(job_id, "job selected twice".to_string()));
            }
            if instance.utility <= 0.0 {
                return Err(invalid(job_id, format!("non-positive utility {}", instance.utility)));
            }
            if instance.max_offload_time <= 0.0 {
                return Err(invalid(job_id, format!("non-positive max offload time {}", instance.max_offload_time)));
            }

            let mut max_offload_time = instance.max_offload_time;
            if self.config.objective == Objective::Energy {
                if let Some(bound) = self.jobs.get(&job_id).and_then(|record| record.request.energy_offload_bound()) {
                    max_offload_time = max_offload_time.min(bound);
                }
            }

            planned.push((
                job_id,
                GrantedService {
                    offload_node_id,
                    process_node_id,
                    bandwidth: instance.bandwidth,
                    compute: instance.compute,
                    utility: instance.utility,
                    exec_time: instance.exec_delay,
                    max_offload_time,
                    service: instance.service.clone(),
                    grant_time_ms: 0,
                    held_bandwidth: 0,
                    held_compute: 0,
                },
            ));
        }
        Ok(planned)
    }

    fn issue_grant(&mut self, job_id: JobId, mut service: GrantedService, grant_time_ms: i64, report: &mut CycleReport) {
        let bandwidth_ok = self.nodes.get(&service.offload_node_id).is_some_and(|e| e.resource.free_bandwidth >= service.bandwidth);
        let compute_ok = self.nodes.get(&service.process_node_id).is_some_and(|e| e.resource.free_compute >= service.compute);
        if !bandwidth_ok || !compute_ok {
            log::debug!(
                "SchedulerCoordinator: {} dropped, {} or {} lacks resources at grant time.",
                job_id,
                service.offload_node_id,
                service.process_node_id
            );
            report.dropped += 1;
            return;
        }
        let Some(record) = self.jobs.get_mut(&job_id) else {
            return;
        };

        service.grant_time_ms = grant_time_ms;
        if let Some(entry) = self.nodes.get_mut(&service.offload_node_id) {
            service.held_bandwidth = entry.hold_bandwidth(service.bandwidth);
            entry.init_waits.insert(job_id.clone());
        }
        if let Some(entry) = self.nodes.get_mut(&service.process_node_id) {
            service.held_compute = entry.hold_compute(service.compute);
            entry.init_waits.insert(job_id.clone());
        }

        tracing::info!(
            target: ANALYTICS_TARGET,
            job = %job_id,
            offload_node = %service.offload_node_id,
            process_node = %service.process_node_id,
            bandwidth = service.bandwidth,
            compute = service.compute,
            utility = service.utility,
            max_offload_time = service.max_offload_time,
            "grant issued"
        );
        log::info!(
            "SchedulerCoordinator: granted {} -> {}/{} ({} bands, {} compute units, utility {:.4}).",
            job_id,
            service.offload_node_id,
            service.process_node_id,
            service.bandwidth,
            service.compute,
            service.utility
        );

        let grant = build_grant(&self.nodes, &job_id, &record.request, &service, true, false);
        report.granted_utility += service.utility;
        record.state = JobState::Initializing(service);
        self.outbox.push(grant);
        report.granted.push(job_id);
    }

    fn finish_cycle(&self, report: &mut CycleReport) {
        let interval_s = self.config.scheduling_interval_ms as f64 / 1000.0;
        let running: Vec<&GrantedService> = self
            .jobs
            .values()
            .filter_map(|record| match &record.state {
                JobState::Running(service) => Some(service),
                _ => None,
            })
            .collect();
        report.running = running.len();
        report.interval_utility = report.granted_utility * interval_s;
        if !self.config.reschedule_all {
            report.interval_utility += running.iter().map(|service| service.utility * interval_s).sum::<f64>();
        }

        let discarded = report.outcome == CycleOutcome::Discarded;
        tracing::info!(
            target: ANALYTICS_TARGET,
            time_ms = report.time_ms,
            scheme = %report.scheme,
            outcome = ?report.outcome,
            pending = report.pending,
            candidates = report.candidates,
            granted = report.granted.len(),
            running = report.running,
            utility = report.interval_utility,
            generation_us = report.generation_time.as_micros() as u64,
            selection_us = report.selection_time.as_micros() as u64,
            "cycle finished"
        );

        let mut event = StatisticEvent::new();
        event
            .set(StatParameter::Time, report.time_ms)
            .set(StatParameter::LogDescription, format!("{:?}", report.outcome))
            .set(StatParameter::Scheme, report.scheme.name())
            .set(StatParameter::PendingJobs, report.pending)
            .set(StatParameter::Candidates, report.candidates)
            .set(StatParameter::GrantedJobs, report.granted.len())
            .set(StatParameter::RunningJobs, report.running)
            .set(StatParameter::GrantedUtility, report.granted_utility)
            .set(StatParameter::IntervalUtility, report.interval_utility)
            .set(StatParameter::GenerationTime, report.generation_time.as_micros() as i64)
            .set(StatParameter::SelectionTime, report.selection_time.as_micros() as i64)
            .set(StatParameter::Discarded, discarded);
        statistics::add_global_event(event);
    }
}

fn apply_report(nodes: &mut NodeStore, report: &ResourceReport) {
    match nodes.get_mut(&report.offload_node_id) {
        Some(entry) => {
            entry.resource.apply_bandwidth_report(report.free_bandwidth, report.bandwidth_timestamp_ms);
        }
        None => log::debug!("SchedulerCoordinator: report for unknown node {} ignored.", report.offload_node_id),
    }
    match nodes.get_mut(&report.process_node_id) {
        Some(entry) => {
            entry.resource.apply_compute_report(report.free_compute, report.compute_timestamp_ms);
        }
        None => log::debug!("SchedulerCoordinator: report for unknown node {} ignored.", report.process_node_id),
    }
}

fn release_hold(nodes: &mut NodeStore, job_id: &JobId, service: &mut GrantedService) {
    if let Some(entry) = nodes.get_mut(&service.offload_node_id) {
        entry.release_bandwidth(service.held_bandwidth);
        entry.init_waits.remove(job_id);
    }
    if let Some(entry) = nodes.get_mut(&service.process_node_id) {
        entry.release_compute(service.held_compute);
        entry.init_waits.remove(job_id);
    }
    service.held_bandwidth = 0;
    service.held_compute = 0;
}

fn build_grant(nodes: &NodeStore, job_id: &JobId, request: &Request, service: &GrantedService, is_start: bool, is_stop: bool) -> Grant {
    let offload_node_address = nodes
        .get(&service.offload_node_id)
        .map(|entry| entry.resource.address.clone())
        .unwrap_or_else(|| service.offload_node_id.to_string());

    Grant {
        job_id: job_id.clone(),
        vehicle_address: request.vehicle_address.clone(),
        offload_node_id: service.offload_node_id.clone(),
        offload_node_address,
        process_node_id: service.process_node_id.clone(),
        resource_type: request.resource_type.clone(),
        service: service.service.clone(),
        compute_units: service.compute,
        bandwidth: service.bandwidth,
        deadline_ms: request.period_ms,
        output_size: request.output_size,
        input_size: request.input_size,
        is_start,
        is_stop,
        exec_time: service.exec_time,
        max_offload_time: service.max_offload_time,
        utility: service.utility,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mec_system_model::messages::VehicleLinkObservation;
    use crate::domain::mec_system_model::node_resource::sample_status;
    use crate::domain::mec_system_model::profile::ProfileDatabase;
    use crate::domain::mec_system_model::request::sample_request;
    use crate::domain::simulator::simulator_mock::MockSimulator;
    use tracing_test::traced_test;

    fn coordinator(clock: &MockSimulator) -> SchedulerCoordinator {
        let profile = Arc::new(ProfileDatabase::new().with_execution_time("resnet", "rtx", 0.05));
        let simulator = SharedSimulator(Arc::new(clock.clone()));
        let mut coordinator = SchedulerCoordinator::new(SchedulerConfig::default(), profile, simulator).unwrap();
        coordinator.initialize_as_leader();
        coordinator
    }

    fn status_with_link(node: &str, bw: i64, cu: i64, ts: i64, vehicle: &str) -> NodeStatusUpdate {
        let mut status = sample_status(node, bw, cu, ts);
        status.vehicle_link =
            Some(VehicleLinkObservation { vehicle_id: VehicleId::new(vehicle), bytes_per_band: 2000.0, timestamp_ms: ts });
        status
    }

    #[test]
    fn inactive_coordinator_does_not_schedule() {
        let clock = MockSimulator::new(0);
        let mut coordinator = coordinator(&clock);
        coordinator.reset_state();
        coordinator.record_node_status(status_with_link("rsu1", 10, 5, 0, "veh1"));
        coordinator.record_request(sample_request("veh1", 1));

        let report = coordinator.run_scheduling_cycle().unwrap();
        assert_eq!(report.outcome, CycleOutcome::Inactive);
        assert!(coordinator.drain_grants().is_empty());
    }

    #[test]
    fn duplicate_request_is_ignored() {
        let clock = MockSimulator::new(0);
        let mut coordinator = coordinator(&clock);
        assert!(coordinator.record_request(sample_request("veh1", 1)));

        let mut duplicate = sample_request("veh1", 1);
        duplicate.period_ms = 500;
        assert!(!coordinator.record_request(duplicate));
        assert_eq!(coordinator.request(&JobId::new("veh1:1")).unwrap().period_ms, 100);
    }

    #[traced_test]
    #[test]
    fn grant_emits_analytics_event() {
        let clock = MockSimulator::new(0);
        let mut coordinator = coordinator(&clock);
        coordinator.record_node_status(status_with_link("rsu1", 10, 5, 0, "veh1"));
        coordinator.record_request(sample_request("veh1", 1));

        let report = coordinator.run_scheduling_cycle().unwrap();
        assert_eq!(report.granted, vec![JobId::new("veh1:1")]);
        assert!(logs_contain("job=veh1:1"));
        assert!(logs_contain("offload_node=rsu1"));
    }

    #[test]
    fn stopping_an_initializing_job_keeps_its_hold_until_feedback() {
        let clock = MockSimulator::new(0);
        let mut coordinator = coordinator(&clock);
        coordinator.record_node_status(status_with_link("rsu1", 10, 5, 0, "veh1"));
        coordinator.record_request(sample_request("veh1", 1));
        coordinator.run_scheduling_cycle().unwrap();
        let job = JobId::new("veh1:1");
        let node = NodeId::new("rsu1");
        let held = coordinator.node(&node).unwrap().on_hold_compute;
        assert!(held > 0);

        assert!(coordinator.stop_service(&job).unwrap());
        assert_eq!(coordinator.node(&node).unwrap().on_hold_compute, held);

        let report = ResourceReport {
            offload_node_id: node.clone(),
            process_node_id: node.clone(),
            free_bandwidth: 10,
            free_compute: 5,
            bandwidth_timestamp_ms: 1,
            compute_timestamp_ms: 1,
        };
        coordinator.record_init_feedback(InitFeedback { job_id: job.clone(), success: true, report });
        assert_eq!(coordinator.node(&node).unwrap().on_hold_compute, 0);
        assert_eq!(
            coordinator.job_state(&job).map(|s| s.name()),
            Some("Stopping"),
            "job still waits for the stop confirmation"
        );
    }

    #[test]
    fn outstanding_stops_skip_selection_and_revert() {
        let clock = MockSimulator::new(0);
        let mut coordinator = coordinator(&clock);
        coordinator.record_node_status(status_with_link("rsu1", 10, 5, 0, "veh1"));
        coordinator.record_request(sample_request("veh1", 1));
        coordinator.run_scheduling_cycle().unwrap();
        let job = JobId::new("veh1:1");
        coordinator.stop_service(&job).unwrap();

        coordinator.record_request(sample_request("veh2", 1));
        let report = coordinator.run_scheduling_cycle().unwrap();
        assert_eq!(report.outcome, CycleOutcome::AwaitingStops(1));
        assert!(coordinator.job_state(&job).unwrap().is_initializing());
        assert!(coordinator.job_state(&JobId::new("veh2:1")).unwrap().is_unscheduled());
    }

    #[test]
    fn departed_vehicle_requests_are_pruned() {
        let clock = MockSimulator::new(0);
        let mut coordinator = coordinator(&clock);
        coordinator.record_node_status(status_with_link("rsu1", 10, 5, 0, "veh1"));
        coordinator.record_request(sample_request("veh1", 1));
        coordinator.record_vehicle_departure(&VehicleId::new("veh1"));

        let report = coordinator.run_scheduling_cycle().unwrap();
        assert_eq!(report.outcome, CycleOutcome::Idle);
        assert!(coordinator.job_state(&JobId::new("veh1:1")).is_none());
        assert!(coordinator.vehicle_link(&VehicleId::new("veh1"), &NodeId::new("rsu1")).is_none());
    }

    #[test]
    fn silent_nodes_are_zeroed_but_kept() {
        let clock = MockSimulator::new(0);
        let mut coordinator = coordinator(&clock);
        coordinator.record_node_status(sample_status("rsu1", 10, 5, 0));
        clock.set_time(401);

        coordinator.run_scheduling_cycle().unwrap();
        let entry = coordinator.node(&NodeId::new("rsu1")).unwrap();
        assert_eq!(entry.resource.free_bandwidth, 0);
        assert_eq!(entry.resource.free_compute, 0);
    }

    #[test]
    fn energy_mode_caps_max_offload_time() {
        let clock = MockSimulator::new(0);
        let mut coordinator = coordinator(&clock);
        coordinator.record_node_status(status_with_link("rsu1", 10, 5, 0, "veh1"));
        let mut request = sample_request("veh1", 1);
        // offloading longer than 10 ms costs more energy than it saves
        request.local_energy = 0.005;
        request.offload_power = 0.5;
        coordinator.record_request(request);

        coordinator.run_scheduling_cycle().unwrap();
        let grants = coordinator.drain_grants();
        assert_eq!(grants.len(), 1);
        assert!(grants[0].max_offload_time <= 0.01 + 1e-12);
    }
}
