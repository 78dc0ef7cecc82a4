mod common;

use mec_scheduler::domain::mec_system_model::coordinator::coordinator::{CycleOutcome, SchedulerCoordinator};
use mec_scheduler::domain::mec_system_model::coordinator::job_state::{JobState, StopOrigin};
use mec_scheduler::domain::mec_system_model::messages::{Grant, RuntimeFeedback};
use mec_scheduler::domain::mec_system_model::scheduler_config::SchedulerConfig;
use mec_scheduler::domain::mec_system_model::utils::id::{NodeId, VehicleId};
use mec_scheduler::domain::simulator::simulator_mock::MockSimulator;
use mec_scheduler::error::Error;

use common::{coordinator, init_feedback, job, node_status, report_for, request, status_with_link, stop_confirmation};

/// One granted job on rsu1 at t = 1000.
fn granted(config: SchedulerConfig) -> (SchedulerCoordinator, MockSimulator, Grant) {
    let (mut coordinator, clock) = coordinator(config, 1000);
    coordinator.record_node_status(status_with_link("rsu1", 10, 5, 1000, "veh1"));
    coordinator.record_request(request("veh1", 1));
    coordinator.run_scheduling_cycle().unwrap();
    let grant = coordinator.drain_grants().remove(0);
    (coordinator, clock, grant)
}

#[test]
fn job_walks_through_the_full_lifecycle() {
    let (mut coordinator, clock, grant) = granted(SchedulerConfig::default());
    let id = job("veh1", 1);
    assert!(coordinator.job_state(&id).is_some_and(JobState::is_initializing));

    clock.set_time(1050);
    coordinator.record_init_feedback(init_feedback(&grant, true, 10 - grant.bandwidth, 5 - grant.compute_units, 1050));
    assert!(coordinator.job_state(&id).is_some_and(JobState::is_running));

    assert!(coordinator.stop_service(&id).unwrap());
    assert!(matches!(coordinator.job_state(&id), Some(JobState::Stopping { prior: StopOrigin::Running, .. })));
    let stop = coordinator.drain_grants().remove(0);
    assert!(stop.is_stop && !stop.is_start);
    assert_eq!(stop.job_id, id);

    coordinator.record_runtime_feedback(stop_confirmation(&grant, 10, 5, 1100));
    assert!(coordinator.job_state(&id).is_some_and(JobState::is_unscheduled));
    let node = coordinator.node(&NodeId::new("rsu1")).unwrap();
    assert_eq!(node.resource.free_bandwidth, 10);
    assert_eq!(node.resource.free_compute, 5);
}

#[test]
fn failed_initialization_returns_job_to_pool_and_releases_hold() {
    let (mut coordinator, _clock, grant) = granted(SchedulerConfig::default());
    coordinator.record_init_feedback(init_feedback(&grant, false, 10, 5, 1000));

    assert!(coordinator.job_state(&job("veh1", 1)).is_some_and(JobState::is_unscheduled));
    let node = coordinator.node(&NodeId::new("rsu1")).unwrap();
    assert_eq!(node.on_hold_bandwidth, 0);
    assert_eq!(node.on_hold_compute, 0);
    assert!(node.init_waits.is_empty());
}

#[test]
fn holds_cover_initializing_jobs_and_drain_on_feedback() {
    let (mut coordinator, _clock) = coordinator(SchedulerConfig::default(), 1000);
    coordinator.record_node_status(status_with_link("rsu1", 10, 5, 1000, "veh1"));
    coordinator.record_node_status(status_with_link("rsu2", 10, 5, 1000, "veh2"));
    coordinator.record_request(request("veh1", 1));
    coordinator.record_request(request("veh2", 1));

    let report = coordinator.run_scheduling_cycle().unwrap();
    assert_eq!(report.granted.len(), 2);
    let grants = coordinator.drain_grants();

    for grant in &grants {
        let node = coordinator.node(&grant.offload_node_id).unwrap();
        let held_bandwidth: i64 = grants.iter().filter(|g| g.offload_node_id == grant.offload_node_id).map(|g| g.bandwidth).sum();
        let held_compute: i64 = grants.iter().filter(|g| g.process_node_id == grant.process_node_id).map(|g| g.compute_units).sum();
        assert_eq!(node.on_hold_bandwidth, held_bandwidth);
        assert_eq!(node.on_hold_compute, held_compute);
        assert_eq!(node.available_bandwidth(), 10 - held_bandwidth);
        assert_eq!(node.available_compute(), 5 - held_compute);
        assert!(node.init_waits.contains(&grant.job_id));
    }

    for grant in &grants {
        coordinator.record_init_feedback(init_feedback(grant, true, 10 - grant.bandwidth, 5 - grant.compute_units, 1010));
    }
    for grant in &grants {
        let node = coordinator.node(&grant.offload_node_id).unwrap();
        assert_eq!(node.on_hold_bandwidth, 0);
        assert_eq!(node.on_hold_compute, 0);
        assert_eq!(node.available_bandwidth(), 10 - grant.bandwidth);
        assert!(coordinator.job_state(&grant.job_id).is_some_and(JobState::is_running));
    }
}

#[test]
fn stopping_twice_sends_one_instruction() {
    let (mut coordinator, _clock, _grant) = granted(SchedulerConfig::default());
    let id = job("veh1", 1);

    assert!(coordinator.stop_service(&id).unwrap());
    assert!(!coordinator.stop_service(&id).unwrap());
    let stops: Vec<Grant> = coordinator.drain_grants().into_iter().filter(|g| g.is_stop).collect();
    assert_eq!(stops.len(), 1);
}

#[test]
fn stopping_an_unknown_job_fails() {
    let (mut coordinator, _clock) = coordinator(SchedulerConfig::default(), 0);
    let err = coordinator.stop_service(&job("ghost", 7)).unwrap_err();
    assert!(matches!(err, Error::UnknownJob(id) if id == job("ghost", 7)));
}

#[test]
fn stale_updates_never_win_over_newer_ones() {
    let (mut replayed, _clock) = coordinator(SchedulerConfig::default(), 0);
    replayed.record_node_status(node_status("rsu1", 3, 1, 100));
    replayed.record_node_status(node_status("rsu1", 8, 4, 200));
    replayed.record_node_status(node_status("rsu1", 3, 1, 100));

    let (mut latest_only, _clock) = coordinator(SchedulerConfig::default(), 0);
    latest_only.record_node_status(node_status("rsu1", 8, 4, 200));

    let node = NodeId::new("rsu1");
    assert_eq!(replayed.node(&node).unwrap().resource, latest_only.node(&node).unwrap().resource);
}

#[test]
fn unconfirmed_stops_block_one_cycle() {
    let (mut coordinator, clock, grant) = granted(SchedulerConfig::default());
    let id = job("veh1", 1);
    coordinator.record_init_feedback(init_feedback(&grant, true, 10 - grant.bandwidth, 5 - grant.compute_units, 1000));
    coordinator.stop_service(&id).unwrap();
    coordinator.record_request(request("veh2", 1));

    clock.set_time(2000);
    let report = coordinator.run_scheduling_cycle().unwrap();
    assert_eq!(report.outcome, CycleOutcome::AwaitingStops(1));
    assert!(report.granted.is_empty());
    assert!(coordinator.job_state(&id).is_some_and(JobState::is_running));
    assert!(coordinator.job_state(&job("veh2", 1)).is_some_and(JobState::is_unscheduled));
}

#[test]
fn pre_schedule_check_stops_jobs_near_their_stop_time() {
    let (mut coordinator, clock) = coordinator(SchedulerConfig::default(), 1000);
    coordinator.record_node_status(status_with_link("rsu1", 10, 5, 1000, "veh1"));
    let mut short_lived = request("veh1", 1);
    short_lived.stop_time_ms = 3000;
    coordinator.record_request(short_lived);
    coordinator.run_scheduling_cycle().unwrap();
    let grant = coordinator.drain_grants().remove(0);
    coordinator.record_init_feedback(init_feedback(&grant, true, 10 - grant.bandwidth, 5 - grant.compute_units, 1000));

    clock.set_time(2899);
    assert_eq!(coordinator.pre_schedule_check(), 0);

    clock.set_time(2900);
    assert_eq!(coordinator.pre_schedule_check(), 1);
    assert!(coordinator.drain_grants()[0].is_stop);

    // a confirmed stop past the expiry point is pruned by the next cycle
    coordinator.record_runtime_feedback(stop_confirmation(&grant, 10, 5, 2900));
    clock.set_time(3000);
    coordinator.run_scheduling_cycle().unwrap();
    assert!(coordinator.job_state(&job("veh1", 1)).is_none());
}

#[test]
fn reschedule_all_stops_every_granted_job() {
    let config = SchedulerConfig { reschedule_all: true, ..SchedulerConfig::default() };
    let (mut coordinator, clock, _grant) = granted(config);

    clock.advance(900);
    assert_eq!(coordinator.pre_schedule_check(), 1);
    assert!(matches!(
        coordinator.job_state(&job("veh1", 1)),
        Some(JobState::Stopping { prior: StopOrigin::Initializing, .. })
    ));
}

#[test]
fn stopping_an_initializing_job_waits_for_both_answers() {
    let (mut coordinator, _clock, grant) = granted(SchedulerConfig::default());
    let id = job("veh1", 1);
    coordinator.stop_service(&id).unwrap();

    coordinator.record_init_feedback(init_feedback(&grant, true, 10 - grant.bandwidth, 5 - grant.compute_units, 1010));
    assert!(matches!(coordinator.job_state(&id), Some(JobState::Stopping { prior: StopOrigin::Running, .. })));
    assert_eq!(coordinator.node(&NodeId::new("rsu1")).unwrap().on_hold_bandwidth, 0);

    coordinator.record_runtime_feedback(stop_confirmation(&grant, 10, 5, 1020));
    assert!(coordinator.job_state(&id).is_some_and(JobState::is_unscheduled));
}

#[test]
fn runtime_feedback_adjusts_running_bandwidth() {
    let (mut coordinator, _clock, grant) = granted(SchedulerConfig::default());
    let id = job("veh1", 1);
    coordinator.record_init_feedback(init_feedback(&grant, true, 10 - grant.bandwidth, 5 - grant.compute_units, 1000));

    coordinator.record_runtime_feedback(RuntimeFeedback {
        job_id: id.clone(),
        success: true,
        granted_bandwidth: 7,
        report: report_for(&grant, 3, 5 - grant.compute_units, 1100),
    });
    assert_eq!(coordinator.job_state(&id).and_then(JobState::service).map(|s| s.bandwidth), Some(7));
    assert_eq!(coordinator.node(&NodeId::new("rsu1")).unwrap().resource.free_bandwidth, 3);

    coordinator.record_runtime_feedback(RuntimeFeedback {
        job_id: id.clone(),
        success: false,
        granted_bandwidth: 0,
        report: report_for(&grant, 3, 5, 1200),
    });
    assert!(coordinator.job_state(&id).is_some_and(JobState::is_unscheduled));
}

#[test]
fn departed_vehicles_lose_their_waiting_requests() {
    let (mut coordinator, clock) = coordinator(SchedulerConfig::default(), 1000);
    coordinator.record_node_status(node_status("rsu1", 0, 0, 1000));
    coordinator.record_request(request("veh1", 1));

    coordinator.record_vehicle_departure(&VehicleId::new("veh1"));
    coordinator.record_node_status(status_with_link("rsu1", 10, 5, 1100, "veh1"));
    assert!(coordinator.vehicle_link(&VehicleId::new("veh1"), &NodeId::new("rsu1")).is_none());

    clock.set_time(1200);
    let report = coordinator.run_scheduling_cycle().unwrap();
    assert_eq!(report.outcome, CycleOutcome::Idle);
    assert!(coordinator.job_state(&job("veh1", 1)).is_none());
}

#[test]
fn stepping_down_forgets_nodes_and_grants() {
    let (mut coordinator, _clock, _grant) = granted(SchedulerConfig::default());
    coordinator.check_lost_grant();
    coordinator.reset_state();

    assert!(!coordinator.is_active());
    assert!(coordinator.node(&NodeId::new("rsu1")).is_none());
    assert!(coordinator.queued_grants().is_empty());
    assert!(coordinator.job_state(&job("veh1", 1)).is_some_and(JobState::is_unscheduled));
    assert_eq!(coordinator.pre_schedule_check(), 0);
    assert_eq!(coordinator.run_scheduling_cycle().unwrap().outcome, CycleOutcome::Inactive);

    coordinator.initialize_as_leader();
    assert!(coordinator.is_active());
}
