mod common;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use mec_scheduler::domain::mec_system_model::coordinator::coordinator::{CycleOutcome, SchedulerCoordinator};
use mec_scheduler::domain::mec_system_model::messages::Grant;
use mec_scheduler::domain::mec_system_model::scheduler_config::{Objective, SchedulerConfig};
use mec_scheduler::domain::mec_system_model::scheme::scheme_type::SchemeType;
use mec_scheduler::domain::mec_system_model::utils::id::NodeId;
use mec_scheduler::error::Error;

use common::{coordinator, node_status, request, status_with_link};

/// rsu1 - rsu2 - rsu3 chain with uneven resources.
const NODES: [(&str, i64, i64); 3] = [("rsu1", 10, 5), ("rsu2", 6, 8), ("rsu3", 4, 0)];

fn chain() -> BTreeMap<NodeId, BTreeSet<NodeId>> {
    let mut adjacency: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
    for (a, b) in [("rsu1", "rsu2"), ("rsu2", "rsu3")] {
        adjacency.entry(NodeId::new(a)).or_default().insert(NodeId::new(b));
        adjacency.entry(NodeId::new(b)).or_default().insert(NodeId::new(a));
    }
    adjacency
}

fn config_for(scheme: SchemeType) -> SchedulerConfig {
    SchedulerConfig {
        scheme,
        objective: scheme.objective(),
        enable_forwarding: scheme.supports_forwarding(),
        seed: Some(7),
        ..SchedulerConfig::default()
    }
}

/// Six vehicles spread over the chain, some of them seeing two nodes.
fn crowded(scheme: SchemeType) -> SchedulerCoordinator {
    let (mut coordinator, _clock) = coordinator(config_for(scheme), 1000);
    coordinator.set_topology(chain());
    for (node, bw, cu) in NODES {
        coordinator.record_node_status(node_status(node, bw, cu, 1000));
    }
    let sightings = [
        ("veh1", "rsu1"),
        ("veh2", "rsu1"),
        ("veh3", "rsu2"),
        ("veh3", "rsu1"),
        ("veh4", "rsu2"),
        ("veh5", "rsu3"),
        ("veh6", "rsu3"),
        ("veh6", "rsu2"),
    ];
    for (vehicle, node) in sightings {
        let (_, bw, cu) = NODES.iter().find(|(name, _, _)| *name == node).copied().unwrap();
        coordinator.record_node_status(status_with_link(node, bw, cu, 1000, vehicle));
    }
    for vehicle in ["veh1", "veh2", "veh3", "veh4", "veh5", "veh6"] {
        coordinator.record_request(request(vehicle, 1));
    }
    coordinator
}

fn assert_feasible(scheme: SchemeType, grants: &[Grant]) {
    let mut jobs = HashSet::new();
    let mut bandwidth: HashMap<&str, i64> = HashMap::new();
    let mut compute: HashMap<&str, i64> = HashMap::new();
    for grant in grants {
        assert!(jobs.insert(grant.job_id.clone()), "{}: {} granted twice", scheme, grant.job_id);
        assert!(grant.utility > 0.0, "{}: non-positive utility", scheme);
        assert!(grant.max_offload_time > 0.0, "{}: no offload budget", scheme);
        *bandwidth.entry(grant.offload_node_id.as_str()).or_default() += grant.bandwidth;
        *compute.entry(grant.process_node_id.as_str()).or_default() += grant.compute_units;
    }
    for (node, bw, cu) in NODES {
        assert!(bandwidth.get(node).copied().unwrap_or(0) <= bw, "{}: bandwidth of {} exceeded", scheme, node);
        assert!(compute.get(node).copied().unwrap_or(0) <= cu, "{}: compute of {} exceeded", scheme, node);
    }
}

#[test]
fn every_scheme_respects_capacity_and_admits_once() {
    for scheme in SchemeType::ALL {
        let mut coordinator = crowded(scheme);
        let report = coordinator.run_scheduling_cycle().unwrap_or_else(|e| panic!("{} failed: {}", scheme, e));
        assert_eq!(report.outcome, CycleOutcome::Completed, "{}", scheme);
        assert_eq!(report.pending, 6);
        assert_eq!(report.scheme, scheme);

        let grants = coordinator.drain_grants();
        assert_eq!(grants.len(), report.granted.len());
        assert!(!grants.is_empty(), "{} granted nothing", scheme);
        assert_feasible(scheme, &grants);
    }
}

#[test]
fn forwarding_moves_work_to_a_neighbour_with_compute() {
    let (mut coordinator, _clock) = coordinator(config_for(SchemeType::FwdGreedy), 1000);
    coordinator.set_topology(chain());
    coordinator.record_node_status(node_status("rsu2", 0, 8, 1000));
    coordinator.record_node_status(status_with_link("rsu3", 4, 0, 1000, "veh1"));
    coordinator.record_request(request("veh1", 1));

    let report = coordinator.run_scheduling_cycle().unwrap();
    assert_eq!(report.granted.len(), 1);
    let grant = coordinator.drain_grants().remove(0);
    assert_eq!(grant.offload_node_id, NodeId::new("rsu3"));
    assert_eq!(grant.process_node_id, NodeId::new("rsu2"));
}

#[test]
fn forwarding_schemes_stay_direct_without_forwarding() {
    let config = SchedulerConfig { enable_forwarding: false, ..config_for(SchemeType::FwdGreedy) };
    let (mut coordinator, _clock) = coordinator(config, 1000);
    coordinator.set_topology(chain());
    coordinator.record_node_status(node_status("rsu2", 0, 8, 1000));
    coordinator.record_node_status(status_with_link("rsu3", 4, 0, 1000, "veh1"));
    coordinator.record_request(request("veh1", 1));

    let report = coordinator.run_scheduling_cycle().unwrap();
    assert!(report.granted.is_empty());
    assert_eq!(report.candidates, 0);
}

#[test]
fn accuracy_schemes_prefer_the_more_accurate_service() {
    let (mut coordinator, _clock) = coordinator(config_for(SchemeType::AccuracyGreedy), 1000);
    coordinator.record_node_status(status_with_link("rsu1", 10, 5, 1000, "veh1"));
    coordinator.record_request(request("veh1", 1));

    coordinator.run_scheduling_cycle().unwrap();
    let grant = coordinator.drain_grants().remove(0);
    assert_eq!(grant.service.as_str(), "resnet");
    assert!((grant.utility - 0.4).abs() < 1e-9);
}

#[test]
fn energy_grants_never_exceed_the_break_even_offload_time() {
    let (mut coordinator, _clock) = coordinator(SchedulerConfig::default(), 1000);
    coordinator.record_node_status(status_with_link("rsu1", 10, 5, 1000, "veh1"));
    let mut frugal = request("veh1", 1);
    // 0.02 J at 0.5 W breaks even after 40 ms of upload, well inside the 200 ms period
    frugal.local_energy = 0.02;
    frugal.period_ms = 200;
    coordinator.record_request(frugal);

    coordinator.run_scheduling_cycle().unwrap();
    let grant = coordinator.drain_grants().remove(0);
    assert!((grant.max_offload_time - 0.04).abs() < 1e-12);
    assert!(grant.exec_time + 0.04 < 0.2);
}

#[test]
fn incompatible_configurations_are_rejected() {
    let cases = [
        SchedulerConfig { enable_forwarding: true, ..SchedulerConfig::default() },
        SchedulerConfig { objective: Objective::Accuracy, ..SchedulerConfig::default() },
        SchedulerConfig { scheme: SchemeType::FastSA, ..SchedulerConfig::default() },
        SchedulerConfig { fair_factor: 1.5, ..SchedulerConfig::default() },
        SchedulerConfig { cu_step: 0, ..SchedulerConfig::default() },
        SchedulerConfig { scheduling_interval_ms: 0, ..SchedulerConfig::default() },
    ];
    for config in cases {
        let err = config.clone().validated().unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)), "{:?} accepted", config);
    }
}

#[test]
fn scheme_names_parse_back() {
    for scheme in SchemeType::ALL {
        assert_eq!(scheme.name().parse::<SchemeType>(), Ok(scheme));
        assert!(!scheme.get_instance(Some(1)).name().is_empty());
    }
    assert!("greedy".parse::<SchemeType>().is_err());
}
