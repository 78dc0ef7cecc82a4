use crate::domain::mec_system_model::scheme::candidate::{CandidateArena, CandidateInstance};
use crate::domain::mec_system_model::scheme::snapshot::{JobIdx, NodeIdx, SchedulingSnapshot};

/// How candidate instances are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// Energy objective, the job runs on the node it is offloaded to.
    Direct,
    /// Energy objective, the job may be forwarded to any reachable node.
    Forwarding,
    /// Accuracy objective over the service catalog, forwarding allowed.
    AccuracyForwarding,
    /// Accuracy objective over the service catalog, no forwarding.
    AccuracyDirect,
}

/// Sweeps bandwidth and compute amounts for every pending job and keeps the
/// combinations that meet the job's deadline with positive utility.
#[derive(Debug, Clone, Copy)]
pub struct InstanceGenerator {
    kind: GeneratorKind,
}

impl InstanceGenerator {
    pub fn new(kind: GeneratorKind) -> Self {
        InstanceGenerator { kind }
    }

    pub fn kind(&self) -> GeneratorKind {
        self.kind
    }

    pub fn generate(&self, snapshot: &SchedulingSnapshot) -> CandidateArena {
        let mut arena = CandidateArena::new(snapshot.jobs().len(), snapshot.nodes().len());

        for (job_idx, job) in snapshot.jobs().iter().enumerate() {
            if job.period_s <= 0.0 {
                continue;
            }
            let job = JobIdx(job_idx);
            for (offload_node, rate) in snapshot.job(job).links.clone() {
                if rate <= 0.0 {
                    continue;
                }
                match self.kind {
                    GeneratorKind::Direct => Self::sweep_direct(snapshot, &mut arena, job, offload_node, rate),
                    GeneratorKind::Forwarding => Self::sweep_forwarding(snapshot, &mut arena, job, offload_node, rate),
                    GeneratorKind::AccuracyForwarding => {
                        Self::sweep_accuracy(snapshot, &mut arena, job, offload_node, rate, true)
                    }
                    GeneratorKind::AccuracyDirect => Self::sweep_accuracy(snapshot, &mut arena, job, offload_node, rate, false),
                }
            }
        }

        log::debug!("InstanceGenerator: {} candidates for {} jobs ({:?}).", arena.len(), snapshot.jobs().len(), self.kind);
        arena
    }

    fn sweep_direct(snapshot: &SchedulingSnapshot, arena: &mut CandidateArena, job: JobIdx, node: NodeIdx, rate: f64) {
        let params = &snapshot.params;
        let view = snapshot.job(job);
        let period = view.period_s;
        let overhead = params.offload_overhead_s;
        let service = view.service.clone();
        let free = snapshot.node(node);

        let mut compute = free.free_compute;
        while compute > 0 {
            let Some(exec_delay) = snapshot.exec_delay(&service, node, compute) else {
                log::debug!("InstanceGenerator: no profile for {} on {}.", service, free.device_type);
                return;
            };
            if exec_delay + overhead >= period {
                break;
            }

            let mut bandwidth = free.free_bandwidth;
            while bandwidth > 0 {
                let offload_delay = snapshot.offload_delay(job, rate, bandwidth);
                if offload_delay + exec_delay + overhead > period {
                    break;
                }
                if let Some(utility) = snapshot.utility(job, &service, offload_delay).filter(|u| *u > 0.0) {
                    arena.push(CandidateInstance {
                        job,
                        offload_node: node,
                        process_node: node,
                        bandwidth,
                        compute,
                        utility,
                        max_offload_time: period - exec_delay - overhead,
                        exec_delay,
                        service: service.clone(),
                    });
                }
                bandwidth -= params.rb_step;
            }
            compute -= params.cu_step;
        }
    }

    fn sweep_forwarding(snapshot: &SchedulingSnapshot, arena: &mut CandidateArena, job: JobIdx, offload_node: NodeIdx, rate: f64) {
        let params = &snapshot.params;
        let view = snapshot.job(job);
        let period = view.period_s;
        let overhead = params.offload_overhead_s;
        let service = view.service.clone();

        let max_bandwidth = (snapshot.node(offload_node).free_bandwidth as f64 * params.fair_factor).floor() as i64;
        let mut bandwidth = max_bandwidth;
        while bandwidth > 0 {
            let offload_delay = snapshot.offload_delay(job, rate, bandwidth);
            if offload_delay + overhead > period {
                break;
            }
            let Some(utility) = snapshot.utility(job, &service, offload_delay).filter(|u| *u > 0.0) else {
                bandwidth -= params.rb_step;
                continue;
            };

            for &(process_node, hops) in snapshot.reachable_from(offload_node) {
                let forward_delay = snapshot.forwarding_delay(job, hops);
                if forward_delay + offload_delay + overhead > period {
                    continue;
                }
                let max_compute = (snapshot.node(process_node).free_compute as f64 * params.fair_factor).floor() as i64;
                let mut compute = max_compute;
                while compute > 0 {
                    let Some(exec_delay) = snapshot.exec_delay(&service, process_node, compute) else {
                        break;
                    };
                    if offload_delay + forward_delay + exec_delay + overhead > period {
                        break;
                    }
                    arena.push(CandidateInstance {
                        job,
                        offload_node,
                        process_node,
                        bandwidth,
                        compute,
                        utility,
                        max_offload_time: period - forward_delay - exec_delay - overhead,
                        exec_delay,
                        service: service.clone(),
                    });
                    compute -= params.cu_step;
                }
            }
            bandwidth -= params.rb_step;
        }
    }

    fn sweep_accuracy(
        snapshot: &SchedulingSnapshot,
        arena: &mut CandidateArena,
        job: JobIdx,
        offload_node: NodeIdx,
        rate: f64,
        forwarding: bool,
    ) {
        let params = &snapshot.params;
        let period = snapshot.job(job).period_s;
        let overhead = params.offload_overhead_s;
        let catalog = snapshot.profile().service_catalog();

        let max_bandwidth = (snapshot.node(offload_node).free_bandwidth as f64 * params.fair_factor).floor() as i64;
        if max_bandwidth <= 0 {
            return;
        }
        let targets: Vec<(NodeIdx, u32)> =
            if forwarding { snapshot.reachable_from(offload_node).to_vec() } else { vec![(offload_node, 0)] };

        for (process_node, hops) in targets {
            let max_compute = (snapshot.node(process_node).free_compute as f64 * params.fair_factor).floor() as i64;
            if max_compute <= 0 {
                continue;
            }
            let forward_delay = snapshot.forwarding_delay(job, hops);

            // sweep the dimension with fewer steps, derive the other one from the remaining budget
            if max_bandwidth / params.rb_step < max_compute / params.cu_step {
                let mut bandwidth = max_bandwidth;
                while bandwidth > 0 {
                    let offload_delay = snapshot.offload_delay(job, rate, bandwidth);
                    if forward_delay + offload_delay + overhead >= period {
                        break;
                    }
                    let budget = period - offload_delay - forward_delay - overhead;
                    for service in &catalog {
                        let Some(utility) = snapshot.utility(job, service, offload_delay).filter(|u| *u > 0.0) else {
                            continue;
                        };
                        let Some(compute) = snapshot.min_compute(service, process_node, budget).map(|c| c.max(1)) else {
                            continue;
                        };
                        if compute > max_compute {
                            continue;
                        }
                        let Some(exec_delay) = snapshot.exec_delay(service, process_node, compute) else {
                            continue;
                        };
                        arena.push(CandidateInstance {
                            job,
                            offload_node,
                            process_node,
                            bandwidth,
                            compute,
                            utility,
                            max_offload_time: period - forward_delay - exec_delay - overhead,
                            exec_delay,
                            service: service.clone(),
                        });
                    }
                    bandwidth -= params.rb_step;
                }
            } else {
                for service in &catalog {
                    let Some(utility) = snapshot.utility(job, service, 0.0).filter(|u| *u > 0.0) else {
                        continue;
                    };
                    let mut compute = max_compute;
                    while compute > 0 {
                        let Some(exec_delay) = snapshot.exec_delay(service, process_node, compute) else {
                            break;
                        };
                        if exec_delay + forward_delay + overhead >= period {
                            break;
                        }
                        let offload_budget = period - exec_delay - forward_delay - overhead;
                        let Some(bandwidth) = snapshot.min_bandwidth(job, rate, offload_budget).map(|b| b.max(1)) else {
                            break;
                        };
                        if bandwidth > max_bandwidth {
                            break;
                        }
                        arena.push(CandidateInstance {
                            job,
                            offload_node,
                            process_node,
                            bandwidth,
                            compute,
                            utility,
                            max_offload_time: offload_budget,
                            exec_delay,
                            service: service.clone(),
                        });
                        compute -= params.cu_step;
                    }
                }
            }
        }
    }
}
