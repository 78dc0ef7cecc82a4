use std::time::{Duration, Instant};

use crate::domain::mec_system_model::scheme::candidate::CandidateArena;
use crate::domain::mec_system_model::scheme::generator::InstanceGenerator;
use crate::domain::mec_system_model::scheme::scheme_type::SchemeType;
use crate::domain::mec_system_model::scheme::selection::SelectedInstance;
use crate::domain::mec_system_model::scheme::snapshot::SchedulingSnapshot;
use crate::domain::mec_system_model::scheme::strategy::SelectionStrategy;

pub mod candidate;
pub mod generator;
pub mod scheme_type;
pub mod selection;
pub mod snapshot;
pub mod strategy;

/// Result of running a scheme on one snapshot.
#[derive(Debug)]
pub struct SchemeOutcome {
    pub candidates: CandidateArena,
    pub selected: Vec<SelectedInstance>,
    pub generation_time: Duration,
    pub selection_time: Duration,
}

/// Generator and strategy of the configured scheme.
#[derive(Debug)]
pub struct Scheme {
    scheme_type: SchemeType,
    generator: InstanceGenerator,
    strategy: Box<dyn SelectionStrategy>,
}

impl Scheme {
    pub fn new(scheme_type: SchemeType, seed: Option<u64>) -> Self {
        Scheme { scheme_type, generator: InstanceGenerator::new(scheme_type.generator_kind()), strategy: scheme_type.get_instance(seed) }
    }

    /// Replaces the selection half, keeping the generator of the scheme type.
    pub fn with_strategy(scheme_type: SchemeType, strategy: Box<dyn SelectionStrategy>) -> Self {
        Scheme { scheme_type, generator: InstanceGenerator::new(scheme_type.generator_kind()), strategy }
    }

    pub fn scheme_type(&self) -> SchemeType {
        self.scheme_type
    }

    pub fn run(&mut self, snapshot: &SchedulingSnapshot) -> SchemeOutcome {
        let start = Instant::now();
        let candidates = self.generator.generate(snapshot);
        let generation_time = start.elapsed();

        let start = Instant::now();
        let selected = self.strategy.select(snapshot, &candidates);
        let selection_time = start.elapsed();

        log::debug!(
            "Scheme {}: {} candidates, {} selected (generation {:?}, selection {:?}).",
            self.scheme_type,
            candidates.len(),
            selected.len(),
            generation_time,
            selection_time
        );
        SchemeOutcome { candidates, selected, generation_time, selection_time }
    }
}
