use std::fmt;
use std::str::FromStr;

use crate::domain::mec_system_model::scheduler_config::Objective;
use crate::domain::mec_system_model::scheme::generator::GeneratorKind;
use crate::domain::mec_system_model::scheme::strategy::SelectionStrategy;
use crate::domain::mec_system_model::scheme::strategy::categorized::CategorizedLocalRatio;
use crate::domain::mec_system_model::scheme::strategy::fast_lr::FastLrStrategy;
use crate::domain::mec_system_model::scheme::strategy::game_theory::GameTheoryStrategy;
use crate::domain::mec_system_model::scheme::strategy::graph_match::GraphMatchStrategy;
use crate::domain::mec_system_model::scheme::strategy::greedy::GreedyStrategy;
use crate::domain::mec_system_model::scheme::strategy::iterative::IterativeStrategy;
use crate::domain::mec_system_model::scheme::strategy::sa_round::SaRoundStrategy;
use crate::error::ConversionError;

/// Configured scheduling scheme: an instance generator paired with a selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeType {
    Greedy,
    FastLR,
    GameTheory,
    Iterative,
    SARound,
    FwdGreedy,
    FwdGameTheory,
    FwdQuickLR,
    FwdGraphMatch,
    AccuracyGreedy,
    AccuracyGameTheory,
    FastSAND,
    FastSANF,
    FastSA,
    AccuracyGraphMatch,
}

impl SchemeType {
    pub const ALL: [SchemeType; 15] = [
        SchemeType::Greedy,
        SchemeType::FastLR,
        SchemeType::GameTheory,
        SchemeType::Iterative,
        SchemeType::SARound,
        SchemeType::FwdGreedy,
        SchemeType::FwdGameTheory,
        SchemeType::FwdQuickLR,
        SchemeType::FwdGraphMatch,
        SchemeType::AccuracyGreedy,
        SchemeType::AccuracyGameTheory,
        SchemeType::FastSAND,
        SchemeType::FastSANF,
        SchemeType::FastSA,
        SchemeType::AccuracyGraphMatch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SchemeType::Greedy => "Greedy",
            SchemeType::FastLR => "FastLR",
            SchemeType::GameTheory => "GameTheory",
            SchemeType::Iterative => "Iterative",
            SchemeType::SARound => "SARound",
            SchemeType::FwdGreedy => "FwdGreedy",
            SchemeType::FwdGameTheory => "FwdGameTheory",
            SchemeType::FwdQuickLR => "FwdQuickLR",
            SchemeType::FwdGraphMatch => "FwdGraphMatch",
            SchemeType::AccuracyGreedy => "AccuracyGreedy",
            SchemeType::AccuracyGameTheory => "AccuracyGameTheory",
            SchemeType::FastSAND => "FastSAND",
            SchemeType::FastSANF => "FastSANF",
            SchemeType::FastSA => "FastSA",
            SchemeType::AccuracyGraphMatch => "AccuracyGraphMatch",
        }
    }

    pub fn objective(&self) -> Objective {
        match self.generator_kind() {
            GeneratorKind::Direct | GeneratorKind::Forwarding => Objective::Energy,
            GeneratorKind::AccuracyForwarding | GeneratorKind::AccuracyDirect => Objective::Accuracy,
        }
    }

    /// Whether the scheme can route a job to a processing node other than the one it offloads to.
    pub fn supports_forwarding(&self) -> bool {
        matches!(self.generator_kind(), GeneratorKind::Forwarding | GeneratorKind::AccuracyForwarding)
    }

    pub fn generator_kind(&self) -> GeneratorKind {
        match self {
            SchemeType::Greedy | SchemeType::FastLR | SchemeType::GameTheory | SchemeType::Iterative | SchemeType::SARound => {
                GeneratorKind::Direct
            }
            SchemeType::FwdGreedy | SchemeType::FwdGameTheory | SchemeType::FwdQuickLR | SchemeType::FwdGraphMatch => {
                GeneratorKind::Forwarding
            }
            SchemeType::AccuracyGreedy
            | SchemeType::AccuracyGameTheory
            | SchemeType::FastSAND
            | SchemeType::FastSA
            | SchemeType::AccuracyGraphMatch => GeneratorKind::AccuracyForwarding,
            SchemeType::FastSANF => GeneratorKind::AccuracyDirect,
        }
    }

    // Factory for the selection half of the scheme
    pub fn get_instance(&self, seed: Option<u64>) -> Box<dyn SelectionStrategy> {
        match self {
            SchemeType::Greedy | SchemeType::FwdGreedy | SchemeType::AccuracyGreedy => Box::new(GreedyStrategy::new()),
            SchemeType::GameTheory | SchemeType::FwdGameTheory | SchemeType::AccuracyGameTheory => {
                Box::new(GameTheoryStrategy::new())
            }
            SchemeType::FastLR => Box::new(FastLrStrategy::new()),
            SchemeType::Iterative => Box::new(IterativeStrategy::new(seed)),
            SchemeType::SARound => Box::new(SaRoundStrategy::new()),
            SchemeType::FwdQuickLR => Box::new(CategorizedLocalRatio::quick_lr()),
            SchemeType::FastSAND => Box::new(CategorizedLocalRatio::fast_sand()),
            SchemeType::FastSANF => Box::new(CategorizedLocalRatio::fast_sanf()),
            SchemeType::FastSA => Box::new(CategorizedLocalRatio::fast_sa()),
            SchemeType::FwdGraphMatch | SchemeType::AccuracyGraphMatch => Box::new(GraphMatchStrategy::new()),
        }
    }
}

impl FromStr for SchemeType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SchemeType::ALL
            .iter()
            .find(|scheme| scheme.name() == s)
            .copied()
            .ok_or_else(|| ConversionError::UnknownSchemeType(s.to_string()))
    }
}

impl fmt::Display for SchemeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
