use std::fmt;
use std::str::FromStr;

use crate::api::scheduler_config_dto::SchedulerConfigDto;
use crate::domain::mec_system_model::scheme::scheme_type::SchemeType;
use crate::error::{ConversionError, Error, Result};

/// What a granted job is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Energy saved per second compared to local execution.
    Energy,
    /// Accuracy gained over the vehicle's local model.
    Accuracy,
}

impl FromStr for Objective {
    type Err = ConversionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "energy" => Ok(Objective::Energy),
            "accuracy" => Ok(Objective::Accuracy),
            _ => Err(ConversionError::UnknownObjective(s.to_string())),
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::Energy => write!(f, "energy"),
            Objective::Accuracy => write!(f, "accuracy"),
        }
    }
}

/// Validated coordinator configuration. Intervals are in ms, delays in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub scheme: SchemeType,
    pub objective: Objective,
    pub scheduling_interval_ms: i64,
    /// Lead time before a cycle at which expiring services are stopped.
    pub app_stop_interval_ms: i64,
    pub grant_ack_interval_ms: i64,
    pub conn_outdate_interval_ms: i64,
    pub cu_step: i64,
    pub rb_step: i64,
    pub offload_overhead_s: f64,
    pub slot_duration_s: f64,
    /// Shift grant timestamps by the time the scheme took to decide.
    pub count_exe_time: bool,
    pub reschedule_all: bool,
    pub enable_forwarding: bool,
    pub max_hops: u32,
    /// Share of a node's free resources a single job may claim.
    pub fair_factor: f64,
    /// Backhaul rate in bytes/s.
    pub virtual_link_rate: f64,
    pub lp_time_limit_ms: u64,
    pub seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            scheme: SchemeType::Greedy,
            objective: Objective::Energy,
            scheduling_interval_ms: 1000,
            app_stop_interval_ms: 100,
            grant_ack_interval_ms: 200,
            conn_outdate_interval_ms: 2000,
            cu_step: 1,
            rb_step: 1,
            offload_overhead_s: 0.0,
            slot_duration_s: 0.001,
            count_exe_time: false,
            reschedule_all: false,
            enable_forwarding: false,
            max_hops: 1,
            fair_factor: 1.0,
            virtual_link_rate: 1.25e8,
            lp_time_limit_ms: 2000,
            seed: None,
        }
    }
}

impl SchedulerConfig {
    /// Checks the ranges and the scheme/objective pairing and clamps the app stop lead time.
    pub fn validated(mut self) -> Result<Self> {
        if self.scheduling_interval_ms <= 0 {
            return Err(Error::ConfigError(format!("schedulingIntervalMs must be positive, got {}", self.scheduling_interval_ms)));
        }
        if self.cu_step <= 0 || self.rb_step <= 0 {
            return Err(Error::ConfigError(format!(
                "cuStep and rbStep must be positive, got {} and {}",
                self.cu_step, self.rb_step
            )));
        }
        if !(0.0..=1.0).contains(&self.fair_factor) {
            return Err(Error::ConfigError(format!("fairFactor must be in [0, 1], got {}", self.fair_factor)));
        }
        if self.slot_duration_s <= 0.0 {
            return Err(Error::ConfigError(format!("slotDurationS must be positive, got {}", self.slot_duration_s)));
        }
        if self.enable_forwarding && self.virtual_link_rate <= 0.0 {
            return Err(Error::ConfigError(format!("virtualLinkRate must be positive, got {}", self.virtual_link_rate)));
        }
        if self.scheme.objective() != self.objective {
            return Err(Error::ConfigError(format!(
                "scheme {} optimizes {} but the objective is {}",
                self.scheme,
                self.scheme.objective(),
                self.objective
            )));
        }
        if self.enable_forwarding && !self.scheme.supports_forwarding() {
            return Err(Error::ConfigError(format!("scheme {} cannot forward jobs, disable enableForwarding", self.scheme)));
        }

        let half_interval = self.scheduling_interval_ms / 2;
        if self.app_stop_interval_ms > half_interval || self.app_stop_interval_ms < 0 {
            log::warn!(
                "SchedulerConfig: appStopIntervalMs {} clamped to {} ms.",
                self.app_stop_interval_ms,
                half_interval
            );
            self.app_stop_interval_ms = half_interval;
        }
        Ok(self)
    }

    /// Silence after which a node's resource figure is no longer trusted.
    pub fn node_silence_ms(&self) -> i64 {
        self.grant_ack_interval_ms * 2
    }
}

impl TryFrom<SchedulerConfigDto> for SchedulerConfig {
    type Error = Error;

    fn try_from(dto: SchedulerConfigDto) -> Result<Self> {
        let defaults = SchedulerConfig::default();
        let config = SchedulerConfig {
            scheme: dto.scheme.parse::<SchemeType>().map_err(|e| Error::ConfigError(e.to_string()))?,
            objective: dto.objective.parse::<Objective>().map_err(|e| Error::ConfigError(e.to_string()))?,
            scheduling_interval_ms: dto.scheduling_interval_ms,
            app_stop_interval_ms: dto.app_stop_interval_ms,
            grant_ack_interval_ms: dto.grant_ack_interval_ms,
            conn_outdate_interval_ms: dto.conn_outdate_interval_ms,
            cu_step: dto.cu_step,
            rb_step: dto.rb_step,
            offload_overhead_s: dto.offload_overhead_s,
            slot_duration_s: dto.slot_duration_s,
            count_exe_time: dto.count_exe_time,
            reschedule_all: dto.reschedule_all,
            enable_forwarding: dto.enable_forwarding,
            max_hops: dto.max_hops.unwrap_or(defaults.max_hops),
            fair_factor: dto.fair_factor.unwrap_or(defaults.fair_factor),
            virtual_link_rate: dto.virtual_link_rate.unwrap_or(defaults.virtual_link_rate),
            lp_time_limit_ms: dto.lp_time_limit_ms.unwrap_or(defaults.lp_time_limit_ms),
            seed: dto.seed,
        };
        config.validated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(scheme: &str, objective: &str) -> SchedulerConfigDto {
        serde_json::from_value(serde_json::json!({
            "scheme": scheme,
            "objective": objective,
            "schedulingIntervalMs": 1000,
            "appStopIntervalMs": 800,
            "grantAckIntervalMs": 200,
            "connOutdateIntervalMs": 2000,
            "cuStep": 1,
            "rbStep": 1,
            "offloadOverheadS": 0.01,
            "slotDurationS": 0.001
        }))
        .unwrap()
    }

    #[test]
    fn app_stop_interval_is_clamped_to_half_the_interval() {
        let config = SchedulerConfig::try_from(dto("Greedy", "energy")).unwrap();
        assert_eq!(config.app_stop_interval_ms, 500);
        assert_eq!(config.lp_time_limit_ms, 2000);
    }

    #[test]
    fn scheme_must_match_objective() {
        let err = SchedulerConfig::try_from(dto("FastSAND", "energy")).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn unknown_names_are_config_errors() {
        let err = SchedulerConfig::try_from(dto("Magic", "energy")).unwrap_err();
        assert!(matches!(&err, Error::ConfigError(msg) if msg.contains("Magic")));
        assert!(matches!(SchedulerConfig::try_from(dto("Greedy", "latency")), Err(Error::ConfigError(_))));
        assert_eq!("Magic".parse::<SchemeType>(), Err(ConversionError::UnknownSchemeType("Magic".to_string())));
    }

    #[test]
    fn direct_schemes_reject_forwarding() {
        let config = SchedulerConfig { enable_forwarding: true, ..SchedulerConfig::default() };
        assert!(config.validated().is_err());

        let config = SchedulerConfig { enable_forwarding: true, scheme: SchemeType::FwdGreedy, ..SchedulerConfig::default() };
        assert!(config.validated().is_ok());
    }

    #[test]
    fn fair_factor_out_of_range_is_rejected() {
        let config = SchedulerConfig { fair_factor: 1.5, ..SchedulerConfig::default() };
        assert!(config.validated().is_err());
    }
}
