//! Risk state shared between the gate, the pool, and the scheduler

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Safety mode decided by the risk gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMode {
    Normal,
    /// No new spawns; existing agents continue
    Throttled,
    /// Terminal until explicitly acknowledged
    EmergencyStopped,
}

impl RiskMode {
    /// Whether the pool may spawn new agents
    #[inline]
    pub fn allows_spawning(&self) -> bool {
        matches!(self, RiskMode::Normal)
    }

    /// Numeric code for gauges
    pub fn code(&self) -> i64 {
        match self {
            RiskMode::Normal => 0,
            RiskMode::Throttled => 1,
            RiskMode::EmergencyStopped => 2,
        }
    }
}

impl std::fmt::Display for RiskMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskMode::Normal => write!(f, "normal"),
            RiskMode::Throttled => write!(f, "throttled"),
            RiskMode::EmergencyStopped => write!(f, "emergency_stopped"),
        }
    }
}

/// Current exposure and the thresholds it is judged against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// Aggregate open-position risk (monetary units)
    pub exposure: Decimal,
    pub threshold_warn: Decimal,
    pub threshold_halt: Decimal,
    pub mode: RiskMode,
}

impl RiskState {
    pub fn new(threshold_warn: Decimal, threshold_halt: Decimal) -> Self {
        Self {
            exposure: Decimal::ZERO,
            threshold_warn,
            threshold_halt,
            mode: RiskMode::Normal,
        }
    }

    #[inline]
    pub fn is_emergency_stopped(&self) -> bool {
        self.mode == RiskMode::EmergencyStopped
    }
}
