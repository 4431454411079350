//! # Risk
//!
//! Exposure gating for the Meridian control core.
//!
//! ```text
//!                 warn                halt
//!   normal ────────┼──── throttled ────┼──── emergency_stopped (sticky)
//! ```
//!
//! Throttled blocks new spawns. Emergency stop retires every agent and
//! restricts the scheduler to risk assessment until acknowledged.

pub mod gate;
pub mod violations;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use gate::RiskGate;
pub use violations::{Severity, Violation, ViolationLog};

/// Risk gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub threshold_warn: Decimal,
    pub threshold_halt: Decimal,
    /// Emergency stop once rolling realized revenue reaches `-max_daily_loss`
    pub max_daily_loss: Option<Decimal>,
    /// Violations kept in memory
    pub violation_capacity: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            threshold_warn: Decimal::from(500),
            threshold_halt: Decimal::from(1000),
            max_daily_loss: None,
            violation_capacity: 1000,
        }
    }
}

impl RiskConfig {
    pub fn is_valid(&self) -> bool {
        self.threshold_warn >= Decimal::ZERO
            && self.threshold_warn < self.threshold_halt
            && self.max_daily_loss.map_or(true, |l| l >= Decimal::ZERO)
    }
}
