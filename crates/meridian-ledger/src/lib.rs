//! # Ledger
//!
//! Performance aggregation for the Meridian control core.
//!
//! ## Feedback Loop
//!
//! ```text
//! CycleResult ──► revenue window (trailing 24h) ──► RevenueLedger.realized ──► tier
//!             └─► per-agent EWMA fitness ──► pool retirement order, DNA fitness
//! ```

pub mod profit;
pub mod tracker;
pub mod window;

use meridian_common::{DEFAULT_DAILY_TARGET, DEFAULT_FITNESS_SMOOTHING, REVENUE_WINDOW_HOURS};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use profit::{ExpenseEntry, ProfitSummary, RevenueEntry};
pub use tracker::{AgentFitness, AgentStats, PerformanceTracker, TrackerUpdate};
pub use window::RollingWindow;

/// Tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Daily revenue target
    pub daily_target: Decimal,
    /// EWMA smoothing constant α in (0, 1]
    pub smoothing: f64,
    /// Subtracted from the observation of a failed execution
    pub failure_penalty: f64,
    /// Rolling window length
    pub window_hours: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            daily_target: Decimal::from(DEFAULT_DAILY_TARGET),
            smoothing: DEFAULT_FITNESS_SMOOTHING,
            failure_penalty: 0.0,
            window_hours: REVENUE_WINDOW_HOURS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use meridian_common::{CycleResult, CycleType};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn realized_only_counts_entries_inside_window(
            steps in prop::collection::vec((0i64..600, 0i64..1000), 1..40)
        ) {
            let mut tracker = PerformanceTracker::new(&TrackerConfig::default());
            let start = Utc::now();
            let mut elapsed = 0i64;
            let mut history = Vec::new();

            for (gap_minutes, amount) in steps {
                elapsed += gap_minutes;
                let at = start + Duration::minutes(elapsed);
                let realized = Decimal::from(amount);
                history.push((at, realized));
                tracker.record(&CycleResult {
                    cycle_id: history.len() as u64,
                    cycle_type: CycleType::MarketAnalysis,
                    completed_at: at,
                    realized,
                    outcomes: vec![],
                });

                let cutoff = at - Duration::hours(24);
                let expected: Decimal = history
                    .iter()
                    .filter(|(t, _)| *t > cutoff)
                    .map(|(_, r)| *r)
                    .sum();
                prop_assert_eq!(tracker.ledger().realized, expected);
            }
        }
    }
}
