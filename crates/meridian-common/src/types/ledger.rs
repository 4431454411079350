//! Revenue ledger and scaling tiers
//!
//! The ledger is owned by the performance tracker; everything else reads
//! copies of it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Agent-count bracket derived from realized daily revenue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueTier {
    /// < 200 / day
    Seed,
    /// 200 - 499
    Growth,
    /// 500 - 999
    Expansion,
    /// 1000 - 1999
    Scale,
    /// >= 2000
    Enterprise,
}

impl RevenueTier {
    /// Step function over realized daily revenue
    pub fn from_realized(realized: Decimal) -> Self {
        if realized < Decimal::from(200) {
            RevenueTier::Seed
        } else if realized < Decimal::from(500) {
            RevenueTier::Growth
        } else if realized < Decimal::from(1000) {
            RevenueTier::Expansion
        } else if realized < Decimal::from(2000) {
            RevenueTier::Scale
        } else {
            RevenueTier::Enterprise
        }
    }

    /// Target agent count for the tier
    pub fn target_agents(&self) -> usize {
        match self {
            RevenueTier::Seed => 1,
            RevenueTier::Growth => 3,
            RevenueTier::Expansion => 5,
            RevenueTier::Scale => 10,
            RevenueTier::Enterprise => 20,
        }
    }
}

/// Rolling revenue position against the daily target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueLedger {
    /// Daily monetary target
    pub target: Decimal,
    /// Trailing 24h realized revenue
    pub realized: Decimal,
    /// Last time the tracker folded a cycle into the ledger
    pub updated_at: DateTime<Utc>,
}

impl RevenueLedger {
    pub fn new(target: Decimal) -> Self {
        Self {
            target,
            realized: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    /// Ledger with a preset realized amount
    pub fn with_realized(target: Decimal, realized: Decimal) -> Self {
        let mut ledger = Self::new(target);
        ledger.realized = realized;
        ledger
    }

    /// realized - target; negative is a deficit
    #[inline]
    pub fn deficit_or_surplus(&self) -> Decimal {
        self.realized - self.target
    }

    #[inline]
    pub fn tier(&self) -> RevenueTier {
        RevenueTier::from_realized(self.realized)
    }

    /// Percentage of the daily target achieved
    pub fn progress_percent(&self) -> Decimal {
        if self.target.is_zero() {
            return Decimal::ZERO;
        }
        (self.realized / self.target) * Decimal::ONE_HUNDRED
    }
}

impl std::fmt::Display for RevenueLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RevenueLedger(realized={}, target={}, delta={})",
            self.realized,
            self.target,
            self.deficit_or_surplus()
        )
    }
}
