//! Cycle types, volatility classification, and the immutable cycle record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::VOLATILITY_ADJUSTMENT;

/// Kind of work a cycle performs
///
/// Declaration order is the tie-break order used by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleType {
    MarketAnalysis,
    RiskAssessment,
    TradeExecution,
    OpportunityScan,
    PortfolioReview,
}

impl CycleType {
    /// All cycle types in tie-break order
    pub const ALL: [CycleType; 5] = [
        CycleType::MarketAnalysis,
        CycleType::RiskAssessment,
        CycleType::TradeExecution,
        CycleType::OpportunityScan,
        CycleType::PortfolioReview,
    ];

    /// Position in [`CycleType::ALL`]
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Fixed base duration of the cycle type
    pub fn base_duration(&self) -> Duration {
        let secs = match self {
            CycleType::MarketAnalysis => 180,
            CycleType::RiskAssessment => 120,
            CycleType::TradeExecution => 90,
            CycleType::OpportunityScan => 240,
            CycleType::PortfolioReview => 300,
        };
        Duration::from_secs(secs)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleType::MarketAnalysis => "market_analysis",
            CycleType::RiskAssessment => "risk_assessment",
            CycleType::TradeExecution => "trade_execution",
            CycleType::OpportunityScan => "opportunity_scan",
            CycleType::PortfolioReview => "portfolio_review",
        }
    }
}

impl std::fmt::Display for CycleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market volatility bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityClass {
    High,
    Normal,
    Low,
}

impl VolatilityClass {
    /// Multiplier applied to a cycle's base duration
    ///
    /// Volatile markets run shorter cycles, calm markets longer ones.
    pub fn duration_factor(&self) -> f64 {
        match self {
            VolatilityClass::High => 1.0 - VOLATILITY_ADJUSTMENT,
            VolatilityClass::Normal => 1.0,
            VolatilityClass::Low => 1.0 + VOLATILITY_ADJUSTMENT,
        }
    }
}

/// Caller-supplied thresholds for classifying a volatility signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityThresholds {
    /// Signals strictly above this are high volatility
    pub high: f64,
    /// Signals strictly below this are low volatility
    pub low: f64,
}

impl Default for VolatilityThresholds {
    fn default() -> Self {
        Self { high: 0.5, low: 0.2 }
    }
}

impl VolatilityThresholds {
    pub fn classify(&self, signal: f64) -> VolatilityClass {
        if signal > self.high {
            VolatilityClass::High
        } else if signal < self.low {
            VolatilityClass::Low
        } else {
            VolatilityClass::Normal
        }
    }
}

/// A scheduled unit of work
///
/// Created by the scheduler at cycle start and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    id: u64,
    cycle_type: CycleType,
    started_at: DateTime<Utc>,
    planned_duration: Duration,
    volatility_factor: f64,
}

impl Cycle {
    /// Start a cycle; planned duration is the type's base duration times the factor
    pub fn start(
        id: u64,
        cycle_type: CycleType,
        started_at: DateTime<Utc>,
        volatility_factor: f64,
    ) -> Self {
        let base_ms = cycle_type.base_duration().as_millis() as f64;
        let planned_duration = Duration::from_millis((base_ms * volatility_factor).round() as u64);
        Self {
            id,
            cycle_type,
            started_at,
            planned_duration,
            volatility_factor,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cycle_type(&self) -> CycleType {
        self.cycle_type
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn planned_duration(&self) -> Duration {
        self.planned_duration
    }

    pub fn volatility_factor(&self) -> f64 {
        self.volatility_factor
    }

    /// Wall-clock deadline handed to agents
    pub fn deadline(&self) -> DateTime<Utc> {
        self.started_at
            + chrono::Duration::from_std(self.planned_duration)
                .unwrap_or_else(|_| chrono::Duration::zero())
    }
}
