//! Fitness calculation: fitness_t = α × observation + (1 − α) × fitness_{t−1}

use meridian_common::ExecutionReport;
use rust_decimal::Decimal;

pub struct FitnessCalculator;

impl FitnessCalculator {
    /// Per-cycle fitness observation from an execution report
    ///
    /// Successful cycles score their realized value. Failed cycles score any
    /// loss they realized minus the configured penalty.
    pub fn observation(report: &ExecutionReport, failure_penalty: f64) -> f64 {
        let realized = Self::to_f64(report.realized_value);
        if report.is_success() {
            realized
        } else {
            realized.min(0.0) - failure_penalty
        }
    }

    /// Decimal to f64, zero if unrepresentable
    pub fn to_f64(value: Decimal) -> f64 {
        value.try_into().unwrap_or(0.0)
    }
}

/// Exponentially weighted moving average over observations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessSmoother {
    alpha: f64,
}

impl FitnessSmoother {
    /// `alpha` is clamped into (0, 1]
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() { alpha.clamp(f64::EPSILON, 1.0) } else { 1.0 };
        Self { alpha }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn smooth(&self, previous: f64, observation: f64) -> f64 {
        self.alpha * observation + (1.0 - self.alpha) * previous
    }
}
