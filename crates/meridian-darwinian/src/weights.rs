//! Per-kind strategy weights learned from realized outcomes
//!
//! ```text
//! w_k ← clamp(w_k × (1 − λ) + (avg_realized_k / 100) × λ, 0.1, 3.0)
//! ```
//!
//! The pool consults [`KindWeights::preference_order`] when choosing the kind
//! of a newly spawned agent.

use std::collections::BTreeMap;

use meridian_common::{AgentKind, AgentOutcome, VolatilityClass};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::fitness::calculator::FitnessCalculator;

const MIN_WEIGHT: f64 = 0.1;
const MAX_WEIGHT: f64 = 3.0;
const REVENUE_SCALE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindWeights {
    weights: BTreeMap<AgentKind, f64>,
    learning_rate: f64,
}

impl KindWeights {
    pub fn new(kinds: &[AgentKind]) -> Self {
        Self {
            weights: kinds.iter().map(|k| (*k, 1.0)).collect(),
            learning_rate: 0.1,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate.clamp(0.0, 1.0);
        self
    }

    /// Current weight, 0.0 for kinds not tracked
    pub fn weight(&self, kind: AgentKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn weights(&self) -> &BTreeMap<AgentKind, f64> {
        &self.weights
    }

    /// Fold one cycle's outcomes into the weights
    ///
    /// Failed executions count with zero realized value.
    pub fn update(&mut self, outcomes: &[AgentOutcome]) {
        let mut totals: BTreeMap<AgentKind, (f64, usize)> = BTreeMap::new();
        for outcome in outcomes {
            let value = if outcome.report.is_success() {
                FitnessCalculator::to_f64(outcome.report.realized_value)
            } else {
                0.0
            };
            let entry = totals.entry(outcome.kind).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }

        for (kind, (sum, count)) in totals {
            let Some(weight) = self.weights.get_mut(&kind) else {
                continue;
            };
            let avg = sum / count as f64;
            let updated = *weight * (1.0 - self.learning_rate) + (avg / REVENUE_SCALE) * self.learning_rate;
            *weight = updated.clamp(MIN_WEIGHT, MAX_WEIGHT);
        }
    }

    /// Weights adjusted for market conditions, without mutating state
    pub fn recommend(&self, volatility: VolatilityClass) -> BTreeMap<AgentKind, f64> {
        let mut adjusted = self.weights.clone();
        match volatility {
            VolatilityClass::High => {
                if let Some(w) = adjusted.get_mut(&AgentKind::Trading) {
                    *w *= 1.5;
                }
            }
            VolatilityClass::Low => {
                if let Some(w) = adjusted.get_mut(&AgentKind::YieldFarming) {
                    *w *= 1.3;
                }
            }
            VolatilityClass::Normal => {}
        }
        adjusted
    }

    /// Kinds ordered by recommended weight descending, then declaration order
    pub fn preference_order(&self, volatility: VolatilityClass) -> Vec<AgentKind> {
        let mut ranked: Vec<(AgentKind, f64)> = self.recommend(volatility).into_iter().collect();
        ranked.sort_by(|a, b| OrderedFloat(b.1).cmp(&OrderedFloat(a.1)).then(a.0.cmp(&b.0)));
        ranked.into_iter().map(|(k, _)| k).collect()
    }
}
