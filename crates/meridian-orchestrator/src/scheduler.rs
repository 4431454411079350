//! Adaptive cycle scheduler
//!
//! Picks the next cycle's type and duration. Under emergency stop only risk
//! assessment runs, at its base duration. Otherwise:
//!
//! ```text
//! deadline(t) = last_run(t) + W          (never run: last_run = -1)
//! at risk     = { t : deadline(t) - n ≤ |types| - 1 }
//! pick        = earliest deadline among at-risk types,
//!               else argmax (n - last_run(t)) × weight(t)
//! ```
//!
//! Ties break on cycle type declaration order. Every type therefore runs at
//! least once in any `W` consecutive non-emergency cycles.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use meridian_common::{Cycle, CycleType, RiskMode, RiskState, VolatilityClass, VolatilityThresholds};
use tracing::debug;

use crate::config::SchedulerSettings;

const TYPES: usize = CycleType::ALL.len();

pub struct CycleScheduler {
    thresholds: VolatilityThresholds,
    fairness_window: usize,
    weights: [f64; TYPES],
    last_run: [Option<u64>; TYPES],
    next_id: u64,
    log: VecDeque<Cycle>,
    log_limit: usize,
}

impl CycleScheduler {
    pub fn new(settings: &SchedulerSettings) -> Self {
        let mut weights = [1.0; TYPES];
        for (cycle_type, weight) in &settings.weights {
            weights[cycle_type.index()] = *weight;
        }
        Self {
            thresholds: settings.volatility,
            fairness_window: settings.fairness_window.max(TYPES),
            weights,
            last_run: [None; TYPES],
            next_id: 0,
            log: VecDeque::new(),
            log_limit: settings.log_limit.max(1),
        }
    }

    pub fn classify(&self, volatility_signal: f64) -> VolatilityClass {
        self.thresholds.classify(volatility_signal)
    }

    /// Most recent cycles started, oldest first, bounded by `log_limit`
    pub fn log(&self) -> &VecDeque<Cycle> {
        &self.log
    }

    pub fn cycles_started(&self) -> u64 {
        self.next_id
    }

    /// Select, start, and log the next cycle
    pub fn select_next_cycle(&mut self, risk: &RiskState, volatility_signal: f64, now: DateTime<Utc>) -> Cycle {
        let (cycle_type, factor) = if risk.mode == RiskMode::EmergencyStopped {
            (CycleType::RiskAssessment, 1.0)
        } else {
            let class = self.classify(volatility_signal);
            (self.pick_type(), class.duration_factor())
        };

        let id = self.next_id;
        let cycle = Cycle::start(id, cycle_type, now, factor);
        self.last_run[cycle_type.index()] = Some(id);
        self.next_id += 1;
        self.log.push_back(cycle.clone());
        while self.log.len() > self.log_limit {
            self.log.pop_front();
        }

        debug!(
            cycle_id = id,
            cycle_type = %cycle_type,
            planned_secs = cycle.planned_duration().as_secs_f64(),
            "Cycle selected"
        );
        cycle
    }

    fn deadline(&self, idx: usize) -> i64 {
        let last = self.last_run[idx].map(|l| l as i64).unwrap_or(-1);
        last + self.fairness_window as i64
    }

    fn pick_type(&self) -> CycleType {
        let n = self.next_id as i64;

        let urgent = CycleType::ALL
            .iter()
            .filter(|t| self.deadline(t.index()) - n <= TYPES as i64 - 1)
            .min_by_key(|t| (self.deadline(t.index()), t.index()));
        if let Some(t) = urgent {
            return *t;
        }

        let mut best = CycleType::ALL[0];
        let mut best_score = f64::NEG_INFINITY;
        for t in CycleType::ALL {
            let last = self.last_run[t.index()].map(|l| l as i64).unwrap_or(-1);
            let score = (n - last) as f64 * self.weights[t.index()];
            if score > best_score {
                best = t;
                best_score = score;
            }
        }
        best
    }
}
