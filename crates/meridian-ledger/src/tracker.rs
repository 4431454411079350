//! Performance tracker
//!
//! Folds each completed cycle into the rolling revenue ledger and into
//! per-agent smoothed fitness. Owned by the coordinating loop; agents never
//! write here directly.

use chrono::{DateTime, Duration, Utc};
use meridian_common::{CycleResult, RevenueLedger};
use meridian_darwinian::{FitnessCalculator, FitnessSmoother};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::profit::{ExpenseEntry, ProfitSummary, RevenueEntry};
use crate::window::RollingWindow;
use crate::TrackerConfig;

/// Running statistics for one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Smoothed fitness
    pub fitness: f64,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub timeouts: u64,
    pub total_latency_ms: u64,
}

impl AgentStats {
    pub fn executions(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn success_rate(&self) -> f64 {
        match self.executions() {
            0 => 0.0,
            n => self.successes as f64 / n as f64,
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        match self.executions() {
            0 => 0.0,
            n => self.total_latency_ms as f64 / n as f64,
        }
    }
}

/// Fitness update for one agent produced by a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct AgentFitness {
    pub agent_id: Uuid,
    pub dna_id: Uuid,
    pub fitness: f64,
    pub consecutive_failures: u32,
}

/// Output of [`PerformanceTracker::record`]
#[derive(Debug, Clone)]
pub struct TrackerUpdate {
    pub ledger: RevenueLedger,
    pub agents: Vec<AgentFitness>,
}

pub struct PerformanceTracker {
    smoother: FitnessSmoother,
    failure_penalty: f64,
    ledger: RevenueLedger,
    revenue: RollingWindow<RevenueEntry>,
    expenses: RollingWindow<ExpenseEntry>,
    agents: HashMap<Uuid, AgentStats>,
    cycles_recorded: u64,
}

impl PerformanceTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        let span = Duration::hours(config.window_hours);
        Self {
            smoother: FitnessSmoother::new(config.smoothing),
            failure_penalty: config.failure_penalty,
            ledger: RevenueLedger::new(config.daily_target),
            revenue: RollingWindow::new(span),
            expenses: RollingWindow::new(span),
            agents: HashMap::new(),
            cycles_recorded: 0,
        }
    }

    pub fn ledger(&self) -> &RevenueLedger {
        &self.ledger
    }

    pub fn cycles_recorded(&self) -> u64 {
        self.cycles_recorded
    }

    pub fn agent(&self, agent_id: Uuid) -> Option<&AgentStats> {
        self.agents.get(&agent_id)
    }

    pub fn fitness(&self, agent_id: Uuid) -> f64 {
        self.agents.get(&agent_id).map(|s| s.fitness).unwrap_or(0.0)
    }

    /// Fold one cycle into the ledger and per-agent fitness
    #[instrument(skip(self, result), fields(cycle_id = result.cycle_id, outcomes = result.outcomes.len()))]
    pub fn record(&mut self, result: &CycleResult) -> TrackerUpdate {
        let at = result.completed_at;

        // attribute what agents reported, the rest of the feed total is unattributed
        let mut attributed = Decimal::ZERO;
        for outcome in result.outcomes.iter().filter(|o| o.report.is_success()) {
            let amount = outcome.report.realized_value;
            if amount.is_zero() {
                continue;
            }
            attributed += amount;
            self.revenue.push(
                at,
                RevenueEntry {
                    amount,
                    source: Some(outcome.kind),
                },
            );
        }
        let remainder = result.realized - attributed;
        if !remainder.is_zero() {
            self.revenue.push(at, RevenueEntry { amount: remainder, source: None });
        }

        self.refresh(at);

        let mut agents = Vec::with_capacity(result.outcomes.len());
        for outcome in &result.outcomes {
            let stats = self.agents.entry(outcome.agent_id).or_default();
            let observation = FitnessCalculator::observation(&outcome.report, self.failure_penalty);
            stats.fitness = self.smoother.smooth(stats.fitness, observation);
            stats.total_latency_ms += outcome.latency.as_millis() as u64;

            if outcome.report.is_success() {
                stats.successes += 1;
                stats.consecutive_failures = 0;
            } else {
                stats.failures += 1;
                stats.consecutive_failures += 1;
            }
            if outcome.timed_out {
                stats.timeouts += 1;
            }

            agents.push(AgentFitness {
                agent_id: outcome.agent_id,
                dna_id: outcome.dna_id,
                fitness: stats.fitness,
                consecutive_failures: stats.consecutive_failures,
            });
        }

        self.cycles_recorded += 1;
        debug!(
            realized = %self.ledger.realized,
            delta = %self.ledger.deficit_or_surplus(),
            tier = ?self.ledger.tier(),
            "Cycle recorded"
        );

        TrackerUpdate {
            ledger: self.ledger.clone(),
            agents,
        }
    }

    /// Drop entries that left the window and recompute the realized sum
    pub fn refresh(&mut self, now: DateTime<Utc>) -> &RevenueLedger {
        self.revenue.prune(now);
        self.expenses.prune(now);
        self.ledger.realized = self.revenue.iter().map(|e| e.amount).sum();
        self.ledger.updated_at = now;
        &self.ledger
    }

    pub fn record_expense(&mut self, amount: Decimal, category: impl Into<String>, at: DateTime<Utc>) {
        self.expenses.push(
            at,
            ExpenseEntry {
                amount,
                category: category.into(),
            },
        );
    }

    /// Drop a retired agent's statistics
    pub fn forget(&mut self, agent_id: Uuid) -> Option<AgentStats> {
        self.agents.remove(&agent_id)
    }

    pub fn profit_summary(&self) -> ProfitSummary {
        ProfitSummary::build(
            self.revenue.iter(),
            self.expenses.iter(),
            self.ledger.progress_percent(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::{AgentKind, AgentOutcome, CycleType, ExecutionReport};
    use rust_decimal_macros::dec;
    use std::time::Duration as StdDuration;

    fn outcome(agent_id: Uuid, report: ExecutionReport) -> AgentOutcome {
        AgentOutcome {
            agent_id,
            kind: AgentKind::Trading,
            dna_id: Uuid::nil(),
            report,
            latency: StdDuration::from_millis(20),
            timed_out: false,
        }
    }

    fn result(at: DateTime<Utc>, realized: Decimal, outcomes: Vec<AgentOutcome>) -> CycleResult {
        CycleResult {
            cycle_id: 1,
            cycle_type: CycleType::TradeExecution,
            completed_at: at,
            realized,
            outcomes,
        }
    }

    #[test]
    fn test_first_observation_folds_into_zero_prior() {
        let mut tracker = PerformanceTracker::new(&TrackerConfig::default());
        let agent = Uuid::now_v7();
        let update = tracker.record(&result(
            Utc::now(),
            dec!(10),
            vec![outcome(agent, ExecutionReport::success(dec!(10), dec!(0)))],
        ));
        assert!((update.agents[0].fitness - 3.0).abs() < 1e-9);
        assert_eq!(update.ledger.realized, dec!(10));
    }

    #[test]
    fn test_realized_is_trailing_24h_sum() {
        let mut tracker = PerformanceTracker::new(&TrackerConfig::default());
        let start = Utc::now();
        tracker.record(&result(start, dec!(150), vec![]));
        tracker.record(&result(start + Duration::hours(12), dec!(100), vec![]));
        assert_eq!(tracker.ledger().realized, dec!(250));

        tracker.record(&result(start + Duration::hours(24), dec!(10), vec![]));
        assert_eq!(tracker.ledger().realized, dec!(110));
    }

    #[test]
    fn test_failures_count_consecutively() {
        let mut tracker = PerformanceTracker::new(&TrackerConfig::default());
        let agent = Uuid::now_v7();
        let now = Utc::now();
        for _ in 0..2 {
            tracker.record(&result(now, dec!(0), vec![outcome(agent, ExecutionReport::failure())]));
        }
        assert_eq!(tracker.agent(agent).unwrap().consecutive_failures, 2);

        tracker.record(&result(
            now,
            dec!(1),
            vec![outcome(agent, ExecutionReport::success(dec!(1), dec!(0)))],
        ));
        let stats = tracker.agent(agent).unwrap();
        assert_eq!(stats.consecutive_failures, 0);
        assert!((stats.success_rate() - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.avg_latency_ms(), 20.0);
    }

    #[test]
    fn test_failure_penalty_lowers_fitness() {
        let config = TrackerConfig {
            failure_penalty: 10.0,
            ..Default::default()
        };
        let mut tracker = PerformanceTracker::new(&config);
        let agent = Uuid::now_v7();
        tracker.record(&result(Utc::now(), dec!(0), vec![outcome(agent, ExecutionReport::failure())]));
        assert!(tracker.fitness(agent) < 0.0);
    }

    #[test]
    fn test_profit_summary_attribution() {
        let mut tracker = PerformanceTracker::new(&TrackerConfig::default());
        let now = Utc::now();
        tracker.record(&result(
            now,
            dec!(120),
            vec![outcome(Uuid::now_v7(), ExecutionReport::success(dec!(100), dec!(0)))],
        ));
        tracker.record_expense(dec!(20), "compute", now);

        let summary = tracker.profit_summary();
        assert_eq!(summary.income, dec!(120));
        assert_eq!(summary.net, dec!(100));
        assert_eq!(summary.income_by_source["trading"], dec!(100));
        assert_eq!(summary.income_by_source["unattributed"], dec!(20));
        assert_eq!(summary.progress_percent, dec!(60));
    }

    #[test]
    fn test_forget_drops_stats() {
        let mut tracker = PerformanceTracker::new(&TrackerConfig::default());
        let agent = Uuid::now_v7();
        tracker.record(&result(Utc::now(), dec!(0), vec![outcome(agent, ExecutionReport::failure())]));
        assert!(tracker.forget(agent).is_some());
        assert!(tracker.agent(agent).is_none());
    }
}
