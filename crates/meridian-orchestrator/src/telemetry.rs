//! Prometheus metrics for the control loop

use meridian_common::{CycleResult, CycleSnapshot};
use prometheus::{Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::pool::ReconcileReport;

pub struct CycleMetrics {
    registry: Registry,
    pub cycles_total: IntCounterVec,
    pub realized: Gauge,
    pub deficit: Gauge,
    pub exposure: Gauge,
    pub agents_active: IntGauge,
    pub risk_mode: IntGauge,
    pub best_fitness: Gauge,
    pub generation: IntGauge,
    pub agent_failures: IntCounter,
    pub agent_timeouts: IntCounter,
    pub spawns_total: IntCounter,
    pub retirements_total: IntCounter,
    pub spawns_deferred: IntCounter,
    pub agent_latency_seconds: Histogram,
}

impl CycleMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let metrics = Self {
            registry: Registry::new(),
            cycles_total: IntCounterVec::new(
                Opts::new("meridian_cycles_total", "Cycles completed by type"),
                &["type"],
            )?,
            realized: Gauge::new("meridian_realized_revenue", "Realized revenue over the rolling window")?,
            deficit: Gauge::new("meridian_revenue_deficit", "Target minus realized revenue")?,
            exposure: Gauge::new("meridian_exposure", "Effective aggregate exposure")?,
            agents_active: IntGauge::new("meridian_agents_active", "Agents counting toward the target")?,
            risk_mode: IntGauge::new("meridian_risk_mode", "0 normal, 1 throttled, 2 emergency stopped")?,
            best_fitness: Gauge::new("meridian_best_fitness", "Best strategy fitness in the population")?,
            generation: IntGauge::new("meridian_generation", "Current evolution generation")?,
            agent_failures: IntCounter::new("meridian_agent_failures_total", "Failed agent executions")?,
            agent_timeouts: IntCounter::new("meridian_agent_timeouts_total", "Agent executions cancelled at deadline")?,
            spawns_total: IntCounter::new("meridian_spawns_total", "Agents spawned")?,
            retirements_total: IntCounter::new("meridian_retirements_total", "Agents retired")?,
            spawns_deferred: IntCounter::new("meridian_spawns_deferred_total", "Spawns deferred or blocked")?,
            agent_latency_seconds: Histogram::with_opts(
                HistogramOpts::new("meridian_agent_latency_seconds", "Agent execution latency")
                    .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
            )?,
        };
        metrics.register()?;
        Ok(metrics)
    }

    fn register(&self) -> prometheus::Result<()> {
        self.registry.register(Box::new(self.cycles_total.clone()))?;
        self.registry.register(Box::new(self.realized.clone()))?;
        self.registry.register(Box::new(self.deficit.clone()))?;
        self.registry.register(Box::new(self.exposure.clone()))?;
        self.registry.register(Box::new(self.agents_active.clone()))?;
        self.registry.register(Box::new(self.risk_mode.clone()))?;
        self.registry.register(Box::new(self.best_fitness.clone()))?;
        self.registry.register(Box::new(self.generation.clone()))?;
        self.registry.register(Box::new(self.agent_failures.clone()))?;
        self.registry.register(Box::new(self.agent_timeouts.clone()))?;
        self.registry.register(Box::new(self.spawns_total.clone()))?;
        self.registry.register(Box::new(self.retirements_total.clone()))?;
        self.registry.register(Box::new(self.spawns_deferred.clone()))?;
        self.registry.register(Box::new(self.agent_latency_seconds.clone()))?;
        Ok(())
    }

    pub fn observe_reconcile(&self, report: &ReconcileReport) {
        self.spawns_total.inc_by(report.spawn_count() as u64);
        self.retirements_total.inc_by(report.retired().count() as u64);
        self.spawns_deferred.inc_by(report.deferred_count() as u64);
    }

    pub fn observe_result(&self, result: &CycleResult) {
        for outcome in &result.outcomes {
            self.agent_latency_seconds.observe(outcome.latency.as_secs_f64());
            if outcome.timed_out {
                self.agent_timeouts.inc();
            }
        }
        self.agent_failures.inc_by(result.failures() as u64);
    }

    pub fn observe_snapshot(&self, snapshot: &CycleSnapshot, exposure: Decimal) {
        self.cycles_total
            .with_label_values(&[snapshot.cycle_type.as_str()])
            .inc();
        self.realized.set(snapshot.realized.to_f64().unwrap_or(0.0));
        self.deficit.set(snapshot.deficit.to_f64().unwrap_or(0.0));
        self.exposure.set(exposure.to_f64().unwrap_or(0.0));
        self.agents_active.set(snapshot.agents_active as i64);
        self.risk_mode.set(snapshot.risk_mode.code());
        self.best_fitness.set(snapshot.best_fitness);
        self.generation.set(snapshot.generation as i64);
    }

    /// Text exposition format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if TextEncoder::new().encode(&self.registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::pool::{PoolAction, RetireReason};
    use meridian_common::{AgentKind, CycleType, RiskMode};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_snapshot_is_rendered() {
        let metrics = CycleMetrics::new().unwrap();
        metrics.observe_snapshot(
            &CycleSnapshot {
                cycle_id: 3,
                cycle_type: CycleType::TradeExecution,
                duration_secs: 42.0,
                agents_active: 4,
                realized: dec!(150),
                deficit: dec!(50),
                risk_mode: RiskMode::Throttled,
                best_fitness: 12.5,
                generation: 2,
                completed_at: Utc::now(),
            },
            dec!(75),
        );

        let text = metrics.render();
        assert!(text.contains("meridian_cycles_total{type=\"trade_execution\"} 1"));
        assert!(text.contains("meridian_agents_active 4"));
        assert!(text.contains("meridian_risk_mode 1"));
        assert!(text.contains("meridian_exposure 75"));
    }

    #[test]
    fn test_reconcile_actions_are_counted() {
        let metrics = CycleMetrics::new().unwrap();
        let retire = |reason| PoolAction::Retire {
            agent_id: Uuid::new_v4(),
            reason,
            released: dec!(0.2),
        };
        let report = ReconcileReport {
            target_count: 1,
            actions: vec![
                retire(RetireReason::ScaleDown),
                retire(RetireReason::Failed),
                PoolAction::Spawn {
                    agent_id: Uuid::new_v4(),
                    kind: AgentKind::Trading,
                    dna_id: Uuid::new_v4(),
                    allocation: dec!(0.4),
                },
                PoolAction::SpawnDeferred {
                    reason: "throttled".into(),
                },
            ],
        };
        metrics.observe_reconcile(&report);

        assert_eq!(metrics.retirements_total.get(), 2);
        assert_eq!(metrics.spawns_total.get(), 1);
        assert_eq!(metrics.spawns_deferred.get(), 1);
        assert!(metrics.render().contains("meridian_retirements_total 2"));
    }

    #[test]
    fn test_independent_registries() {
        // each orchestrator owns its registry, so several can coexist in one process
        assert!(CycleMetrics::new().is_ok());
        assert!(CycleMetrics::new().is_ok());
    }
}
