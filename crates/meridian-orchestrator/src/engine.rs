//! Coordinating loop
//!
//! One cycle at a time:
//!
//! ```text
//! emergency signal ─► select cycle ─► reconcile pool ─► dispatch agents
//!        ─► revenue feed ─► tracker ─► risk gate ─► (every N) evolve ─► snapshot
//! ```
//!
//! The orchestrator is the only writer of the ledger, the risk state and the
//! allocation pool. Agents report back through the executor's result channel.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use meridian_common::{
    CycleResult, CycleSnapshot, ExecutionRequest, HealthReport, MeridianError, Result,
};
use meridian_darwinian::{EvolutionEngine, KindWeights};
use meridian_ledger::PerformanceTracker;
use meridian_risk::RiskGate;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::MeridianConfig;
use crate::executor::{self, Dispatch};
use crate::pool::{AgentPool, ReconcileReport};
use crate::scheduler::CycleScheduler;
use crate::sources::{Collaborators, ExposureSource, RevenueFeed, VolatilitySignal};
use crate::strategy::{AgentRegistry, StrategyAgent};
use crate::telemetry::CycleMetrics;

/// Wait before retrying after a failed cycle in the background loop
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Administrative emergency-stop request, honored at the next cycle start
#[derive(Clone, Default)]
pub struct EmergencySignal(Arc<AtomicBool>);

impl EmergencySignal {
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Consume a pending request
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Read model published after every state change
#[derive(Debug, Clone, Serialize)]
pub struct StatusBoard {
    pub health: HealthReport,
    pub history: VecDeque<CycleSnapshot>,
    pub stop_reason: Option<String>,
    pub risk_score: f64,
}

/// Cheap clonable view for readers that must not wait on a running cycle
#[derive(Clone)]
pub struct OrchestratorHandle {
    pub board: Arc<RwLock<StatusBoard>>,
    pub metrics: Arc<CycleMetrics>,
    pub emergency: EmergencySignal,
}

pub struct Orchestrator {
    config: MeridianConfig,
    scheduler: CycleScheduler,
    pool: AgentPool,
    evolution: EvolutionEngine,
    weights: KindWeights,
    gate: RiskGate,
    tracker: PerformanceTracker,
    registry: AgentRegistry,
    instances: HashMap<Uuid, Arc<dyn StrategyAgent>>,
    exposure: Box<dyn ExposureSource>,
    volatility: Box<dyn VolatilitySignal>,
    revenue: Box<dyn RevenueFeed>,
    emergency: EmergencySignal,
    metrics: Arc<CycleMetrics>,
    board: Arc<RwLock<StatusBoard>>,
    history: VecDeque<CycleSnapshot>,
    cycles_run: u64,
    halted: Option<String>,
}

impl Orchestrator {
    /// Build from configuration with the simulated agents and configured collaborators
    pub fn from_config(config: MeridianConfig) -> Result<Self> {
        let registry = AgentRegistry::simulated(&config.agents);
        let collaborators = Collaborators::from_settings(&config.sources);
        Self::new(config, registry, collaborators)
    }

    pub fn new(config: MeridianConfig, registry: AgentRegistry, collaborators: Collaborators) -> Result<Self> {
        config
            .validate()
            .map_err(|e| MeridianError::Config(e.to_string()))?;
        registry.validate(&config.pool.enabled_kinds)?;

        let evolution = EvolutionEngine::new(config.evolution.clone())?;
        let metrics = CycleMetrics::new().map_err(|e| MeridianError::Internal(e.to_string()))?;
        let gate = RiskGate::new(config.risk.clone());

        let board = StatusBoard {
            health: HealthReport {
                risk_mode: gate.mode(),
                agents: Default::default(),
                cycles_run: 0,
                halted: None,
            },
            history: VecDeque::new(),
            stop_reason: None,
            risk_score: 0.0,
        };

        info!(
            kinds = config.pool.enabled_kinds.len(),
            max_agents = config.pool.max_agents,
            population = config.evolution.population_size,
            "Orchestrator initialized"
        );

        Ok(Self {
            scheduler: CycleScheduler::new(&config.scheduler),
            pool: AgentPool::new(config.pool.clone()),
            weights: KindWeights::new(&config.pool.enabled_kinds),
            tracker: PerformanceTracker::new(&config.tracker),
            evolution,
            gate,
            registry,
            instances: HashMap::new(),
            exposure: collaborators.exposure,
            volatility: collaborators.volatility,
            revenue: collaborators.revenue,
            emergency: EmergencySignal::default(),
            metrics: Arc::new(metrics),
            board: Arc::new(RwLock::new(board)),
            history: VecDeque::new(),
            cycles_run: 0,
            halted: None,
            config,
        })
    }

    pub fn config(&self) -> &MeridianConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &CycleScheduler {
        &self.scheduler
    }

    pub fn pool(&self) -> &AgentPool {
        &self.pool
    }

    pub fn evolution(&self) -> &EvolutionEngine {
        &self.evolution
    }

    pub fn weights(&self) -> &KindWeights {
        &self.weights
    }

    pub fn gate(&self) -> &RiskGate {
        &self.gate
    }

    pub fn tracker(&self) -> &PerformanceTracker {
        &self.tracker
    }

    /// Mutable tracker access for expense bookkeeping
    pub fn tracker_mut(&mut self) -> &mut PerformanceTracker {
        &mut self.tracker
    }

    pub fn history(&self) -> &VecDeque<CycleSnapshot> {
        &self.history
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles_run
    }

    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    pub fn emergency_signal(&self) -> EmergencySignal {
        self.emergency.clone()
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            board: self.board.clone(),
            metrics: self.metrics.clone(),
            emergency: self.emergency.clone(),
        }
    }

    /// Risk mode plus agent counts
    pub fn get_health(&self) -> HealthReport {
        HealthReport {
            risk_mode: self.gate.mode(),
            agents: self.pool.counts(),
            cycles_run: self.cycles_run,
            halted: self.halted.clone(),
        }
    }

    /// Execute exactly one cycle and return its telemetry record
    #[instrument(skip(self), fields(cycle = self.cycles_run))]
    pub async fn run_cycle(&mut self) -> Result<CycleSnapshot> {
        if let Some(reason) = &self.halted {
            return Err(MeridianError::Halted(reason.clone()));
        }

        if self.emergency.take() {
            self.gate.force_emergency("operator emergency stop");
        }

        let now = Utc::now();
        let signal = self.volatility.sample();
        let class = self.scheduler.classify(signal);
        let cycle = self.scheduler.select_next_cycle(self.gate.state(), signal, now);
        let ledger = self.tracker.refresh(now).clone();

        let preference = self.weights.preference_order(class);
        let reconciled = self
            .pool
            .reconcile(&ledger, self.gate.state(), self.evolution.population(), &preference);
        let report = match reconciled {
            Ok(report) => report,
            Err(e) if e.is_fatal() => return Err(self.halt(e)),
            Err(e) => {
                warn!(error = %e, "Reconciliation failed, dispatching current pool");
                ReconcileReport::default()
            }
        };
        self.sync_instances(&report);
        self.metrics.observe_reconcile(&report);

        let deadline = cycle.deadline();
        let jobs: Vec<Dispatch> = self
            .pool
            .dispatchable()
            .filter_map(|agent| {
                let instance = self.instances.get(&agent.id())?.clone();
                Some(Dispatch {
                    agent_id: agent.id(),
                    kind: agent.kind(),
                    dna_id: agent.dna().id,
                    instance,
                    request: ExecutionRequest {
                        agent_id: agent.id(),
                        dna: agent.dna().clone(),
                        capital_allocation: agent.capital_allocation(),
                        cycle_type: cycle.cycle_type(),
                        deadline,
                    },
                })
            })
            .collect();

        let workers = report.target_count.clamp(1, self.config.pool.max_workers);
        let outcomes = executor::dispatch(jobs, workers, cycle.planned_duration()).await;

        let realized = match self.revenue.realized(&outcomes).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Revenue feed unavailable, folding zero");
                Decimal::ZERO
            }
        };

        let result = CycleResult {
            cycle_id: cycle.id(),
            cycle_type: cycle.cycle_type(),
            completed_at: Utc::now(),
            realized,
            outcomes,
        };
        self.metrics.observe_result(&result);

        self.gate.add_exposure_delta(result.exposure_delta());
        let update = self.tracker.record(&result);
        self.pool.apply_outcomes(&result.outcomes, &update.agents);
        self.weights.update(&result.outcomes);

        let exposure = match self.exposure.current_exposure().await {
            Ok(external) => {
                let exposure = self.gate.effective_exposure(external);
                self.gate.assess(exposure, &update.ledger);
                exposure
            }
            Err(e) => {
                self.gate.assess_unavailable(&update.ledger, &e.to_string());
                self.gate.state().exposure
            }
        };

        self.cycles_run += 1;
        if self.evolution.should_evolve(self.cycles_run) {
            for agent in self.pool.agents() {
                self.evolution.record_fitness(agent.dna().id, agent.cumulative_fitness());
            }
            self.evolution.evolve();
        }

        let ledger = self.tracker.ledger();
        let snapshot = CycleSnapshot {
            cycle_id: cycle.id(),
            cycle_type: cycle.cycle_type(),
            duration_secs: cycle.planned_duration().as_secs_f64(),
            agents_active: self.pool.dispatchable().count(),
            realized: ledger.realized,
            deficit: -ledger.deficit_or_surplus(),
            risk_mode: self.gate.mode(),
            best_fitness: self.evolution.best_fitness(),
            generation: self.evolution.generation(),
            completed_at: result.completed_at,
        };

        self.metrics.observe_snapshot(&snapshot, exposure);
        self.history.push_back(snapshot.clone());
        while self.history.len() > self.config.history_limit.max(1) {
            self.history.pop_front();
        }
        self.publish();

        info!(
            cycle_id = snapshot.cycle_id,
            cycle_type = %snapshot.cycle_type,
            agents = snapshot.agents_active,
            realized = %snapshot.realized,
            deficit = %snapshot.deficit,
            risk_mode = %snapshot.risk_mode,
            failures = result.failures(),
            "Cycle complete"
        );

        Ok(snapshot)
    }

    /// Clear emergency stop and reset exposure tracking
    ///
    /// Returns false if the gate was not stopped. A pending, not yet honored
    /// stop request is discarded as well.
    pub fn acknowledge_emergency_stop(&mut self) -> bool {
        let pending = self.emergency.take();
        let cleared = self.gate.acknowledge();
        if pending && !cleared {
            info!("Pending emergency stop request withdrawn");
        }
        self.publish();
        cleared
    }

    /// Resume after a fatal halt once the allocation invariant holds again
    pub fn clear_halt(&mut self) -> Result<()> {
        if self.halted.is_none() {
            return Ok(());
        }
        self.pool.validate()?;
        info!("Invariants hold again, resuming cycle progression");
        self.halted = None;
        self.publish();
        Ok(())
    }

    /// Ranked population plus current kind weights
    pub fn evolution_export(&self) -> Result<serde_json::Value> {
        let population: serde_json::Value = serde_json::from_str(&self.evolution.export_json()?)?;
        Ok(serde_json::json!({
            "evolution": population,
            "kind_weights": self.weights.weights(),
        }))
    }

    fn halt(&mut self, cause: MeridianError) -> MeridianError {
        error!(error = %cause, "Fatal invariant violation, halting cycle progression");
        self.halted = Some(cause.to_string());
        self.publish();
        cause
    }

    /// Keep strategy instances in step with the pool
    fn sync_instances(&mut self, report: &ReconcileReport) {
        for agent_id in report.retired() {
            self.instances.remove(&agent_id);
            self.tracker.forget(agent_id);
        }
        for agent_id in report.spawned() {
            let Some(kind) = self.pool.get(agent_id).map(|a| a.kind()) else {
                continue;
            };
            match self.registry.construct(kind, agent_id) {
                Ok(instance) => {
                    self.instances.insert(agent_id, instance);
                }
                Err(e) => {
                    warn!(%agent_id, %kind, error = %e, "Agent construction failed, discarding spawn");
                    self.pool.discard(agent_id);
                }
            }
        }
    }

    fn publish(&self) {
        let mut board = self.board.write();
        board.health = self.get_health();
        board.history = self.history.clone();
        board.stop_reason = self.gate.stop_reason().map(str::to_string);
        board.risk_score = self.gate.violations().risk_score(Utc::now());
    }
}

/// Run cycles until shutdown, pacing each by its planned duration
pub async fn run_loop(orchestrator: Arc<Mutex<Orchestrator>>, mut shutdown: watch::Receiver<bool>) {
    info!("Autonomous cycle loop started");
    loop {
        let pause = {
            let mut guard = orchestrator.lock().await;
            let pacing = guard.config().scheduler.pacing;
            match guard.run_cycle().await {
                Ok(snapshot) => Duration::try_from_secs_f64(snapshot.duration_secs * pacing).unwrap_or_default(),
                Err(MeridianError::Halted(reason)) => {
                    debug!(%reason, "Loop idle while halted");
                    RETRY_DELAY
                }
                Err(e) => {
                    warn!(error = %e, "Cycle failed");
                    RETRY_DELAY
                }
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = shutdown.changed() => break,
        }
    }
    info!("Autonomous cycle loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{FixedVolatility, MockExposureSource, ReportedRevenue};
    use meridian_common::{AgentKind, RiskMode};
    use rust_decimal_macros::dec;

    fn config() -> MeridianConfig {
        let mut config = MeridianConfig::default();
        config.agents.latency_ms = 0;
        config.agents.failure_rate = 0.0;
        config.agents.exposure_scale = 0.0;
        config.risk.threshold_warn = dec!(40);
        config.risk.threshold_halt = dec!(100);
        config
    }

    fn orchestrator(exposure: MockExposureSource) -> Orchestrator {
        let config = config();
        let registry = AgentRegistry::simulated(&config.agents);
        Orchestrator::new(
            config,
            registry,
            Collaborators {
                exposure: Box::new(exposure),
                volatility: Box::new(FixedVolatility(0.3)),
                revenue: Box::new(ReportedRevenue),
            },
        )
        .unwrap()
    }

    fn calm() -> MockExposureSource {
        let mut mock = MockExposureSource::new();
        mock.expect_current_exposure().returning(|| Ok(dec!(0)));
        mock
    }

    #[tokio::test]
    async fn test_first_cycle_spawns_one_agent() {
        let mut orch = orchestrator(calm());
        let snapshot = orch.run_cycle().await.unwrap();
        assert_eq!(snapshot.cycle_id, 0);
        assert_eq!(snapshot.agents_active, 1);
        assert_eq!(snapshot.risk_mode, RiskMode::Normal);
        assert_eq!(orch.get_health().agents.active, 1);
        assert_eq!(orch.history().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_exposure_fails_safe() {
        let mut mock = MockExposureSource::new();
        mock.expect_current_exposure()
            .returning(|| Err(meridian_common::SourceError::Unavailable("wallet offline".into()).into()));
        let mut orch = orchestrator(mock);
        let snapshot = orch.run_cycle().await.unwrap();
        assert_eq!(snapshot.risk_mode, RiskMode::EmergencyStopped);
    }

    #[tokio::test]
    async fn test_operator_signal_short_circuits_to_risk_assessment() {
        let mut orch = orchestrator(calm());
        orch.run_cycle().await.unwrap();

        orch.handle().emergency.raise();
        let snapshot = orch.run_cycle().await.unwrap();
        assert_eq!(snapshot.cycle_type, meridian_common::CycleType::RiskAssessment);
        assert_eq!(snapshot.risk_mode, RiskMode::EmergencyStopped);
        assert_eq!(snapshot.agents_active, 0);

        assert!(orch.acknowledge_emergency_stop());
        assert_eq!(orch.get_health().risk_mode, RiskMode::Normal);
        assert!(!orch.acknowledge_emergency_stop());
    }

    #[tokio::test]
    async fn test_broken_allocation_halts_until_cleared() {
        let mut config = config();
        config.pool.max_agents = 1;
        let registry = AgentRegistry::simulated(&config.agents);
        let mut orch = Orchestrator::new(
            config,
            registry,
            Collaborators {
                exposure: Box::new(calm()),
                volatility: Box::new(FixedVolatility(0.3)),
                revenue: Box::new(ReportedRevenue),
            },
        )
        .unwrap();
        orch.run_cycle().await.unwrap();

        let agent_id = orch.pool().agents().next().map(|a| a.id()).unwrap();
        if let Some(agent) = orch.pool.get_mut(agent_id) {
            agent.set_allocation(dec!(2));
        }

        let err = orch.run_cycle().await.unwrap_err();
        assert!(matches!(err, MeridianError::Invariant(_)));
        assert!(orch.halted().is_some());
        assert!(orch.handle().board.read().health.halted.is_some());

        let started = orch.scheduler().cycles_started();
        let err = orch.run_cycle().await.unwrap_err();
        assert!(matches!(err, MeridianError::Halted(_)));
        assert_eq!(orch.scheduler().cycles_started(), started);
        assert_eq!(orch.cycles_run(), 1);
        assert_eq!(orch.history().len(), 1);

        // still broken, stays halted
        assert!(orch.clear_halt().is_err());
        assert!(orch.halted().is_some());

        if let Some(agent) = orch.pool.get_mut(agent_id) {
            agent.set_allocation(dec!(1));
        }
        orch.clear_halt().unwrap();
        assert!(orch.halted().is_none());

        let snapshot = orch.run_cycle().await.unwrap();
        assert_eq!(snapshot.agents_active, 1);
        assert_eq!(orch.cycles_run(), 2);
    }

    #[tokio::test]
    async fn test_ack_withdraws_pending_signal_without_reporting_a_clear() {
        let mut orch = orchestrator(calm());
        orch.run_cycle().await.unwrap();

        orch.handle().emergency.raise();
        assert!(!orch.acknowledge_emergency_stop());
        assert!(!orch.emergency_signal().is_raised());

        let snapshot = orch.run_cycle().await.unwrap();
        assert_eq!(snapshot.risk_mode, RiskMode::Normal);
        assert!(snapshot.agents_active >= 1);
    }

    #[tokio::test]
    async fn test_unregistered_kind_is_rejected_at_startup() {
        let config = config();
        let result = Orchestrator::new(
            config,
            AgentRegistry::new(),
            Collaborators {
                exposure: Box::new(calm()),
                volatility: Box::new(FixedVolatility(0.3)),
                revenue: Box::new(ReportedRevenue),
            },
        );
        assert!(matches!(result, Err(MeridianError::Registry(_))));
    }

    #[tokio::test]
    async fn test_evolution_runs_on_interval() {
        let mut orch = orchestrator(calm());
        let interval = orch.config().evolution.evolution_interval;
        for _ in 0..interval {
            orch.run_cycle().await.unwrap();
        }
        assert_eq!(orch.evolution().generations_run(), 1);
        assert!(orch.evolution_export().unwrap()["kind_weights"]
            .get(AgentKind::Trading.as_str())
            .is_some());
    }

    #[tokio::test]
    async fn test_board_tracks_health() {
        let mut orch = orchestrator(calm());
        let handle = orch.handle();
        orch.run_cycle().await.unwrap();
        let board = handle.board.read();
        assert_eq!(board.health.cycles_run, 1);
        assert_eq!(board.history.len(), 1);
    }
}
