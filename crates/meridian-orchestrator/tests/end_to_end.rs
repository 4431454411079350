//! End-to-end scenarios through the coordinating loop

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meridian_common::{
    AgentKind, AgentOutcome, CycleType, ExecutionReport, ExecutionRequest, Result, RiskMode,
};
use meridian_orchestrator::config::ExposureSourceKind;
use meridian_orchestrator::sources::{FixedVolatility, ReportedRevenue};
use meridian_orchestrator::{
    AgentRegistry, Collaborators, ExposureSource, MeridianConfig, Orchestrator, RevenueFeed,
    StrategyAgent,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Replays readings in order, repeating the last one
struct Scripted(Mutex<VecDeque<Decimal>>);

impl Scripted {
    fn new(values: &[Decimal]) -> Self {
        Self(Mutex::new(values.iter().copied().collect()))
    }

    fn next(&self) -> Decimal {
        let mut values = self.0.lock();
        if values.len() > 1 {
            values.pop_front().unwrap_or_default()
        } else {
            values.front().copied().unwrap_or_default()
        }
    }
}

#[async_trait]
impl ExposureSource for Scripted {
    async fn current_exposure(&self) -> Result<Decimal> {
        Ok(self.next())
    }
}

#[async_trait]
impl RevenueFeed for Scripted {
    async fn realized(&self, _outcomes: &[AgentOutcome]) -> Result<Decimal> {
        Ok(self.next())
    }
}

/// Never finishes within a cycle
struct Stalled(AgentKind);

#[async_trait]
impl StrategyAgent for Stalled {
    fn kind(&self) -> AgentKind {
        self.0
    }

    async fn execute(&self, _request: ExecutionRequest) -> Result<ExecutionReport> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ExecutionReport::success(dec!(1), Decimal::ZERO))
    }
}

fn config() -> MeridianConfig {
    let mut config = MeridianConfig::default();
    config.agents.latency_ms = 0;
    config.agents.failure_rate = 0.0;
    config.agents.exposure_scale = 0.0;
    config.risk.threshold_warn = dec!(40);
    config.risk.threshold_halt = dec!(100);
    config
}

fn build(exposure: Box<dyn ExposureSource>, revenue: Box<dyn RevenueFeed>) -> Orchestrator {
    let config = config();
    let registry = AgentRegistry::simulated(&config.agents);
    Orchestrator::new(
        config,
        registry,
        Collaborators {
            exposure,
            volatility: Box::new(FixedVolatility(0.3)),
            revenue,
        },
    )
    .unwrap()
}

#[tokio::test]
async fn pool_scales_after_crossing_revenue_tier() {
    let mut orch = build(
        Box::new(Scripted::new(&[dec!(0)])),
        Box::new(Scripted::new(&[dec!(600), dec!(0)])),
    );

    let first = orch.run_cycle().await.unwrap();
    assert_eq!(first.agents_active, 1);
    assert_eq!(first.realized, dec!(600));
    assert_eq!(first.deficit, dec!(-400));

    let second = orch.run_cycle().await.unwrap();
    assert_eq!(second.agents_active, 5);
    assert_eq!(orch.pool().len(), 5);
    assert!(orch.pool().total_allocation() <= Decimal::ONE);
    assert!(orch.pool().validate().is_ok());

    let dna: std::collections::HashSet<Uuid> = orch.pool().agents().map(|a| a.dna().id).collect();
    assert_eq!(dna.len(), 5);
}

#[tokio::test]
async fn exposure_drives_throttle_then_emergency_then_recovery() {
    let mut orch = build(
        Box::new(Scripted::new(&[dec!(50), dec!(120), dec!(0)])),
        Box::new(ReportedRevenue),
    );

    let first = orch.run_cycle().await.unwrap();
    assert_eq!(first.risk_mode, RiskMode::Throttled);
    assert_eq!(first.agents_active, 1);

    let second = orch.run_cycle().await.unwrap();
    assert_eq!(second.risk_mode, RiskMode::EmergencyStopped);
    assert_eq!(second.agents_active, 1);

    let third = orch.run_cycle().await.unwrap();
    assert_eq!(third.cycle_type, CycleType::RiskAssessment);
    assert_eq!(third.agents_active, 0);
    assert!(orch.pool().is_empty());

    // no spawns until acknowledged, exposure reading back to zero or not
    for _ in 0..3 {
        let snapshot = orch.run_cycle().await.unwrap();
        assert_eq!(snapshot.cycle_type, CycleType::RiskAssessment);
        assert_eq!(snapshot.risk_mode, RiskMode::EmergencyStopped);
        assert!(orch.pool().is_empty());
    }

    assert!(orch.acknowledge_emergency_stop());
    assert_eq!(orch.get_health().risk_mode, RiskMode::Normal);
    assert_eq!(orch.gate().tracked_delta(), Decimal::ZERO);

    let recovered = orch.run_cycle().await.unwrap();
    assert_eq!(recovered.risk_mode, RiskMode::Normal);
    assert_eq!(recovered.agents_active, 1);
}

#[tokio::test(start_paused = true)]
async fn overrunning_agents_time_out_and_are_replaced() {
    let config = config();
    let mut registry = AgentRegistry::new();
    for kind in AgentKind::ALL {
        registry.register(
            kind,
            Box::new(move |_| Ok(Arc::new(Stalled(kind)) as Arc<dyn StrategyAgent>)),
        );
    }
    let mut orch = Orchestrator::new(
        config,
        registry,
        Collaborators {
            exposure: Box::new(Scripted::new(&[dec!(0)])),
            volatility: Box::new(FixedVolatility(0.3)),
            revenue: Box::new(ReportedRevenue),
        },
    )
    .unwrap();

    orch.run_cycle().await.unwrap();
    let original = orch.pool().agents().next().map(|a| a.id()).unwrap();
    let stats = orch.tracker().agent(original).unwrap();
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.successes, 0);

    orch.run_cycle().await.unwrap();
    orch.run_cycle().await.unwrap();
    assert_eq!(orch.pool().get(original).unwrap().consecutive_failures(), 3);

    let fourth = orch.run_cycle().await.unwrap();
    assert!(orch.pool().get(original).is_none());
    assert_eq!(fourth.agents_active, 1);
    assert_eq!(orch.get_health().cycles_run, 4);
}

#[tokio::test]
async fn file_exposure_source_from_configuration() {
    let path = std::env::temp_dir().join(format!("meridian-e2e-{}", Uuid::new_v4()));
    tokio::fs::write(&path, "70").await.unwrap();

    let mut config = config();
    config.sources.exposure = ExposureSourceKind::File;
    config.sources.exposure_file = Some(path.clone());
    let mut orch = Orchestrator::from_config(config).unwrap();

    let snapshot = orch.run_cycle().await.unwrap();
    assert_eq!(snapshot.risk_mode, RiskMode::Throttled);

    // unreadable source fails safe
    tokio::fs::remove_file(&path).await.unwrap();
    let snapshot = orch.run_cycle().await.unwrap();
    assert_eq!(snapshot.risk_mode, RiskMode::EmergencyStopped);
}

#[tokio::test]
async fn telemetry_history_is_bounded() {
    let mut config = config();
    config.history_limit = 3;
    let mut orch = Orchestrator::from_config(config).unwrap();
    for _ in 0..5 {
        orch.run_cycle().await.unwrap();
    }
    let ids: Vec<u64> = orch.history().iter().map(|s| s.cycle_id).collect();
    assert_eq!(ids, vec![2, 3, 4]);
    assert!(orch.handle().metrics.render().contains("meridian_cycles_total"));
}
