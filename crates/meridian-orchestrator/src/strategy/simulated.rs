//! Simulated strategy agent
//!
//! Realized value is drawn around an expectation driven by how close the
//! genes sit to a sweet spot, scaled by capital and cycle type. Used for
//! local runs and tests; real strategies register their own constructors.

use std::time::Duration;

use async_trait::async_trait;
use meridian_common::{AgentKind, CycleType, ExecutionReport, ExecutionRequest, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::StrategyAgent;
use crate::config::AgentSettings;

const SWEET_SPOT: f64 = 1.2;

pub struct SimulatedAgent {
    kind: AgentKind,
    base_return: f64,
    noise: f64,
    failure_rate: f64,
    exposure_scale: f64,
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl SimulatedAgent {
    pub fn new(kind: AgentKind, agent_id: Uuid, settings: &AgentSettings) -> Self {
        let seed = settings.seed ^ (agent_id.as_u128() as u64);
        Self {
            kind,
            base_return: settings.base_return,
            noise: settings.noise,
            failure_rate: settings.failure_rate,
            exposure_scale: settings.exposure_scale,
            latency: Duration::from_millis(settings.latency_ms),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn cycle_multiplier(cycle_type: CycleType) -> f64 {
        match cycle_type {
            CycleType::TradeExecution => 1.5,
            CycleType::OpportunityScan => 1.0,
            CycleType::PortfolioReview => 0.8,
            CycleType::MarketAnalysis => 0.5,
            CycleType::RiskAssessment => 0.2,
        }
    }

    /// Gene quality in [0, 2]; peaks when every gene sits on the sweet spot
    fn quality(genes: &[f64]) -> f64 {
        if genes.is_empty() {
            return 1.0;
        }
        let distance = genes.iter().map(|g| (g - SWEET_SPOT).abs()).sum::<f64>() / genes.len() as f64;
        (2.0 - distance).max(0.0)
    }

    fn sample(&self, request: &ExecutionRequest) -> Option<(f64, f64)> {
        let mut rng = self.rng.lock();
        if rng.gen::<f64>() < self.failure_rate {
            return None;
        }

        let allocation: f64 = request.capital_allocation.try_into().unwrap_or(0.0);
        let expected = self.base_return
            * allocation
            * Self::quality(&request.dna.parameters())
            * Self::cycle_multiplier(request.cycle_type);

        let realized = match Normal::new(expected, expected.abs() * self.noise) {
            Ok(dist) => dist.sample(&mut *rng),
            Err(_) => expected,
        };
        let exposure = match Normal::new(0.0, self.exposure_scale * allocation) {
            Ok(dist) => dist.sample(&mut *rng),
            Err(_) => 0.0,
        };
        Some((realized, exposure))
    }
}

#[async_trait]
impl StrategyAgent for SimulatedAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionReport> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let Some((realized, exposure)) = self.sample(&request) else {
            return Ok(ExecutionReport::failure());
        };

        let realized = Decimal::try_from(realized).unwrap_or_default().round_dp(2);
        let exposure = Decimal::try_from(exposure).unwrap_or_default().round_dp(2);
        Ok(ExecutionReport::success(realized, exposure))
    }
}
