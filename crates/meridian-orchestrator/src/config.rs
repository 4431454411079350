//! Meridian configuration
//!
//! Sources in increasing precedence: built-in defaults, optional
//! `meridian.{toml,yaml,json}` (or the file named by `MERIDIAN_CONFIG`),
//! `MERIDIAN_*` environment variables with `__` between nesting levels, and
//! finally `PORT`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, ensure, Context, Result};
use meridian_common::{
    AgentKind, CycleType, VolatilityThresholds, DEFAULT_FAIRNESS_WINDOW, DEFAULT_MAX_AGENTS,
};
use meridian_darwinian::DarwinianConfig;
use meridian_ledger::TrackerConfig;
use meridian_risk::RiskConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Meridian service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeridianConfig {
    /// Service host
    pub host: String,
    /// Service port
    pub port: u16,
    /// Telemetry records kept in memory
    pub history_limit: usize,
    pub scheduler: SchedulerSettings,
    pub pool: PoolSettings,
    pub evolution: DarwinianConfig,
    pub risk: RiskConfig,
    pub tracker: TrackerConfig,
    pub sources: SourceSettings,
    pub agents: AgentSettings,
}

impl Default for MeridianConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            history_limit: 500,
            scheduler: SchedulerSettings::default(),
            pool: PoolSettings::default(),
            evolution: DarwinianConfig::default(),
            risk: RiskConfig::default(),
            tracker: TrackerConfig::default(),
            sources: SourceSettings::default(),
            agents: AgentSettings::default(),
        }
    }
}

impl MeridianConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let path = std::env::var("MERIDIAN_CONFIG").unwrap_or_else(|_| "meridian".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("MERIDIAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration sources")?;

        let mut cfg: Self = settings
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        // Container platforms hand the listen port through PORT
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse::<u16>() {
                cfg.port = p;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the control loop cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.risk.threshold_warn < self.risk.threshold_halt,
            "risk.threshold_warn ({}) must be below risk.threshold_halt ({})",
            self.risk.threshold_warn,
            self.risk.threshold_halt
        );
        ensure!(self.risk.is_valid(), "risk thresholds must be non-negative");
        ensure!(
            self.tracker.smoothing > 0.0 && self.tracker.smoothing <= 1.0,
            "tracker.smoothing must be in (0, 1]"
        );
        ensure!(self.tracker.window_hours > 0, "tracker.window_hours must be > 0");
        self.evolution
            .validate()
            .map_err(|e| anyhow::anyhow!("evolution: {}", e))?;
        ensure!(
            self.scheduler.fairness_window >= CycleType::ALL.len(),
            "scheduler.fairness_window must be at least {}",
            CycleType::ALL.len()
        );
        ensure!(
            self.scheduler.volatility.low <= self.scheduler.volatility.high,
            "scheduler.volatility.low must not exceed scheduler.volatility.high"
        );
        if let Some((kind, w)) = self
            .scheduler
            .weights
            .iter()
            .find(|(_, w)| !(w.is_finite() && **w > 0.0))
        {
            bail!("scheduler.weights.{} must be > 0, got {}", kind, w);
        }
        ensure!(
            self.scheduler.pacing.is_finite() && self.scheduler.pacing >= 0.0,
            "scheduler.pacing must be a non-negative number"
        );
        ensure!(self.pool.max_agents > 0, "pool.max_agents must be > 0");
        ensure!(
            self.evolution.population_size >= self.pool.max_agents,
            "evolution.population_size ({}) must be at least pool.max_agents ({}) so every agent holds distinct DNA",
            self.evolution.population_size,
            self.pool.max_agents
        );
        ensure!(self.pool.max_workers > 0, "pool.max_workers must be > 0");
        ensure!(!self.pool.enabled_kinds.is_empty(), "pool.enabled_kinds must not be empty");
        if self.sources.exposure == ExposureSourceKind::File {
            ensure!(
                self.sources.exposure_file.is_some(),
                "sources.exposure_file is required when sources.exposure = \"file\""
            );
        }
        Ok(())
    }
}

/// Cycle scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Every cycle type runs at least once in any window of this many cycles
    pub fairness_window: usize,
    /// Signal thresholds for high/low volatility
    pub volatility: VolatilityThresholds,
    /// Per-type weight applied to cycles-since-last-run
    pub weights: BTreeMap<CycleType, f64>,
    /// Fraction of the planned duration the background loop waits between cycles
    pub pacing: f64,
    /// Run cycles in the background instead of only on request
    pub autorun: bool,
    /// Cycles kept in the scheduler's log
    pub log_limit: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            fairness_window: DEFAULT_FAIRNESS_WINDOW,
            volatility: VolatilityThresholds::default(),
            weights: CycleType::ALL.iter().map(|t| (*t, 1.0)).collect(),
            pacing: 1.0,
            autorun: true,
            log_limit: 500,
        }
    }
}

/// Agent pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Cap on agents regardless of revenue tier
    pub max_agents: usize,
    /// Cap on concurrently executing agents
    pub max_workers: usize,
    /// Trim over-allocated agents to the fair share when scaling up
    pub rebalance: bool,
    /// Consecutive failed executions before an agent is marked failed
    pub max_consecutive_failures: u32,
    /// Kinds the pool may spawn
    pub enabled_kinds: Vec<AgentKind>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_agents: DEFAULT_MAX_AGENTS,
            max_workers: 20,
            rebalance: true,
            max_consecutive_failures: 3,
            enabled_kinds: AgentKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureSourceKind {
    /// Only agent-reported exposure deltas on top of a fixed baseline
    Tracked,
    /// Baseline read from a file every cycle
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilitySourceKind {
    Fixed,
    RandomWalk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueFeedKind {
    /// Sum of realized values reported by successful agents
    Reported,
}

/// External collaborator selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub exposure: ExposureSourceKind,
    pub exposure_baseline: Decimal,
    pub exposure_file: Option<PathBuf>,
    pub volatility: VolatilitySourceKind,
    /// Signal returned by the fixed source and starting point of the random walk
    pub volatility_level: f64,
    /// Maximum random-walk step per cycle
    pub volatility_step: f64,
    pub revenue: RevenueFeedKind,
    pub seed: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            exposure: ExposureSourceKind::Tracked,
            exposure_baseline: Decimal::ZERO,
            exposure_file: None,
            volatility: VolatilitySourceKind::RandomWalk,
            volatility_level: 0.3,
            volatility_step: 0.05,
            revenue: RevenueFeedKind::Reported,
            seed: 7,
        }
    }
}

/// Built-in simulated agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Expected realized value per cycle at full allocation and neutral genes
    pub base_return: f64,
    /// Standard deviation of realized value as a fraction of the expectation
    pub noise: f64,
    /// Probability an execution fails
    pub failure_rate: f64,
    /// Standard deviation of the exposure change at full allocation
    pub exposure_scale: f64,
    /// Simulated work time per execution
    pub latency_ms: u64,
    pub seed: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            base_return: 20.0,
            noise: 0.5,
            failure_rate: 0.05,
            exposure_scale: 5.0,
            latency_ms: 50,
            seed: 11,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MeridianConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let mut config = MeridianConfig::default();
        config.risk.threshold_warn = Decimal::from(200);
        config.risk.threshold_halt = Decimal::from(100);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_short_fairness_window() {
        let mut config = MeridianConfig::default();
        config.scheduler.fairness_window = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_smoothing() {
        let mut config = MeridianConfig::default();
        config.tracker.smoothing = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_exposure_requires_path() {
        let mut config = MeridianConfig::default();
        config.sources.exposure = ExposureSourceKind::File;
        assert!(config.validate().is_err());
        config.sources.exposure_file = Some(PathBuf::from("/tmp/exposure"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_population_must_cover_max_agents() {
        let mut config = MeridianConfig::default();
        config.pool.max_agents = 30;
        assert!(config.validate().is_err());
        config.evolution.population_size = 30;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = MeridianConfig::default();
        config.pool.max_workers = 0;
        assert!(config.validate().is_err());
    }
}
