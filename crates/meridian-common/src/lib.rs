//! # Meridian Common
//!
//! Shared types, errors, and policy constants for the Meridian control core.
//!
//! ## Core Types
//!
//! - [`StrategyDna`]: bounded gene vector evolved by the darwinian engine
//! - [`Cycle`]: immutable record of one scheduled unit of work
//! - [`RevenueLedger`]: rolling realized revenue against the daily target
//! - [`RiskState`]: exposure, thresholds, and the current [`RiskMode`]
//! - [`ExecutionRequest`]/[`ExecutionReport`]: the agent execution contract
//! - [`CycleSnapshot`]: telemetry record emitted after each cycle

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{
    EvolutionError, InvariantError, MeridianError, PoolError, RegistryError, Result, SourceError,
};
pub use types::{
    agent::{AgentKind, AgentStatus, StatusRequest},
    cycle::{Cycle, CycleType, VolatilityClass, VolatilityThresholds},
    dna::{Gene, GeneBounds, StrategyDna},
    execution::{AgentOutcome, CycleResult, ExecutionReport, ExecutionRequest, ExecutionStatus},
    ledger::{RevenueLedger, RevenueTier},
    risk::{RiskMode, RiskState},
    telemetry::{AgentCounts, CycleSnapshot, HealthReport},
};

/// Meridian version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fractional cycle-duration adjustment applied in high/low volatility
pub const VOLATILITY_ADJUSTMENT: f64 = 0.3;

/// Default daily revenue target
pub const DEFAULT_DAILY_TARGET: i64 = 200;

/// Default EWMA smoothing constant for agent fitness
pub const DEFAULT_FITNESS_SMOOTHING: f64 = 0.3;

/// Default per-gene mutation probability
pub const DEFAULT_MUTATION_RATE: f64 = 0.05;

/// Rolling revenue window in hours
pub const REVENUE_WINDOW_HOURS: i64 = 24;

/// Every cycle type runs at least once within this many cycles
pub const DEFAULT_FAIRNESS_WINDOW: usize = 5;

/// Evolution runs every N cycles
pub const DEFAULT_EVOLUTION_INTERVAL: u64 = 10;

/// Upper bound on pool size regardless of tier
pub const DEFAULT_MAX_AGENTS: usize = 20;
