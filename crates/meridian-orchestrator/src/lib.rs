//! # Meridian Orchestrator
//!
//! The coordinating loop of the Meridian control core: it schedules cycles,
//! keeps the agent pool sized to realized revenue, dispatches agents under a
//! deadline, and gates everything on portfolio exposure.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐           │
//! │  │  Scheduler  │  │  AgentPool  │  │  Executor   │           │
//! │  │ (fairness + │  │ (tiers +    │  │ (semaphore, │           │
//! │  │  volatility)│  │  capital)   │  │  timeouts)  │           │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘           │
//! │         │                │                │                  │
//! │  ┌──────┴────────────────┴────────────────┴──────┐           │
//! │  │ Tracker (ledger)  RiskGate  EvolutionEngine   │           │
//! │  └───────────────────────┬───────────────────────┘           │
//! │                          │                                   │
//! │  ┌───────────────────────┴───────────────────────┐           │
//! │  │ ExposureSource  VolatilitySignal  RevenueFeed │           │
//! │  └───────────────────────────────────────────────┘           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Control Surface
//!
//! - [`Orchestrator::run_cycle`]: execute one cycle, return its [`CycleSnapshot`]
//! - [`Orchestrator::get_health`]: risk mode plus agent counts
//! - [`Orchestrator::acknowledge_emergency_stop`]: clear emergency stop
//!
//! [`CycleSnapshot`]: meridian_common::CycleSnapshot

pub mod api;
pub mod config;
pub mod engine;
pub mod executor;
pub mod pool;
pub mod scheduler;
pub mod sources;
pub mod strategy;
pub mod telemetry;

pub use api::{create_router, ApiState};
pub use config::MeridianConfig;
pub use engine::{run_loop, EmergencySignal, Orchestrator, OrchestratorHandle, StatusBoard};
pub use pool::{Agent, AgentPool, PoolAction, ReconcileReport, RetireReason};
pub use scheduler::CycleScheduler;
pub use sources::{Collaborators, ExposureSource, RevenueFeed, VolatilitySignal};
pub use strategy::{AgentRegistry, SimulatedAgent, StrategyAgent};
pub use telemetry::CycleMetrics;
