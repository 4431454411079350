//! Agent execution contract and per-cycle results

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::agent::{AgentKind, StatusRequest};
use super::cycle::CycleType;
use super::dna::StrategyDna;

/// Work order handed to an agent for one cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub agent_id: Uuid,
    pub dna: StrategyDna,
    /// Fraction of the total budget (0-1)
    pub capital_allocation: Decimal,
    pub cycle_type: CycleType,
    /// The agent must finish before this instant or be treated as timed out
    pub deadline: DateTime<Utc>,
}

/// Outcome status reported by an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
}

/// What an agent reports back for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Realized monetary value
    pub realized_value: Decimal,
    /// Change in open-position exposure
    pub exposure_delta: Decimal,
    pub status: ExecutionStatus,
    /// Optional status change requested by the agent itself
    pub status_request: Option<StatusRequest>,
}

impl ExecutionReport {
    pub fn success(realized_value: Decimal, exposure_delta: Decimal) -> Self {
        Self {
            realized_value,
            exposure_delta,
            status: ExecutionStatus::Success,
            status_request: None,
        }
    }

    pub fn failure() -> Self {
        Self {
            realized_value: Decimal::ZERO,
            exposure_delta: Decimal::ZERO,
            status: ExecutionStatus::Failure,
            status_request: None,
        }
    }

    /// Attach a status request
    pub fn with_request(mut self, request: StatusRequest) -> Self {
        self.status_request = Some(request);
        self
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// One agent's result for one cycle, as seen by the coordinating loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub agent_id: Uuid,
    pub kind: AgentKind,
    pub dna_id: Uuid,
    pub report: ExecutionReport,
    /// Wall time spent executing
    pub latency: Duration,
    /// The agent missed its deadline and was cancelled
    pub timed_out: bool,
}

impl AgentOutcome {
    /// Failure outcome for an agent that was cancelled or never reported
    pub fn failed(agent_id: Uuid, kind: AgentKind, dna_id: Uuid, latency: Duration, timed_out: bool) -> Self {
        Self {
            agent_id,
            kind,
            dna_id,
            report: ExecutionReport::failure(),
            latency,
            timed_out,
        }
    }
}

/// Everything a completed cycle produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub cycle_id: u64,
    pub cycle_type: CycleType,
    pub completed_at: DateTime<Utc>,
    /// Monetary value supplied by the revenue feed for this cycle
    pub realized: Decimal,
    pub outcomes: Vec<AgentOutcome>,
}

impl CycleResult {
    /// Sum of exposure deltas reported by successful agents
    pub fn exposure_delta(&self) -> Decimal {
        self.outcomes
            .iter()
            .filter(|o| o.report.is_success())
            .map(|o| o.report.exposure_delta)
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.report.is_success()).count()
    }
}
