//! Externally observable records: per-cycle snapshot and health report

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::agent::AgentStatus;
use super::cycle::CycleType;
use super::risk::RiskMode;

/// Structured record emitted after every cycle
///
/// This is the only state a dashboard or monitoring collaborator needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSnapshot {
    pub cycle_id: u64,
    #[serde(rename = "type")]
    pub cycle_type: CycleType,
    /// Planned duration in seconds
    pub duration_secs: f64,
    pub agents_active: usize,
    pub realized: Decimal,
    pub deficit: Decimal,
    pub risk_mode: RiskMode,
    pub best_fitness: f64,
    pub generation: u64,
    pub completed_at: DateTime<Utc>,
}

/// Agent counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCounts {
    pub spawning: usize,
    pub active: usize,
    pub idle: usize,
    pub retiring: usize,
    pub failed: usize,
}

impl AgentCounts {
    pub fn add(&mut self, status: AgentStatus) {
        match status {
            AgentStatus::Spawning => self.spawning += 1,
            AgentStatus::Active => self.active += 1,
            AgentStatus::Idle => self.idle += 1,
            AgentStatus::Retiring => self.retiring += 1,
            AgentStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.spawning + self.active + self.idle + self.retiring + self.failed
    }
}

impl FromIterator<AgentStatus> for AgentCounts {
    fn from_iter<I: IntoIterator<Item = AgentStatus>>(iter: I) -> Self {
        let mut counts = AgentCounts::default();
        for status in iter {
            counts.add(status);
        }
        counts
    }
}

/// Answer to a health query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub risk_mode: RiskMode,
    pub agents: AgentCounts,
    pub cycles_run: u64,
    /// Reason the loop is halted, if a fatal error occurred
    pub halted: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_from_statuses() {
        let counts: AgentCounts = vec![
            AgentStatus::Active,
            AgentStatus::Active,
            AgentStatus::Idle,
            AgentStatus::Spawning,
        ]
        .into_iter()
        .collect();
        assert_eq!(counts.active, 2);
        assert_eq!(counts.idle, 1);
        assert_eq!(counts.spawning, 1);
        assert_eq!(counts.total(), 4);
    }
}
