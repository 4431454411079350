//! Agent kinds and lifecycle states

use serde::{Deserialize, Serialize};

/// Kind of work an agent performs
///
/// The set is closed: every kind must have a constructor registered with the
/// orchestrator's agent registry before the loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Trading,
    YieldFarming,
    GrantWriting,
    JobScraping,
    ContentCreation,
}

impl AgentKind {
    /// All kinds in declaration order
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Trading,
        AgentKind::YieldFarming,
        AgentKind::GrantWriting,
        AgentKind::JobScraping,
        AgentKind::ContentCreation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Trading => "trading",
            AgentKind::YieldFarming => "yield_farming",
            AgentKind::GrantWriting => "grant_writing",
            AgentKind::JobScraping => "job_scraping",
            AgentKind::ContentCreation => "content_creation",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Created by the pool, not yet dispatched
    Spawning,
    /// Dispatched every cycle
    Active,
    /// Parked at the agent's own request
    Idle,
    /// Being removed by the pool
    Retiring,
    /// Persistent failure reported by the agent
    Failed,
}

impl AgentStatus {
    /// Whether the agent counts toward the pool's target size
    pub fn counts_toward_target(&self) -> bool {
        matches!(self, AgentStatus::Spawning | AgentStatus::Active)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Spawning => write!(f, "spawning"),
            AgentStatus::Active => write!(f, "active"),
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Retiring => write!(f, "retiring"),
            AgentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Status change an agent may request from its own execution thread
///
/// Every other transition is owned by the pool manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusRequest {
    Idle,
    Failed,
}

impl From<StatusRequest> for AgentStatus {
    fn from(request: StatusRequest) -> Self {
        match request {
            StatusRequest::Idle => AgentStatus::Idle,
            StatusRequest::Failed => AgentStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_counting_statuses() {
        assert!(AgentStatus::Spawning.counts_toward_target());
        assert!(AgentStatus::Active.counts_toward_target());
        assert!(!AgentStatus::Idle.counts_toward_target());
        assert!(!AgentStatus::Retiring.counts_toward_target());
        assert!(!AgentStatus::Failed.counts_toward_target());
    }

    #[test]
    fn test_kind_serde_names() {
        let json = serde_json::to_string(&AgentKind::GrantWriting).unwrap();
        assert_eq!(json, "\"grant_writing\"");
        let kind: AgentKind = serde_json::from_str("\"job_scraping\"").unwrap();
        assert_eq!(kind, AgentKind::JobScraping);
    }
}
