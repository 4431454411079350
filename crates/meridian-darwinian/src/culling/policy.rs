//! Retirement policy: N consecutive failed executions = failed agent

use meridian_common::AgentStatus;
use ordered_float::OrderedFloat;
use uuid::Uuid;

/// Minimal view of an agent for retirement ranking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetirementCandidate {
    pub id: Uuid,
    pub cumulative_fitness: f64,
    pub status: AgentStatus,
}

pub struct RetirementPolicy {
    max_consecutive_failures: u32,
}

impl RetirementPolicy {
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            max_consecutive_failures: max_consecutive_failures.max(1),
        }
    }

    pub fn max_consecutive_failures(&self) -> u32 {
        self.max_consecutive_failures
    }

    pub fn should_fail(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.max_consecutive_failures
    }

    /// Pick `count` candidates to retire, lowest fitness first
    ///
    /// Non-numeric fitness ranks lowest. Ties break on id.
    pub fn select_for_retirement(&self, candidates: &[RetirementCandidate], count: usize) -> Vec<Uuid> {
        let mut ranked: Vec<&RetirementCandidate> = candidates.iter().collect();
        ranked.sort_by(|a, b| {
            OrderedFloat(Self::ranking_fitness(a))
                .cmp(&OrderedFloat(Self::ranking_fitness(b)))
                .then(a.id.cmp(&b.id))
        });
        ranked.into_iter().take(count).map(|c| c.id).collect()
    }

    fn ranking_fitness(candidate: &RetirementCandidate) -> f64 {
        if candidate.cumulative_fitness.is_finite() {
            candidate.cumulative_fitness
        } else {
            f64::NEG_INFINITY
        }
    }
}

impl Default for RetirementPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
