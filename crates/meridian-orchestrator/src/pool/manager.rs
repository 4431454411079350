//! Agent pool manager
//!
//! Reconciles the live population against the revenue tier and the risk
//! mode. Every reconciliation ends with the allocation invariant checked:
//! Σ capital_allocation ≤ 1 with no negative share.

use std::collections::{BTreeMap, HashSet};

use meridian_common::{
    AgentCounts, AgentKind, AgentOutcome, AgentStatus, InvariantError, PoolError, Result,
    RevenueLedger, RiskMode, RiskState, StatusRequest, StrategyDna,
};
use meridian_darwinian::evolution::operators::rank_order;
use meridian_darwinian::{RetirementCandidate, RetirementPolicy};
use meridian_ledger::AgentFitness;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::agent::Agent;
use crate::config::PoolSettings;

/// Decimal places kept on allocation shares; truncated so sums never round up
const ALLOCATION_DP: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireReason {
    /// Persistent failure
    Failed,
    /// Above the tier target
    ScaleDown,
    /// Risk gate is emergency-stopped
    Emergency,
}

/// Lifecycle action issued by a reconciliation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PoolAction {
    Spawn {
        agent_id: Uuid,
        kind: AgentKind,
        dna_id: Uuid,
        allocation: Decimal,
    },
    Retire {
        agent_id: Uuid,
        reason: RetireReason,
        released: Decimal,
    },
    /// New allocation and/or DNA for an existing agent
    Reconfigure {
        agent_id: Uuid,
        allocation: Option<Decimal>,
        dna_id: Option<Uuid>,
    },
    Reactivate {
        agent_id: Uuid,
    },
    /// Agent parked at its own request
    Park {
        agent_id: Uuid,
    },
    /// Soft failure; retried at the next reconciliation
    SpawnDeferred {
        reason: String,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub target_count: usize,
    pub actions: Vec<PoolAction>,
}

impl ReconcileReport {
    pub fn spawned(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.actions.iter().filter_map(|a| match a {
            PoolAction::Spawn { agent_id, .. } => Some(*agent_id),
            _ => None,
        })
    }

    pub fn retired(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.actions.iter().filter_map(|a| match a {
            PoolAction::Retire { agent_id, .. } => Some(*agent_id),
            _ => None,
        })
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned().count()
    }

    pub fn deferred_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, PoolAction::SpawnDeferred { .. }))
            .count()
    }
}

pub struct AgentPool {
    settings: PoolSettings,
    retirement: RetirementPolicy,
    agents: BTreeMap<Uuid, Agent>,
}

impl AgentPool {
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            retirement: RetirementPolicy::new(settings.max_consecutive_failures),
            settings,
            agents: BTreeMap::new(),
        }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn get(&self, agent_id: Uuid) -> Option<&Agent> {
        self.agents.get(&agent_id)
    }

    pub fn get_mut(&mut self, agent_id: Uuid) -> Option<&mut Agent> {
        self.agents.get_mut(&agent_id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn counts(&self) -> AgentCounts {
        self.agents.values().map(|a| a.status()).collect()
    }

    /// Agents executed this cycle
    pub fn dispatchable(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values().filter(|a| a.is_dispatchable())
    }

    pub fn total_allocation(&self) -> Decimal {
        self.agents.values().map(|a| a.capital_allocation()).sum()
    }

    pub fn unallocated(&self) -> Decimal {
        (Decimal::ONE - self.total_allocation()).max(Decimal::ZERO)
    }

    /// Pool size the tier asks for, capped by `max_agents`
    pub fn target_count(&self, ledger: &RevenueLedger) -> usize {
        ledger.tier().target_agents().min(self.settings.max_agents)
    }

    /// Check the allocation invariant
    pub fn validate(&self) -> std::result::Result<(), InvariantError> {
        if let Some(agent) = self.agents.values().find(|a| a.capital_allocation() < Decimal::ZERO) {
            return Err(InvariantError::NegativeAllocation {
                agent_id: agent.id(),
                allocation: agent.capital_allocation(),
            });
        }
        let total = self.total_allocation();
        if total > Decimal::ONE {
            return Err(InvariantError::AllocationExceeded { total });
        }
        Ok(())
    }

    /// Remove an agent without a reconciliation, e.g. when construction failed
    pub fn discard(&mut self, agent_id: Uuid) -> Option<Agent> {
        self.agents.remove(&agent_id)
    }

    /// Fold a cycle's outcomes and tracker fitness into the agents
    pub fn apply_outcomes(&mut self, outcomes: &[AgentOutcome], fitness: &[AgentFitness]) {
        for update in fitness {
            if let Some(agent) = self.agents.get_mut(&update.agent_id) {
                agent.record_performance(update.fitness, update.consecutive_failures);
                if self.retirement.should_fail(update.consecutive_failures) {
                    agent.request_status(StatusRequest::Failed);
                }
            }
        }
        for outcome in outcomes {
            let Some(agent) = self.agents.get_mut(&outcome.agent_id) else {
                continue;
            };
            if agent.status() == AgentStatus::Spawning {
                agent.set_status(AgentStatus::Active);
            }
            if let Some(request) = outcome.report.status_request {
                agent.request_status(request);
            }
        }
    }

    /// Reconcile the pool against the ledger and risk state
    ///
    /// `dna_pool` is the evolution engine's current population and
    /// `preference` the order in which agent kinds should be spawned.
    #[instrument(skip_all, fields(realized = %ledger.realized, mode = %risk.mode))]
    pub fn reconcile(
        &mut self,
        ledger: &RevenueLedger,
        risk: &RiskState,
        dna_pool: &[StrategyDna],
        preference: &[AgentKind],
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        self.honor_requests(&mut report);

        let failed: Vec<Uuid> = self
            .agents
            .values()
            .filter(|a| a.status() == AgentStatus::Failed)
            .map(|a| a.id())
            .collect();
        for id in failed {
            self.retire(id, RetireReason::Failed, &mut report);
        }

        if risk.mode == RiskMode::EmergencyStopped {
            let all: Vec<Uuid> = self.agents.keys().copied().collect();
            for id in all {
                self.retire(id, RetireReason::Emergency, &mut report);
            }
            if !report.actions.is_empty() {
                warn!(retired = report.actions.len(), "Emergency stop: all agents retired");
            }
            self.validate()?;
            return Ok(report);
        }

        let target = self.target_count(ledger);
        report.target_count = target;
        let current = self.dispatchable().count();

        if current > target {
            self.scale_down(current - target, &mut report);
        }
        self.retire_surplus_idle(target, &mut report);

        self.reassign_missing_dna(dna_pool, &mut report);

        if current < target {
            if risk.mode.allows_spawning() {
                self.scale_up(target, dna_pool, preference, &mut report);
            } else {
                let reason = PoolError::SpawnBlocked {
                    mode: risk.mode.to_string(),
                };
                debug!(%reason, "Below target, spawning suspended");
                report.actions.push(PoolAction::SpawnDeferred {
                    reason: reason.to_string(),
                });
            }
        }

        self.validate()?;

        info!(
            target,
            agents = self.dispatchable().count(),
            allocated = %self.total_allocation(),
            actions = report.actions.len(),
            "Pool reconciled"
        );
        Ok(report)
    }

    fn honor_requests(&mut self, report: &mut ReconcileReport) {
        for agent in self.agents.values_mut() {
            let Some(request) = agent.take_request() else {
                continue;
            };
            let status = AgentStatus::from(request);
            match status {
                AgentStatus::Failed => agent.set_status(AgentStatus::Failed),
                AgentStatus::Idle if agent.is_dispatchable() => {
                    agent.set_status(AgentStatus::Idle);
                    report.actions.push(PoolAction::Park { agent_id: agent.id() });
                }
                _ => {}
            }
        }
    }

    fn retire(&mut self, agent_id: Uuid, reason: RetireReason, report: &mut ReconcileReport) {
        if let Some(mut agent) = self.agents.remove(&agent_id) {
            agent.set_status(AgentStatus::Retiring);
            debug!(agent_id = %agent_id, kind = %agent.kind(), ?reason, "Agent retired");
            report.actions.push(PoolAction::Retire {
                agent_id,
                reason,
                released: agent.capital_allocation(),
            });
        }
    }

    fn scale_down(&mut self, excess: usize, report: &mut ReconcileReport) {
        let candidates: Vec<RetirementCandidate> = self
            .dispatchable()
            .map(|a| RetirementCandidate {
                id: a.id(),
                cumulative_fitness: a.cumulative_fitness(),
                status: a.status(),
            })
            .collect();
        for id in self.retirement.select_for_retirement(&candidates, excess) {
            self.retire(id, RetireReason::ScaleDown, report);
        }
    }

    /// Parked agents beyond what the target could take back release their capital
    fn retire_surplus_idle(&mut self, target: usize, report: &mut ReconcileReport) {
        let room = target.saturating_sub(self.dispatchable().count());
        let idle: Vec<RetirementCandidate> = self
            .agents
            .values()
            .filter(|a| a.status() == AgentStatus::Idle)
            .map(|a| RetirementCandidate {
                id: a.id(),
                cumulative_fitness: a.cumulative_fitness(),
                status: a.status(),
            })
            .collect();
        if idle.len() <= room {
            return;
        }
        for id in self.retirement.select_for_retirement(&idle, idle.len() - room) {
            self.retire(id, RetireReason::ScaleDown, report);
        }
    }

    fn used_dna(&self) -> HashSet<Uuid> {
        self.agents.values().map(|a| a.dna().id).collect()
    }

    /// Highest-fitness variant not held by any agent
    fn best_unused_dna(&self, dna_pool: &[StrategyDna]) -> Option<StrategyDna> {
        let used = self.used_dna();
        dna_pool
            .iter()
            .filter(|d| !used.contains(&d.id))
            .min_by(|a, b| rank_order(a, b))
            .cloned()
    }

    fn reassign_missing_dna(&mut self, dna_pool: &[StrategyDna], report: &mut ReconcileReport) {
        if dna_pool.is_empty() {
            return;
        }
        let live: HashSet<Uuid> = dna_pool.iter().map(|d| d.id).collect();
        let stale: Vec<Uuid> = self
            .agents
            .values()
            .filter(|a| !live.contains(&a.dna().id))
            .map(|a| a.id())
            .collect();

        for agent_id in stale {
            let Some(dna) = self.best_unused_dna(dna_pool) else {
                break;
            };
            let dna_id = dna.id;
            if let Some(agent) = self.agents.get_mut(&agent_id) {
                agent.set_dna(dna);
                report.actions.push(PoolAction::Reconfigure {
                    agent_id,
                    allocation: None,
                    dna_id: Some(dna_id),
                });
            }
        }
    }

    fn scale_up(
        &mut self,
        target: usize,
        dna_pool: &[StrategyDna],
        preference: &[AgentKind],
        report: &mut ReconcileReport,
    ) {
        // idle agents come back before anything new is spawned
        let mut idle: Vec<(Uuid, f64)> = self
            .agents
            .values()
            .filter(|a| a.status() == AgentStatus::Idle)
            .map(|a| (a.id(), a.cumulative_fitness()))
            .collect();
        idle.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut current = self.dispatchable().count();
        for (agent_id, _) in idle {
            if current >= target {
                break;
            }
            if let Some(agent) = self.agents.get_mut(&agent_id) {
                agent.set_status(AgentStatus::Active);
                report.actions.push(PoolAction::Reactivate { agent_id });
                current += 1;
            }
        }
        if current >= target {
            return;
        }

        let fair = (Decimal::ONE / Decimal::from(target))
            .round_dp_with_strategy(ALLOCATION_DP, RoundingStrategy::ToZero);
        if self.settings.rebalance {
            self.rebalance(fair, report);
        }

        let pending = target - current;
        for i in 0..pending {
            let Some(dna) = self.best_unused_dna(dna_pool) else {
                warn!("Spawn deferred: no unused DNA");
                report.actions.push(PoolAction::SpawnDeferred {
                    reason: PoolError::NoDnaAvailable.to_string(),
                });
                break;
            };

            let remaining = Decimal::from(pending - i);
            let mut share = (self.unallocated() / remaining)
                .round_dp_with_strategy(ALLOCATION_DP, RoundingStrategy::ToZero);
            if self.settings.rebalance {
                share = share.min(fair);
            }
            if share <= Decimal::ZERO {
                warn!(pending = pending - i, "Spawn deferred: no unallocated capital");
                report.actions.push(PoolAction::SpawnDeferred {
                    reason: PoolError::InsufficientCapital.to_string(),
                });
                break;
            }

            let kind = self.next_kind(preference);
            let agent = Agent::spawn(kind, dna, share);
            let agent_id = agent.id();
            report.actions.push(PoolAction::Spawn {
                agent_id,
                kind,
                dna_id: agent.dna().id,
                allocation: share,
            });
            debug!(agent_id = %agent_id, %kind, allocation = %share, "Agent spawned");
            self.agents.insert(agent_id, agent);
        }
    }

    fn rebalance(&mut self, fair: Decimal, report: &mut ReconcileReport) {
        for agent in self.agents.values_mut() {
            if agent.capital_allocation() > fair {
                agent.set_allocation(fair);
                report.actions.push(PoolAction::Reconfigure {
                    agent_id: agent.id(),
                    allocation: Some(fair),
                    dna_id: None,
                });
            }
        }
    }

    /// Kind with the fewest live agents; ties follow the preference order
    fn next_kind(&self, preference: &[AgentKind]) -> AgentKind {
        let kinds: &[AgentKind] = if preference.is_empty() {
            &self.settings.enabled_kinds
        } else {
            preference
        };
        let mut counts: BTreeMap<AgentKind, usize> = BTreeMap::new();
        for agent in self.agents.values() {
            *counts.entry(agent.kind()).or_insert(0) += 1;
        }
        kinds
            .iter()
            .filter(|k| self.settings.enabled_kinds.contains(k))
            .enumerate()
            .min_by_key(|(rank, k)| (counts.get(k).copied().unwrap_or(0), *rank))
            .map(|(_, k)| *k)
            .unwrap_or(AgentKind::Trading)
    }
}
