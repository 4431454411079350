//! Pool-managed agent record

use meridian_common::{AgentKind, AgentStatus, StatusRequest, StrategyDna};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// An agent as the pool sees it
///
/// Status and allocation change only through the pool. The agent's own
/// execution may update fitness and leave a status request for the pool to
/// honor at the next reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    id: Uuid,
    kind: AgentKind,
    dna: StrategyDna,
    capital_allocation: Decimal,
    status: AgentStatus,
    cumulative_fitness: f64,
    consecutive_failures: u32,
    requested: Option<StatusRequest>,
}

impl Agent {
    pub(crate) fn spawn(kind: AgentKind, dna: StrategyDna, capital_allocation: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            dna,
            capital_allocation,
            status: AgentStatus::Spawning,
            cumulative_fitness: 0.0,
            consecutive_failures: 0,
            requested: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn dna(&self) -> &StrategyDna {
        &self.dna
    }

    pub fn capital_allocation(&self) -> Decimal {
        self.capital_allocation
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn cumulative_fitness(&self) -> f64 {
        self.cumulative_fitness
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Dispatched this cycle
    pub fn is_dispatchable(&self) -> bool {
        self.status.counts_toward_target()
    }

    /// Fitness and failure streak from the performance tracker
    pub fn record_performance(&mut self, cumulative_fitness: f64, consecutive_failures: u32) {
        self.cumulative_fitness = cumulative_fitness;
        self.consecutive_failures = consecutive_failures;
    }

    /// Leave a status request for the pool
    pub fn request_status(&mut self, request: StatusRequest) {
        // failed outranks idle
        if self.requested != Some(StatusRequest::Failed) {
            self.requested = Some(request);
        }
    }

    pub(crate) fn take_request(&mut self) -> Option<StatusRequest> {
        self.requested.take()
    }

    pub(crate) fn set_status(&mut self, status: AgentStatus) {
        self.status = status;
    }

    pub(crate) fn set_allocation(&mut self, allocation: Decimal) {
        self.capital_allocation = allocation;
    }

    pub(crate) fn set_dna(&mut self, dna: StrategyDna) {
        self.dna = dna;
    }
}
