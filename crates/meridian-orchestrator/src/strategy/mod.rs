//! Strategy agents: the execution contract and the closed registry of kinds

pub mod registry;
pub mod simulated;

use async_trait::async_trait;
use meridian_common::{AgentKind, ExecutionReport, ExecutionRequest, Result};

pub use self::registry::{AgentConstructor, AgentRegistry};
pub use self::simulated::SimulatedAgent;

/// Trait for pluggable strategy implementations
///
/// Implementations must return before `request.deadline`; the executor
/// cancels them at the cycle's planned duration either way.
#[async_trait]
pub trait StrategyAgent: Send + Sync {
    /// Kind this implementation serves
    fn kind(&self) -> AgentKind;

    /// Execute one cycle of work
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionReport>;
}
