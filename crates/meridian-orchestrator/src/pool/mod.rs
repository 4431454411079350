//! Agent pool: population records and the scaling controller

pub mod agent;
pub mod manager;

pub use self::agent::Agent;
pub use self::manager::{AgentPool, PoolAction, ReconcileReport, RetireReason};
