//! Error types for the Meridian control core
//!
//! Provides a unified error type and domain-specific error variants.
//! Only [`InvariantError`] is fatal to the coordinating loop; every other
//! variant is expected to be handled by degrading gracefully.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using MeridianError
pub type Result<T> = std::result::Result<T, MeridianError>;

/// Unified error type for Meridian operations
#[derive(Debug, Error)]
pub enum MeridianError {
    // Pool errors
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    // Evolution errors
    #[error("Evolution error: {0}")]
    Evolution(#[from] EvolutionError),

    // External collaborator errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    // Agent registry errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // Fatal invariant violations
    #[error("Invariant violated: {0}")]
    Invariant(#[from] InvariantError),

    // The coordinating loop refuses to progress after a fatal error
    #[error("Cycle progression halted: {0}")]
    Halted(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MeridianError {
    /// Whether this error must stop cycle progression
    pub fn is_fatal(&self) -> bool {
        matches!(self, MeridianError::Invariant(_) | MeridianError::Halted(_))
    }
}

/// Agent pool errors (soft failures)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoolError {
    #[error("Spawn deferred: no unallocated capital remains")]
    InsufficientCapital,

    #[error("Spawn deferred: no unused strategy DNA available")]
    NoDnaAvailable,

    #[error("Spawn blocked while risk mode is {mode}")]
    SpawnBlocked { mode: String },
}

/// Evolution errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvolutionError {
    #[error("Population is empty")]
    EmptyPopulation,

    #[error("No population member has a numeric fitness")]
    NonNumericFitness,

    #[error("Invalid gene template: {0}")]
    InvalidTemplate(String),
}

/// Errors raised by external collaborators (exposure source, revenue feed, market signal)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Source returned malformed value: {0}")]
    Malformed(String),
}

/// Agent registry errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("No constructor registered for agent kind {0}")]
    UnregisteredKind(String),

    #[error("Agent construction failed: {0}")]
    Construction(String),
}

/// Fatal invariant violations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvariantError {
    #[error("Capital allocation sum {total} exceeds 1")]
    AllocationExceeded { total: Decimal },

    #[error("Negative capital allocation {allocation} for agent {agent_id}")]
    NegativeAllocation {
        agent_id: uuid::Uuid,
        allocation: Decimal,
    },

    #[error("Agent spawned while emergency-stopped")]
    SpawnDuringEmergency,
}

// Implement From for common external error types
impl From<serde_json::Error> for MeridianError {
    fn from(err: serde_json::Error) -> Self {
        MeridianError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for MeridianError {
    fn from(err: std::io::Error) -> Self {
        MeridianError::Source(SourceError::Unavailable(err.to_string()))
    }
}

impl From<anyhow::Error> for MeridianError {
    fn from(err: anyhow::Error) -> Self {
        MeridianError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let err = MeridianError::Invariant(InvariantError::AllocationExceeded { total: dec!(1.2) });
        assert!(err.to_string().contains("1.2"));
    }

    #[test]
    fn test_only_invariant_errors_are_fatal() {
        assert!(MeridianError::Invariant(InvariantError::SpawnDuringEmergency).is_fatal());
        assert!(MeridianError::Halted("allocation".into()).is_fatal());
        assert!(!MeridianError::Pool(PoolError::InsufficientCapital).is_fatal());
        assert!(!MeridianError::Evolution(EvolutionError::EmptyPopulation).is_fatal());
        assert!(!MeridianError::Source(SourceError::Unavailable("wallet".into())).is_fatal());
    }
}
