//! # Darwinian
//!
//! Strategy evolution and fitness engine for the Meridian control core.
//!
//! ## Generation Step
//!
//! ```text
//! rank by fitness ──► carry top decile (elite) unchanged
//!                 └─► fill remaining slots:
//!                       parents  ~ fitness-proportional (floor ε)
//!                       child    = single-point crossover(parent_a, parent_b)
//!                       child   += N(0, σ·span) per gene with p = mutation_rate, clamped
//! ```
//!
//! ## Fitness
//!
//! ```text
//! fitness_t = α × observation + (1 − α) × fitness_{t−1}
//! ```
//!
//! Agents whose executions fail `max_consecutive_failures` cycles in a row are
//! marked failed and retired by the pool.

pub mod culling;
pub mod evolution;
pub mod fitness;
pub mod weights;

use meridian_common::{
    EvolutionError, GeneBounds, DEFAULT_EVOLUTION_INTERVAL, DEFAULT_MUTATION_RATE,
};
use serde::{Deserialize, Serialize};

pub use culling::policy::{RetirementCandidate, RetirementPolicy};
pub use evolution::engine::{evolve_population, EvolutionEngine, EvolutionOutcome, EvolutionReport};
pub use fitness::calculator::{FitnessCalculator, FitnessSmoother};
pub use weights::KindWeights;

/// Darwinian configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DarwinianConfig {
    /// Number of DNA variants kept across generations
    pub population_size: usize,
    /// Fraction of the ranked population carried over unchanged
    pub elite_fraction: f64,
    /// Per-gene mutation probability
    pub mutation_rate: f64,
    /// Gaussian σ as a fraction of the gene's span
    pub mutation_scale: f64,
    /// Selection weight for variants with non-positive fitness
    pub selection_floor: f64,
    /// Evolve every N cycles
    pub evolution_interval: u64,
    /// RNG seed
    pub seed: u64,
    /// Bounds of each gene, in order
    pub gene_template: Vec<GeneBounds>,
}

impl Default for DarwinianConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            elite_fraction: 0.1,
            mutation_rate: DEFAULT_MUTATION_RATE,
            mutation_scale: 0.1,
            selection_floor: 1e-3,
            evolution_interval: DEFAULT_EVOLUTION_INTERVAL,
            seed: 42,
            gene_template: vec![GeneBounds::new(0.1, 2.0); 4],
        }
    }
}

impl DarwinianConfig {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), EvolutionError> {
        if self.gene_template.is_empty() {
            return Err(EvolutionError::InvalidTemplate("no genes declared".into()));
        }
        if let Some(pos) = self.gene_template.iter().position(|b| !b.is_valid()) {
            return Err(EvolutionError::InvalidTemplate(format!(
                "gene {} has invalid bounds",
                pos
            )));
        }
        if self.population_size == 0 {
            return Err(EvolutionError::InvalidTemplate("population_size must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(EvolutionError::InvalidTemplate("mutation_rate must be in [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.elite_fraction) {
            return Err(EvolutionError::InvalidTemplate("elite_fraction must be in [0, 1]".into()));
        }
        if !(self.selection_floor > 0.0 && self.selection_floor.is_finite()) {
            return Err(EvolutionError::InvalidTemplate("selection_floor must be > 0".into()));
        }
        if !(self.mutation_scale >= 0.0 && self.mutation_scale.is_finite()) {
            return Err(EvolutionError::InvalidTemplate("mutation_scale must be >= 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DarwinianConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let config = DarwinianConfig {
            gene_template: vec![GeneBounds::new(0.0, 1.0), GeneBounds::new(2.0, 1.0)],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EvolutionError::InvalidTemplate(_))));
    }

    #[test]
    fn test_rejects_mutation_rate_out_of_range() {
        let config = DarwinianConfig {
            mutation_rate: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
