//! Strategy DNA - the evolvable parameter vector of an agent
//!
//! Gene semantics are strategy-specific. The core only knows that each gene is
//! a real value constrained to declared bounds.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declared valid range of a gene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneBounds {
    pub lower: f64,
    pub upper: f64,
}

impl GeneBounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Width of the valid range
    #[inline]
    pub fn span(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn is_valid(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite() && self.lower <= self.upper
    }

    /// Clamp a value into the range; non-finite values collapse to the lower bound
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.lower;
        }
        value.clamp(self.lower, self.upper)
    }
}

/// A single bounded gene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    pub value: f64,
    pub bounds: GeneBounds,
}

impl Gene {
    /// Create a gene, clamping the value into its bounds
    pub fn new(value: f64, bounds: GeneBounds) -> Self {
        Self {
            value: bounds.clamp(value),
            bounds,
        }
    }

    /// Replace the value, clamping into bounds
    pub fn set(&mut self, value: f64) {
        self.value = self.bounds.clamp(value);
    }
}

/// Strategy parameter set subject to evolutionary search
///
/// Owned by exactly one agent at a time. The evolution engine keeps the
/// authoritative population and hands out copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDna {
    /// Stable identity of this variant
    pub id: Uuid,
    /// Ordered gene vector
    pub genes: Vec<Gene>,
    /// Generation in which this variant was produced
    pub generation: u64,
    /// Last evaluated fitness
    pub fitness_score: f64,
}

impl StrategyDna {
    pub fn new(id: Uuid, genes: Vec<Gene>, generation: u64) -> Self {
        Self {
            id,
            genes,
            generation,
            fitness_score: 0.0,
        }
    }

    /// Gene values in order
    pub fn parameters(&self) -> Vec<f64> {
        self.genes.iter().map(|g| g.value).collect()
    }

    /// Whether the fitness score can take part in ranking
    #[inline]
    pub fn has_numeric_fitness(&self) -> bool {
        self.fitness_score.is_finite()
    }

    /// Fitness used for ranking; non-numeric scores rank last
    #[inline]
    pub fn ranking_fitness(&self) -> f64 {
        if self.has_numeric_fitness() {
            self.fitness_score
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Whether every gene sits inside its bounds
    pub fn is_within_bounds(&self) -> bool {
        self.genes
            .iter()
            .all(|g| g.value >= g.bounds.lower && g.value <= g.bounds.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gene_clamps_on_creation() {
        let bounds = GeneBounds::new(0.1, 2.0);
        assert_eq!(Gene::new(5.0, bounds).value, 2.0);
        assert_eq!(Gene::new(-1.0, bounds).value, 0.1);
        assert_eq!(Gene::new(f64::NAN, bounds).value, 0.1);
    }

    #[test]
    fn test_ranking_fitness_sinks_nan() {
        let mut dna = StrategyDna::new(Uuid::nil(), vec![], 0);
        dna.fitness_score = f64::NAN;
        assert!(!dna.has_numeric_fitness());
        assert_eq!(dna.ranking_fitness(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_bounds_validity() {
        assert!(GeneBounds::new(0.0, 1.0).is_valid());
        assert!(!GeneBounds::new(1.0, 0.0).is_valid());
        assert!(!GeneBounds::new(0.0, f64::INFINITY).is_valid());
    }
}
