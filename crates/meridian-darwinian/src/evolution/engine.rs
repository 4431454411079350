//! Generational evolution over the strategy DNA population

use meridian_common::{EvolutionError, Gene, StrategyDna};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::operators::{crossover, elite_count, mutate, random_id, rank_order, ParentSampler};
use crate::DarwinianConfig;

/// Result of one generation step over a population
#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    /// Next population; unchanged input when the step was skipped
    pub population: Vec<StrategyDna>,
    /// Why the step was skipped, if it was
    pub degraded: Option<EvolutionError>,
    pub elites: usize,
    pub offspring: usize,
}

/// Produce the next generation from a population
///
/// Deterministic for a given population, config, and RNG state. An empty
/// population, or one where no variant has a numeric fitness, is returned
/// unchanged with the reason attached.
pub fn evolve_population<R: Rng + ?Sized>(
    population: &[StrategyDna],
    config: &DarwinianConfig,
    rng: &mut R,
) -> EvolutionOutcome {
    let unchanged = |reason: EvolutionError| EvolutionOutcome {
        population: population.to_vec(),
        degraded: Some(reason),
        elites: 0,
        offspring: 0,
    };

    if population.is_empty() {
        return unchanged(EvolutionError::EmptyPopulation);
    }
    if !population.iter().any(StrategyDna::has_numeric_fitness) {
        return unchanged(EvolutionError::NonNumericFitness);
    }

    let mut ranked = population.to_vec();
    ranked.sort_by(rank_order);

    let size = population.len();
    let elites = elite_count(size, config.elite_fraction);
    let mut next: Vec<StrategyDna> = ranked[..elites].to_vec();

    let sampler = ParentSampler::new(&ranked, config.selection_floor);
    while next.len() < size {
        let a = &ranked[sampler.sample(rng)];
        let b = &ranked[sampler.sample(rng)];

        let mut genes = crossover(a, b, rng);
        mutate(&mut genes, config.mutation_rate, config.mutation_scale, rng);

        let generation = a.generation.max(b.generation) + 1;
        next.push(StrategyDna::new(random_id(rng), genes, generation));
    }

    EvolutionOutcome {
        population: next,
        degraded: None,
        elites,
        offspring: size - elites,
    }
}

/// Summary of an evolution run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionReport {
    /// Highest generation present after the run
    pub generation: u64,
    pub best_fitness: f64,
    pub elites: usize,
    pub offspring: usize,
    /// Set when the run was skipped
    pub skipped: Option<String>,
}

/// Owns the authoritative DNA population and the seeded RNG
pub struct EvolutionEngine {
    config: DarwinianConfig,
    population: Vec<StrategyDna>,
    rng: StdRng,
    generations_run: u64,
}

impl EvolutionEngine {
    /// Create an engine with a random generation-zero population
    pub fn new(config: DarwinianConfig) -> Result<Self, EvolutionError> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let population = (0..config.population_size)
            .map(|_| {
                let genes = config
                    .gene_template
                    .iter()
                    .map(|bounds| {
                        let value = if bounds.span() > 0.0 {
                            rng.gen_range(bounds.lower..=bounds.upper)
                        } else {
                            bounds.lower
                        };
                        Gene::new(value, *bounds)
                    })
                    .collect();
                StrategyDna::new(random_id(&mut rng), genes, 0)
            })
            .collect();

        info!(
            population = config.population_size,
            genes = config.gene_template.len(),
            seed = config.seed,
            "Evolution engine initialized"
        );

        Ok(Self {
            config,
            population,
            rng,
            generations_run: 0,
        })
    }

    /// Create an engine over an existing population
    pub fn with_population(
        config: DarwinianConfig,
        population: Vec<StrategyDna>,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            population,
            rng,
            generations_run: 0,
        })
    }

    pub fn config(&self) -> &DarwinianConfig {
        &self.config
    }

    pub fn population(&self) -> &[StrategyDna] {
        &self.population
    }

    pub fn get(&self, dna_id: Uuid) -> Option<&StrategyDna> {
        self.population.iter().find(|d| d.id == dna_id)
    }

    pub fn contains(&self, dna_id: Uuid) -> bool {
        self.population.iter().any(|d| d.id == dna_id)
    }

    /// Highest generation in the population
    pub fn generation(&self) -> u64 {
        self.population.iter().map(|d| d.generation).max().unwrap_or(0)
    }

    /// Number of evolution steps that changed the population
    pub fn generations_run(&self) -> u64 {
        self.generations_run
    }

    /// Fittest variant by ranking order
    pub fn best(&self) -> Option<&StrategyDna> {
        self.population.iter().min_by(|a, b| rank_order(a, b))
    }

    /// Best numeric fitness, 0.0 when none exists
    pub fn best_fitness(&self) -> f64 {
        self.best()
            .filter(|d| d.has_numeric_fitness())
            .map(|d| d.fitness_score)
            .unwrap_or(0.0)
    }

    /// Store the latest fitness of a variant; false if it left the population
    pub fn record_fitness(&mut self, dna_id: Uuid, fitness: f64) -> bool {
        match self.population.iter_mut().find(|d| d.id == dna_id) {
            Some(dna) => {
                dna.fitness_score = fitness;
                true
            }
            None => false,
        }
    }

    /// Whether the cycle counter has reached an evolution boundary
    pub fn should_evolve(&self, cycle_count: u64) -> bool {
        self.config.evolution_interval > 0
            && cycle_count > 0
            && cycle_count % self.config.evolution_interval == 0
    }

    /// Run one generation step, replacing the population
    #[instrument(skip(self), fields(population = self.population.len()))]
    pub fn evolve(&mut self) -> EvolutionReport {
        let outcome = evolve_population(&self.population, &self.config, &mut self.rng);

        if let Some(reason) = &outcome.degraded {
            warn!(reason = %reason, "Evolution skipped, population unchanged");
            return EvolutionReport {
                generation: self.generation(),
                best_fitness: self.best_fitness(),
                elites: 0,
                offspring: 0,
                skipped: Some(reason.to_string()),
            };
        }

        self.population = outcome.population;
        self.generations_run += 1;

        let report = EvolutionReport {
            generation: self.generation(),
            best_fitness: self.best_fitness(),
            elites: outcome.elites,
            offspring: outcome.offspring,
            skipped: None,
        };
        debug!(
            generation = report.generation,
            elites = report.elites,
            offspring = report.offspring,
            "Population evolved"
        );
        report
    }

    /// Serialize the population, ranked, for external inspection
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        let mut ranked = self.population.clone();
        ranked.sort_by(rank_order);
        serde_json::to_string_pretty(&serde_json::json!({
            "generation": self.generation(),
            "generations_run": self.generations_run,
            "best_fitness": self.best_fitness(),
            "population": ranked,
        }))
    }
}
