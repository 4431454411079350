//! Selection, crossover, and mutation operators

use meridian_common::{Gene, StrategyDna};
use ordered_float::OrderedFloat;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_distr::Normal;
use std::cmp::Ordering;
use uuid::Uuid;

/// Number of variants carried over unchanged; at least one for a non-empty population
pub fn elite_count(population: usize, fraction: f64) -> usize {
    if population == 0 {
        return 0;
    }
    ((population as f64 * fraction).ceil() as usize).clamp(1, population)
}

/// Ranking order: fitness descending, then lowest generation, then id
pub fn rank_order(a: &StrategyDna, b: &StrategyDna) -> Ordering {
    OrderedFloat(b.ranking_fitness())
        .cmp(&OrderedFloat(a.ranking_fitness()))
        .then(a.generation.cmp(&b.generation))
        .then(a.id.cmp(&b.id))
}

/// Fitness-proportional weight; non-positive or non-numeric fitness gets the floor
#[inline]
pub fn selection_weight(dna: &StrategyDna, floor: f64) -> f64 {
    if dna.fitness_score.is_finite() && dna.fitness_score > 0.0 {
        dna.fitness_score.max(floor)
    } else {
        floor
    }
}

/// Roulette-wheel parent sampler over a ranked population
pub struct ParentSampler {
    index: Option<WeightedIndex<f64>>,
    len: usize,
}

impl ParentSampler {
    pub fn new(population: &[StrategyDna], floor: f64) -> Self {
        let weights: Vec<f64> = population.iter().map(|d| selection_weight(d, floor)).collect();
        Self {
            index: WeightedIndex::new(&weights).ok(),
            len: population.len(),
        }
    }

    /// Sample a parent index; falls back to uniform when weights are unusable
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match &self.index {
            Some(index) => index.sample(rng),
            None => rng.gen_range(0..self.len),
        }
    }
}

/// Single-point crossover with a uniformly random split
///
/// Genes before the split come from `a`, the rest from `b`. Parents with
/// different gene counts cannot be aligned; the child copies the fitter one.
pub fn crossover<R: Rng + ?Sized>(a: &StrategyDna, b: &StrategyDna, rng: &mut R) -> Vec<Gene> {
    if a.genes.len() != b.genes.len() {
        let fitter = if rank_order(a, b) != Ordering::Greater { a } else { b };
        return fitter.genes.clone();
    }

    let split = rng.gen_range(0..=a.genes.len());
    a.genes[..split]
        .iter()
        .chain(b.genes[split..].iter())
        .copied()
        .collect()
}

/// Gaussian point mutation, clamped to each gene's bounds
pub fn mutate<R: Rng + ?Sized>(genes: &mut [Gene], rate: f64, scale: f64, rng: &mut R) -> usize {
    let mut mutated = 0;
    for gene in genes.iter_mut() {
        if rng.gen::<f64>() >= rate {
            continue;
        }
        let sigma = scale * gene.bounds.span();
        if let Ok(normal) = Normal::new(0.0, sigma) {
            let noise: f64 = normal.sample(rng);
            gene.set(gene.value + noise);
            mutated += 1;
        }
    }
    mutated
}

/// Deterministic id drawn from the evolution RNG
pub fn random_id<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::GeneBounds;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dna(values: &[f64], fitness: f64, generation: u64) -> StrategyDna {
        let bounds = GeneBounds::new(0.0, 10.0);
        let mut d = StrategyDna::new(
            Uuid::new_v4(),
            values.iter().map(|v| Gene::new(*v, bounds)).collect(),
            generation,
        );
        d.fitness_score = fitness;
        d
    }

    #[test]
    fn test_elite_count_is_top_decile_rounded_up() {
        assert_eq!(elite_count(0, 0.1), 0);
        assert_eq!(elite_count(5, 0.1), 1);
        assert_eq!(elite_count(10, 0.1), 1);
        assert_eq!(elite_count(20, 0.1), 2);
        assert_eq!(elite_count(25, 0.1), 3);
    }

    #[test]
    fn test_rank_order_ties() {
        let mut a = dna(&[1.0], 5.0, 3);
        let mut b = dna(&[1.0], 5.0, 1);
        assert_eq!(rank_order(&a, &b), Ordering::Greater);

        b.generation = 3;
        a.id = Uuid::from_u128(1);
        b.id = Uuid::from_u128(2);
        assert_eq!(rank_order(&a, &b), Ordering::Less);

        let nan = dna(&[1.0], f64::NAN, 0);
        assert_eq!(rank_order(&a, &nan), Ordering::Less);
    }

    #[test]
    fn test_selection_floor() {
        assert_eq!(selection_weight(&dna(&[1.0], -3.0, 0), 0.01), 0.01);
        assert_eq!(selection_weight(&dna(&[1.0], 0.0, 0), 0.01), 0.01);
        assert_eq!(selection_weight(&dna(&[1.0], f64::NAN, 0), 0.01), 0.01);
        assert_eq!(selection_weight(&dna(&[1.0], 4.0, 0), 0.01), 4.0);
    }

    #[test]
    fn test_floor_keeps_poor_variants_selectable() {
        let population = vec![dna(&[1.0], 1.0, 0), dna(&[2.0], -5.0, 0)];
        let sampler = ParentSampler::new(&population, 0.5);
        let mut rng = StdRng::seed_from_u64(7);
        let picks: Vec<usize> = (0..500).map(|_| sampler.sample(&mut rng)).collect();
        assert!(picks.contains(&0));
        assert!(picks.contains(&1));
    }

    #[test]
    fn test_crossover_takes_prefix_and_suffix() {
        let a = dna(&[1.0, 1.0, 1.0, 1.0], 1.0, 0);
        let b = dna(&[9.0, 9.0, 9.0, 9.0], 1.0, 0);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let child = crossover(&a, &b, &mut rng);
            assert_eq!(child.len(), 4);
            let values: Vec<f64> = child.iter().map(|g| g.value).collect();
            let split = values.iter().take_while(|v| **v == 1.0).count();
            assert!(values[split..].iter().all(|v| *v == 9.0));
        }
    }

    #[test]
    fn test_crossover_mismatched_lengths_copies_fitter() {
        let a = dna(&[1.0, 1.0], 1.0, 0);
        let b = dna(&[9.0, 9.0, 9.0], 3.0, 0);
        let mut rng = StdRng::seed_from_u64(3);
        let child = crossover(&a, &b, &mut rng);
        assert_eq!(child.len(), 3);
    }

    #[test]
    fn test_mutation_respects_bounds() {
        let mut genes = vec![Gene::new(9.9, GeneBounds::new(0.0, 10.0)); 50];
        let mut rng = StdRng::seed_from_u64(5);
        let mutated = mutate(&mut genes, 1.0, 5.0, &mut rng);
        assert_eq!(mutated, 50);
        assert!(genes.iter().all(|g| g.value >= 0.0 && g.value <= 10.0));
    }

    #[test]
    fn test_zero_rate_never_mutates() {
        let mut genes = vec![Gene::new(1.0, GeneBounds::new(0.0, 10.0)); 10];
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(mutate(&mut genes, 0.0, 0.1, &mut rng), 0);
        assert!(genes.iter().all(|g| g.value == 1.0));
    }

    #[test]
    fn test_random_id_is_deterministic() {
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        assert_eq!(random_id(&mut a), random_id(&mut b));
    }
}
