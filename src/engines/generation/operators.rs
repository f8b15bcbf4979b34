//! Genetic operators over [`StrategyGenome`].
//!
//! All operators are free functions generic over the RNG so a seeded
//! `StdRng` reproduces a whole run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

use super::gene::Gene;
use super::genome::{Aggregation, StrategyGenome};
use super::population::Individual;
use crate::config::CrossoverMethod;
use crate::error::{EvolverError, Result};

/// Random genome with `1..=complexity_bound` genes.
pub fn random_genome<R: Rng>(complexity_bound: usize, rng: &mut R) -> Result<StrategyGenome> {
    if complexity_bound == 0 {
        return Err(EvolverError::InvalidConfiguration(
            "strategy_complexity must be greater than 0".to_string(),
        ));
    }
    let length = rng.gen_range(1..=complexity_bound);
    let genes = (0..length).map(|_| Gene::random(rng)).collect();
    StrategyGenome::new(genes, Aggregation::random(rng), complexity_bound)
}

/// Seeded variant of [`random_genome`].
pub fn create_random(complexity_bound: usize, rng_seed: u64) -> Result<StrategyGenome> {
    random_genome(complexity_bound, &mut StdRng::seed_from_u64(rng_seed))
}

/// Recombine two parents with probability `rate`; otherwise return copies.
///
/// One-point: each parent gets its own cut in `1..=len`, so every head keeps
/// at least one gene. `child_a = head(a) ++ tail(b)`,
/// `child_b = head(b) ++ tail(a)`. A child longer than `complexity_bound`
/// keeps its first `complexity_bound` genes; the dropped genes are always the
/// highest-index genes of the spliced tail.
///
/// Uniform: aligned positions swap with probability 0.5, lengths unchanged.
///
/// Children inherit the aggregation of the parent that supplied their head
/// (position 0 for uniform).
pub fn crossover<R: Rng>(
    parent_a: &StrategyGenome,
    parent_b: &StrategyGenome,
    rate: f64,
    method: CrossoverMethod,
    complexity_bound: usize,
    rng: &mut R,
) -> Result<(StrategyGenome, StrategyGenome)> {
    if rng.gen::<f64>() >= rate {
        return Ok((parent_a.clone(), parent_b.clone()));
    }

    let (a, b) = (parent_a.genes(), parent_b.genes());
    let (genes_a, genes_b) = match method {
        CrossoverMethod::OnePoint => {
            let cut_a = rng.gen_range(1..=a.len());
            let cut_b = rng.gen_range(1..=b.len());
            (
                splice(a, cut_a, b, cut_b, complexity_bound),
                splice(b, cut_b, a, cut_a, complexity_bound),
            )
        }
        CrossoverMethod::Uniform => {
            let mut child_a = a.to_vec();
            let mut child_b = b.to_vec();
            for i in 0..a.len().min(b.len()) {
                if rng.gen_bool(0.5) {
                    std::mem::swap(&mut child_a[i], &mut child_b[i]);
                }
            }
            (child_a, child_b)
        }
    };

    Ok((
        StrategyGenome::new(genes_a, parent_a.aggregation(), complexity_bound)?,
        StrategyGenome::new(genes_b, parent_b.aggregation(), complexity_bound)?,
    ))
}

/// `head[..cut_head] ++ tail[cut_tail..]`, cut back to `complexity_bound` genes.
fn splice(head: &[Gene], cut_head: usize, tail: &[Gene], cut_tail: usize, complexity_bound: usize) -> Vec<Gene> {
    head[..cut_head]
        .iter()
        .chain(&tail[cut_tail..])
        .take(complexity_bound)
        .cloned()
        .collect()
}

/// Replace each gene, independently with probability `rate`, by a freshly
/// sampled gene. The input genome is left untouched.
pub fn mutate<R: Rng>(genome: &StrategyGenome, rate: f64, rng: &mut R) -> StrategyGenome {
    genome.map_genes(|gene| {
        if rng.gen::<f64>() < rate {
            Gene::random(rng)
        } else {
            gene.clone()
        }
    })
}

/// Ranking order between two members of a population: higher score first,
/// then fewer genes, then earlier position. Unscored members rank last.
pub fn compare_rank(population: &[Individual], a: usize, b: usize) -> Ordering {
    population[b]
        .score()
        .total_cmp(&population[a].score())
        .then_with(|| population[a].genome.len().cmp(&population[b].genome.len()))
        .then_with(|| a.cmp(&b))
}

/// Tournament selection: best of `tournament_size` uniform draws (with
/// replacement). Returns the winner's index.
pub fn tournament_selection<R: Rng>(population: &[Individual], tournament_size: usize, rng: &mut R) -> usize {
    let mut best_idx = rng.gen_range(0..population.len());

    for _ in 1..tournament_size {
        let idx = rng.gen_range(0..population.len());
        if compare_rank(population, idx, best_idx) == Ordering::Less {
            best_idx = idx;
        }
    }

    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::evaluation::FitnessRecord;
    use crate::engines::generation::gene::Comparison;
    use crate::engines::generation::population::Origin;
    use crate::functions::indicators::Indicator;

    fn gene(period: usize) -> Gene {
        Gene::new(Indicator::PriceToSma { period }, Comparison::GreaterThan, 0.0, 0.5).unwrap()
    }

    /// Genes tagged by SMA period so positions can be traced through crossover.
    fn tagged(periods: &[usize], bound: usize) -> StrategyGenome {
        StrategyGenome::new(
            periods.iter().map(|&p| gene(p)).collect(),
            Aggregation::WeightedVote { threshold: 0.5 },
            bound,
        )
        .unwrap()
    }

    fn periods(genome: &StrategyGenome) -> Vec<usize> {
        genome
            .genes()
            .iter()
            .map(|g| match *g.indicator() {
                Indicator::PriceToSma { period } => period,
                _ => unreachable!(),
            })
            .collect()
    }

    fn scored(genome: StrategyGenome, score: Option<f64>) -> Individual {
        Individual {
            genome,
            fitness: score.map(|score| FitnessRecord {
                score,
                max_drawdown: 0.0,
                win_rate: 0.0,
                trade_count: 1,
                total_return: 0.0,
            }),
            origin: Origin::Random,
        }
    }

    #[test]
    fn test_create_random_rejects_zero_complexity() {
        assert!(matches!(create_random(0, 1), Err(EvolverError::InvalidConfiguration(_))));
        let genome = create_random(6, 1).unwrap();
        assert!((1..=6).contains(&genome.len()));
        assert_eq!(genome, create_random(6, 1).unwrap());
    }

    #[test]
    fn test_offspring_never_exceed_the_bound() {
        let mut rng = StdRng::seed_from_u64(21);
        for bound in 1..=8 {
            for _ in 0..300 {
                let a = random_genome(bound, &mut rng).unwrap();
                let b = random_genome(bound, &mut rng).unwrap();
                for method in [CrossoverMethod::OnePoint, CrossoverMethod::Uniform] {
                    let (c, d) = crossover(&a, &b, 1.0, method, bound, &mut rng).unwrap();
                    assert!(c.len() <= bound && d.len() <= bound);
                    assert!(!c.is_empty() && !d.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_truncation_drops_the_highest_index_tail_genes() {
        let bound = 4;
        let a = tagged(&[2, 3, 4, 5], bound);
        let b = tagged(&[10, 11, 12, 13], bound);
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..500 {
            let (c, d) = crossover(&a, &b, 1.0, CrossoverMethod::OnePoint, bound, &mut rng).unwrap();
            for (child, head_parent, tail_parent) in [(&c, &a, &b), (&d, &b, &a)] {
                let genes = periods(child);
                let head = periods(head_parent);
                let tail = periods(tail_parent);
                // The child is a prefix of head(p) followed by a suffix of the other parent.
                let head_len = genes.iter().take_while(|p| head.contains(p)).count();
                assert!(head_len >= 1);
                assert_eq!(&genes[..head_len], &head[..head_len]);
                let spliced = &genes[head_len..];
                if let Some(&first) = spliced.first() {
                    let start = tail.iter().position(|&p| p == first).unwrap();
                    assert_eq!(spliced, &tail[start..start + spliced.len()]);
                }
            }
        }
    }

    #[test]
    fn test_oversized_splice_keeps_the_first_genes() {
        let a = tagged(&[2, 3, 4, 5], 4);
        let b = tagged(&[10, 11, 12, 13], 4);

        let child = splice(a.genes(), 3, b.genes(), 1, 4);
        let child = StrategyGenome::new(child, a.aggregation(), 4).unwrap();
        assert_eq!(periods(&child), vec![2, 3, 4, 11]);

        let child = splice(b.genes(), 1, a.genes(), 3, 4);
        let child = StrategyGenome::new(child, b.aggregation(), 4).unwrap();
        assert_eq!(periods(&child), vec![10, 5]);
    }

    #[test]
    fn test_rate_zero_returns_copies() {
        let a = tagged(&[2, 3], 4);
        let b = tagged(&[10], 4);
        let mut rng = StdRng::seed_from_u64(9);
        let (c, d) = crossover(&a, &b, 0.0, CrossoverMethod::OnePoint, 4, &mut rng).unwrap();
        assert_eq!((c, d), (a, b));
    }

    #[test]
    fn test_mutation_frequency_matches_rate() {
        let genome = tagged(&[2, 3, 4, 5, 6], 5);
        let mut rng = StdRng::seed_from_u64(77);
        let rate = 0.2;
        let trials = 10_000;

        let mut changed = 0usize;
        for _ in 0..trials {
            let mutant = mutate(&genome, rate, &mut rng);
            assert_eq!(mutant.len(), genome.len());
            changed += genome.genes().iter().zip(mutant.genes()).filter(|(a, b)| a != b).count();
        }

        let observed = changed as f64 / (trials * genome.len()) as f64;
        assert!((observed - rate).abs() < 0.01, "observed {}", observed);
    }

    #[test]
    fn test_tournament_ties_prefer_simpler_then_earlier() {
        let population = vec![
            scored(tagged(&[2, 3], 4), Some(1.0)),
            scored(tagged(&[2], 4), Some(1.0)),
            scored(tagged(&[4], 4), Some(1.0)),
            scored(tagged(&[5], 4), None),
        ];
        assert_eq!(compare_rank(&population, 1, 0), Ordering::Less);
        assert_eq!(compare_rank(&population, 1, 2), Ordering::Less);
        assert_eq!(compare_rank(&population, 2, 3), Ordering::Less);

        let mut rng = StdRng::seed_from_u64(3);
        // A tournament covering the population always returns the top rank.
        let mut wins = [0usize; 4];
        for _ in 0..1_000 {
            wins[tournament_selection(&population, 64, &mut rng)] += 1;
        }
        assert_eq!(wins[1], 1_000);
    }
}
