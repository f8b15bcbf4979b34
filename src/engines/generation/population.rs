//! Population bookkeeping and the generation step.

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::genome::StrategyGenome;
use super::operators::{compare_rank, crossover, mutate, random_genome, tournament_selection};
use crate::config::EvolutionConfig;
use crate::engines::evaluation::FitnessRecord;
use crate::error::{EvolverError, Result};

/// How an individual entered its population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Random,
    Seeded,
    Elite,
    Offspring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub genome: StrategyGenome,
    pub fitness: Option<FitnessRecord>,
    pub origin: Origin,
}

impl Individual {
    pub fn new(genome: StrategyGenome, origin: Origin) -> Self {
        Self {
            genome,
            fitness: None,
            origin,
        }
    }

    /// Score used for ranking; unscored individuals rank below everything.
    pub fn score(&self) -> f64 {
        self.fitness.map_or(f64::NEG_INFINITY, |f| f.score)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Population {
    individuals: Vec<Individual>,
}

impl Population {
    pub fn new(individuals: Vec<Individual>) -> Self {
        Self { individuals }
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub(crate) fn individuals_mut(&mut self) -> &mut [Individual] {
        &mut self.individuals
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn genomes(&self) -> impl Iterator<Item = &StrategyGenome> {
        self.individuals.iter().map(|i| &i.genome)
    }

    /// Indices ordered best first.
    pub fn ranked_indices(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.individuals.len()).collect();
        order.sort_by(|&a, &b| compare_rank(&self.individuals, a, b));
        order
    }

    pub fn best(&self) -> Option<&Individual> {
        self.ranked_indices().first().map(|&i| &self.individuals[i])
    }

    pub fn unscored(&self) -> usize {
        self.individuals.iter().filter(|i| i.fitness.is_none()).count()
    }
}

/// Immutable snapshot of one completed generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub index: usize,
    pub population: Population,
    pub best_fitness: f64,
    pub worst_fitness: f64,
    pub mean_fitness: f64,
}

impl Generation {
    pub fn snapshot(index: usize, population: Population) -> Self {
        let scores: Vec<f64> = population
            .individuals()
            .iter()
            .filter_map(|i| i.fitness.map(|f| f.score))
            .collect();

        let (best_fitness, worst_fitness, mean_fitness) = if scores.is_empty() {
            (f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY)
        } else {
            (
                scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                scores.iter().copied().fold(f64::INFINITY, f64::min),
                scores.iter().sum::<f64>() / scores.len() as f64,
            )
        };

        Self {
            index,
            population,
            best_fitness,
            worst_fitness,
            mean_fitness,
        }
    }

    pub fn best(&self) -> Option<&Individual> {
        self.population.best()
    }
}

/// Builds populations and performs the select → crossover → mutate step.
#[derive(Debug, Clone)]
pub struct PopulationManager {
    config: EvolutionConfig,
}

impl PopulationManager {
    pub fn new(config: EvolutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// `size` random genomes of up to `complexity_bound` genes each.
    pub fn initialize<R: Rng>(&self, size: usize, complexity_bound: usize, rng: &mut R) -> Result<Population> {
        self.initialize_seeded(&[], size, complexity_bound, rng)
    }

    /// Like [`initialize`](Self::initialize), but the population starts from
    /// `seeds`. Duplicates and genomes that break the bound are discarded
    /// and replaced by random genomes.
    pub fn initialize_seeded<R: Rng>(
        &self,
        seeds: &[StrategyGenome],
        size: usize,
        complexity_bound: usize,
        rng: &mut R,
    ) -> Result<Population> {
        if size == 0 {
            return Err(EvolverError::InvalidConfiguration(
                "population_size must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut individuals = Vec::with_capacity(size);
        for seed in seeds {
            if individuals.len() == size {
                break;
            }
            if let Err(e) = seed.validate(complexity_bound) {
                debug!("Discarding seed genome: {}", e);
                continue;
            }
            if seen.insert(seed.id()) {
                individuals.push(Individual::new(seed.clone(), Origin::Seeded));
            }
        }

        while individuals.len() < size {
            individuals.push(Individual::new(random_genome(complexity_bound, rng)?, Origin::Random));
        }

        Ok(Population::new(individuals))
    }

    /// `count` parents by independent tournaments.
    pub fn select_parents<R: Rng>(&self, population: &Population, count: usize, rng: &mut R) -> Vec<StrategyGenome> {
        if population.is_empty() {
            return Vec::new();
        }
        (0..count)
            .map(|_| {
                let idx = tournament_selection(population.individuals(), self.config.tournament_size, rng);
                population.individuals()[idx].genome.clone()
            })
            .collect()
    }

    /// Elites carried unchanged with their records, the rest bred from
    /// tournament winners. The result always holds `population_size`
    /// individuals.
    pub fn next_generation<R: Rng>(
        &self,
        population: &Population,
        elitism_count: usize,
        rng: &mut R,
    ) -> Result<Population> {
        let size = self.config.population_size;
        if elitism_count > size {
            return Err(EvolverError::InvalidConfiguration(format!(
                "elitism_count {} exceeds population_size {}",
                elitism_count, size
            )));
        }
        if population.is_empty() {
            return self.initialize(size, self.config.strategy_complexity, rng);
        }

        let mut next: Vec<Individual> = population
            .ranked_indices()
            .into_iter()
            .take(elitism_count)
            .map(|i| Individual {
                origin: Origin::Elite,
                ..population.individuals()[i].clone()
            })
            .collect();

        while next.len() < size {
            let parents = self.select_parents(population, 2, rng);
            let bred = crossover(
                &parents[0],
                &parents[1],
                self.config.crossover_rate,
                self.config.crossover_method,
                self.config.strategy_complexity,
                rng,
            );

            match bred {
                Ok((child_a, child_b)) => {
                    for child in [child_a, child_b] {
                        if next.len() < size {
                            let child = mutate(&child, self.config.mutation_rate, rng);
                            next.push(Individual::new(child, Origin::Offspring));
                        }
                    }
                }
                Err(e) => {
                    debug!("Replacing invalid offspring: {}", e);
                    next.push(Individual::new(
                        random_genome(self.config.strategy_complexity, rng)?,
                        Origin::Random,
                    ));
                }
            }
        }

        Ok(Population::new(next))
    }
}
