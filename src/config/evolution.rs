use super::traits::{probability, ConfigSection};
use crate::error::{EvolverError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub elitism_count: usize,
    /// Maximum number of genes per strategy
    pub strategy_complexity: usize,
    pub tournament_size: usize,
    pub crossover_method: CrossoverMethod,
    /// Generations without improvement before stopping early; 0 disables.
    pub convergence_patience: usize,
    pub convergence_epsilon: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverMethod {
    /// Independent cut point per parent, tails exchanged.
    OnePoint,
    /// Aligned genes swapped with probability 1/2.
    Uniform,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            generations: 50,
            mutation_rate: 0.15,
            crossover_rate: 0.85,
            elitism_count: 5,
            strategy_complexity: 10,
            tournament_size: 3,
            crossover_method: CrossoverMethod::OnePoint,
            convergence_patience: 10,
            convergence_epsilon: 1e-6,
            seed: None,
        }
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(EvolverError::InvalidConfiguration(
                "Population size must be greater than 0".to_string(),
            ));
        }
        if self.generations == 0 {
            return Err(EvolverError::InvalidConfiguration(
                "Generations must be greater than 0".to_string(),
            ));
        }
        probability(Self::section_name(), "mutation_rate", self.mutation_rate)?;
        probability(Self::section_name(), "crossover_rate", self.crossover_rate)?;
        if self.elitism_count > self.population_size {
            return Err(EvolverError::InvalidConfiguration(format!(
                "Elitism count {} exceeds population size {}",
                self.elitism_count, self.population_size
            )));
        }
        if self.strategy_complexity == 0 {
            return Err(EvolverError::InvalidConfiguration(
                "Strategy complexity must be greater than 0".to_string(),
            ));
        }
        if self.tournament_size == 0 {
            return Err(EvolverError::InvalidConfiguration(
                "Tournament size must be at least 1".to_string(),
            ));
        }
        if !self.convergence_epsilon.is_finite() || self.convergence_epsilon < 0.0 {
            return Err(EvolverError::InvalidConfiguration(
                "Convergence epsilon must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}
