use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{ConfigSection, EvolutionConfig, RiskConfig};
use crate::engines::evaluation::{FitnessEvaluator, FitnessRecord};
use crate::engines::generation::{
    genome::{GenomeId, StrategyGenome},
    population::{Generation, Population, PopulationManager},
    progress::LogProgressCallback,
};
use crate::engines::risk::RiskFilter;
use crate::error::{EvolverError, Result};
use crate::functions::indicators::MAX_LOOKBACK;
use crate::types::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initialized,
    Running,
    /// Best fitness stopped improving for `convergence_patience` generations
    Converged,
    /// `generations` completed
    Exhausted,
    /// Stop requested through the [`CancelToken`]
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converged | Self::Exhausted | Self::Cancelled)
    }
}

/// Cooperative stop signal, checked between generations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, generation: usize);
    fn on_generation_complete(&mut self, generation: &Generation);
}

/// Result of a finished run. `genome` and `record` come from the last fully
/// completed generation.
#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    pub state: RunState,
    pub genome: StrategyGenome,
    pub record: FitnessRecord,
    pub generation_index: usize,
    pub generations_completed: usize,
    /// Best score of every completed generation, in order
    pub best_history: Vec<f64>,
    pub final_population: Population,
}

/// Drives one evolution run over one data window. Owns the working
/// population exclusively; only the current and previous generation are
/// retained.
pub struct EvolutionController {
    config: EvolutionConfig,
    manager: PopulationManager,
    evaluator: FitnessEvaluator,
    rng: StdRng,
    state: RunState,
    current: Option<Generation>,
    previous: Option<Generation>,
    cancel: CancelToken,
}

impl EvolutionController {
    pub fn new(config: EvolutionConfig, risk: RiskConfig) -> Result<Self> {
        config.validate()?;
        let evaluator = FitnessEvaluator::new(RiskFilter::new(risk)?);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            manager: PopulationManager::new(config.clone()),
            config,
            evaluator,
            rng,
            state: RunState::Initialized,
            current: None,
            previous: None,
            cancel: CancelToken::new(),
        })
    }

    /// Reseed the RNG, overriding `config.seed`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn current_generation(&self) -> Option<&Generation> {
        self.current.as_ref()
    }

    pub fn previous_generation(&self) -> Option<&Generation> {
        self.previous.as_ref()
    }

    pub fn evaluator(&self) -> &FitnessEvaluator {
        &self.evaluator
    }

    pub fn run(&mut self, window: &[Candle]) -> Result<EvolutionOutcome> {
        self.run_with(window, &[], &mut LogProgressCallback::default())
    }

    /// Warm start from earlier genomes, typically the previous run's final
    /// population.
    pub fn run_seeded(&mut self, window: &[Candle], seeds: &[StrategyGenome]) -> Result<EvolutionOutcome> {
        self.run_with(window, seeds, &mut LogProgressCallback::default())
    }

    pub fn run_with<C: ProgressCallback>(
        &mut self,
        window: &[Candle],
        seeds: &[StrategyGenome],
        callback: &mut C,
    ) -> Result<EvolutionOutcome> {
        if window.len() < MAX_LOOKBACK {
            return Err(EvolverError::InsufficientData {
                required: MAX_LOOKBACK,
                available: window.len(),
            });
        }

        let mut population = self.manager.initialize_seeded(
            seeds,
            self.config.population_size,
            self.config.strategy_complexity,
            &mut self.rng,
        )?;
        self.state = RunState::Initialized;
        self.current = None;
        self.previous = None;

        let mut best_history = Vec::with_capacity(self.config.generations);
        let mut best_so_far = f64::NEG_INFINITY;
        let mut stale = 0usize;
        let mut index = 0usize;

        self.state = RunState::Running;
        loop {
            callback.on_generation_start(index);

            self.evaluate(&mut population, window)?;
            let generation = Generation::snapshot(index, population);
            let best = generation.best_fitness;
            callback.on_generation_complete(&generation);
            best_history.push(best);

            if best > best_so_far + self.config.convergence_epsilon {
                best_so_far = best;
                stale = 0;
            } else {
                stale += 1;
            }

            self.previous = self.current.take();
            self.current = Some(generation);

            let completed = index + 1;
            let patience = self.config.convergence_patience;
            let next_state = if completed >= self.config.generations {
                Some(RunState::Exhausted)
            } else if patience > 0 && stale >= patience {
                Some(RunState::Converged)
            } else if self.cancel.is_cancelled() {
                Some(RunState::Cancelled)
            } else {
                None
            };

            if let Some(state) = next_state {
                self.state = state;
                break;
            }

            let parents = match &self.current {
                Some(generation) => &generation.population,
                None => break,
            };
            population = self
                .manager
                .next_generation(parents, self.config.elitism_count, &mut self.rng)?;
            index += 1;
        }

        self.outcome(best_history)
    }

    /// Score every unscored individual. Distinct genomes are evaluated in
    /// parallel and merged back by identity; genomes already scored in this
    /// population reuse their record.
    fn evaluate(&self, population: &mut Population, window: &[Candle]) -> Result<()> {
        let mut known: HashMap<GenomeId, FitnessRecord> = HashMap::new();
        let mut pending: HashMap<GenomeId, &StrategyGenome> = HashMap::new();
        for individual in population.individuals() {
            let id = individual.genome.id();
            match individual.fitness {
                Some(record) => {
                    known.insert(id, record);
                }
                None => {
                    pending.insert(id, &individual.genome);
                }
            }
        }
        pending.retain(|id, _| !known.contains_key(id));

        let evaluator = &self.evaluator;
        let scored: Vec<(GenomeId, FitnessRecord)> = pending
            .into_par_iter()
            .map(|(id, genome)| evaluator.evaluate(genome, window).map(|record| (id, record)))
            .collect::<Result<Vec<_>>>()?;
        known.extend(scored);

        for individual in population.individuals_mut() {
            if individual.fitness.is_none() {
                individual.fitness = known.get(&individual.genome.id()).copied();
            }
        }
        Ok(())
    }

    fn outcome(&self, best_history: Vec<f64>) -> Result<EvolutionOutcome> {
        let generation = self
            .current
            .as_ref()
            .ok_or_else(|| EvolverError::InvalidConfiguration("run completed no generation".to_string()))?;
        let best = generation
            .best()
            .ok_or_else(|| EvolverError::InvalidConfiguration("population is empty".to_string()))?;
        let record = best
            .fitness
            .ok_or_else(|| EvolverError::InvalidConfiguration("best genome was never scored".to_string()))?;

        info!(
            "Evolution {:?} after {} generations: best score {:.4}, {} trades, drawdown {:.2}%",
            self.state,
            generation.index + 1,
            record.score,
            record.trade_count,
            record.max_drawdown * 100.0
        );
        debug!("Champion candidate {} ({} genes)", best.genome.id(), best.genome.len());

        Ok(EvolutionOutcome {
            state: self.state,
            genome: best.genome.clone(),
            record,
            generation_index: generation.index,
            generations_completed: generation.index + 1,
            best_history,
            final_population: generation.population.clone(),
        })
    }
}
