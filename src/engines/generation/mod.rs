pub mod evolution_engine;
pub mod gene;
pub mod genome;
pub mod operators;
pub mod population;
pub mod progress;

pub use evolution_engine::{CancelToken, EvolutionController, EvolutionOutcome, ProgressCallback, RunState};
pub use gene::{Comparison, Gene};
pub use genome::{canonical_string, fnv1a, Aggregation, GenomeId, StrategyGenome};
pub use operators::{create_random, crossover, mutate, random_genome, tournament_selection};
pub use population::{Generation, Individual, Origin, Population, PopulationManager};
pub use progress::{ChannelProgressCallback, LogProgressCallback, ProgressMessage};
