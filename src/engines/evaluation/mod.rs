pub mod backtester;
pub mod portfolio;

pub use backtester::{BacktestResult, FitnessEvaluator, FitnessRecord, INITIAL_EQUITY};
pub use portfolio::{Portfolio, Position};
