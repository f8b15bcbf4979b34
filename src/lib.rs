//! Evolutionary search for trading strategies.
//!
//! A strategy is a bounded list of indicator rules ([`engines::generation::StrategyGenome`]).
//! The [`engines::generation::EvolutionController`] breeds a population of them
//! against a candle window, the [`services::ChampionRegistry`] keeps the best
//! risk-compliant genome per instrument and timeframe, and the
//! [`services::AdaptiveScheduler`] re-runs evolution on fresh data.

pub mod config;
pub mod data;
pub mod engines;
pub mod error;
pub mod functions;
pub mod services;
pub mod storage;
pub mod types;

pub use error::{EvolverError, Result};
