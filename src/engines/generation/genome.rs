//! Strategy genome
//!
//! A genome is an ordered list of indicator genes plus an aggregation rule that
//! turns the genes' votes into a BUY / SELL / HOLD decision on each bar.
//!
//! Genomes are linear on purpose: crossover is segment splicing and mutation is
//! gene replacement, both cheap and both easy to keep within bounds. A genome
//! that violates its bounds cannot be constructed.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

use super::gene::Gene;
use crate::error::{EvolverError, Result};
use crate::types::{Action, Candle};

const VOTE_THRESHOLD: RangeInclusive<f64> = 0.05..=0.95;

/// Stable identity of a genome's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenomeId(pub u64);

impl fmt::Display for GenomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// How gene outputs are combined into one decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Aggregation {
    /// `vote = Σ fired weights / Σ |weights|`, acted on past `±threshold`.
    WeightedVote { threshold: f64 },
    /// Each fired gene votes the sign of its weight; a strict majority of all
    /// genes decides.
    Majority,
}

impl Aggregation {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        if rng.gen_bool(0.8) {
            Self::WeightedVote {
                threshold: rng.gen_range(VOTE_THRESHOLD),
            }
        } else {
            Self::Majority
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::WeightedVote { threshold } if !VOTE_THRESHOLD.contains(threshold) => {
                Err(EvolverError::InvalidGenome(format!(
                    "vote threshold {} outside {:?}",
                    threshold, VOTE_THRESHOLD
                )))
            }
            _ => Ok(()),
        }
    }

    /// Resolve `(weight, fired)` pairs into an action and its confidence.
    /// HOLD reports how far the vote is from acting (`1 - |vote|`).
    pub fn resolve<I>(&self, outputs: I) -> (Action, f64)
    where
        I: IntoIterator<Item = (f64, bool)>,
    {
        match *self {
            Self::WeightedVote { threshold } => {
                let mut total = 0.0;
                let mut vote = 0.0;
                for (weight, fired) in outputs {
                    total += weight.abs();
                    if fired {
                        vote += weight;
                    }
                }
                let vote = if total > 0.0 { vote / total } else { 0.0 };
                let confidence = vote.abs().min(1.0);
                if vote >= threshold {
                    (Action::Buy, confidence)
                } else if vote <= -threshold {
                    (Action::Sell, confidence)
                } else {
                    (Action::Hold, 1.0 - confidence)
                }
            }
            Self::Majority => {
                let (mut genes, mut buys, mut sells) = (0usize, 0usize, 0usize);
                for (weight, fired) in outputs {
                    genes += 1;
                    if fired && weight > 0.0 {
                        buys += 1;
                    } else if fired && weight < 0.0 {
                        sells += 1;
                    }
                }
                if genes == 0 {
                    return (Action::Hold, 1.0);
                }
                let n = genes as f64;
                if buys * 2 > genes {
                    (Action::Buy, buys as f64 / n)
                } else if sells * 2 > genes {
                    (Action::Sell, sells as f64 / n)
                } else {
                    (Action::Hold, 1.0 - buys.max(sells) as f64 / n)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GenomeFields")]
pub struct StrategyGenome {
    genes: Vec<Gene>,
    aggregation: Aggregation,
}

/// Decoded genomes get every check except the complexity bound, which
/// depends on the loading side's configuration.
#[derive(Deserialize)]
struct GenomeFields {
    genes: Vec<Gene>,
    aggregation: Aggregation,
}

impl TryFrom<GenomeFields> for StrategyGenome {
    type Error = EvolverError;

    fn try_from(fields: GenomeFields) -> Result<Self> {
        StrategyGenome::new(fields.genes, fields.aggregation, usize::MAX)
    }
}

impl StrategyGenome {
    /// Build a genome, failing with `InvalidGenome` when it breaks any bound.
    pub fn new(genes: Vec<Gene>, aggregation: Aggregation, complexity_bound: usize) -> Result<Self> {
        let genome = Self { genes, aggregation };
        genome.validate(complexity_bound)?;
        Ok(genome)
    }

    /// Gene count within `1..=complexity_bound`, every gene and the
    /// aggregation rule within range.
    pub fn validate(&self, complexity_bound: usize) -> Result<()> {
        if self.genes.is_empty() {
            return Err(EvolverError::InvalidGenome("genome has no genes".to_string()));
        }
        if self.genes.len() > complexity_bound {
            return Err(EvolverError::InvalidGenome(format!(
                "{} genes exceed strategy complexity {}",
                self.genes.len(),
                complexity_bound
            )));
        }
        for gene in &self.genes {
            gene.validate()?;
        }
        self.aggregation.validate()
    }

    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Candles required before every gene is defined.
    pub fn lookback(&self) -> usize {
        self.genes.iter().map(Gene::lookback).max().unwrap_or(1)
    }

    /// Same aggregation with every gene passed through `f`. The gene count
    /// is unchanged, so the result satisfies any bound `self` satisfied.
    pub fn map_genes<F>(&self, f: F) -> Self
    where
        F: FnMut(&Gene) -> Gene,
    {
        Self {
            genes: self.genes.iter().map(f).collect(),
            aggregation: self.aggregation,
        }
    }

    pub fn id(&self) -> GenomeId {
        GenomeId(fnv1a(canonical_string(self).as_bytes()))
    }

    /// Decision on every bar of the window. Bars before the lookback see
    /// undefined indicators, which never fire.
    pub fn decisions(&self, candles: &[Candle]) -> Vec<(Action, f64)> {
        let series: Vec<Vec<Option<f64>>> = self
            .genes
            .iter()
            .map(|gene| gene.indicator().compute(candles))
            .collect();

        (0..candles.len())
            .map(|bar| {
                self.aggregation.resolve(
                    self.genes
                        .iter()
                        .zip(&series)
                        .map(|(gene, values)| (gene.weight(), gene.fires(values[bar]))),
                )
            })
            .collect()
    }

    /// Decision on the most recent bar.
    pub fn decide(&self, candles: &[Candle]) -> Result<(Action, f64)> {
        let required = self.lookback();
        if candles.len() < required {
            return Err(EvolverError::InsufficientData {
                required,
                available: candles.len(),
            });
        }
        let outputs: Vec<(f64, bool)> = self
            .genes
            .iter()
            .map(|gene| {
                let values = gene.indicator().compute(candles);
                (gene.weight(), gene.fires(values.last().copied().flatten()))
            })
            .collect();
        Ok(self.aggregation.resolve(outputs))
    }
}

/// Canonical string used for identity and deduplication.
pub fn canonical_string(genome: &StrategyGenome) -> String {
    serde_json::to_string(genome).unwrap_or_else(|_| String::new())
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a; output is fixed across builds and toolchains.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME))
}
