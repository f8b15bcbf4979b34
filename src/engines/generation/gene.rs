use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::error::{EvolverError, Result};
use crate::functions::indicators::Indicator;

/// Smallest absolute weight a gene may carry.
pub const MIN_WEIGHT: f64 = 0.05;
pub const MAX_WEIGHT: f64 = 1.0;
const WEIGHT_MAGNITUDE: RangeInclusive<f64> = MIN_WEIGHT..=MAX_WEIGHT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

impl Comparison {
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
        }
    }
}

/// One indicator rule: `indicator <op> threshold` votes with `weight` when true.
///
/// Fields are private; a gene is only obtainable through [`Gene::new`] or
/// [`Gene::random`], so every live gene is within bounds. Deserialization
/// goes through [`Gene::new`] as well. Mutation replaces whole genes instead
/// of editing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeneFields")]
pub struct Gene {
    indicator: Indicator,
    comparison: Comparison,
    threshold: f64,
    weight: f64,
}

#[derive(Deserialize)]
struct GeneFields {
    indicator: Indicator,
    comparison: Comparison,
    threshold: f64,
    weight: f64,
}

impl TryFrom<GeneFields> for Gene {
    type Error = EvolverError;

    fn try_from(fields: GeneFields) -> Result<Self> {
        Gene::new(fields.indicator, fields.comparison, fields.threshold, fields.weight)
    }
}

impl Gene {
    pub fn new(indicator: Indicator, comparison: Comparison, threshold: f64, weight: f64) -> Result<Self> {
        let gene = Self {
            indicator,
            comparison,
            threshold,
            weight,
        };
        gene.validate()?;
        Ok(gene)
    }

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let indicator = Indicator::random(rng);
        let comparison = if rng.gen_bool(0.5) {
            Comparison::GreaterThan
        } else {
            Comparison::LessThan
        };
        let threshold = rng.gen_range(indicator.threshold_range());
        let magnitude = rng.gen_range(WEIGHT_MAGNITUDE);
        let weight = if rng.gen_bool(0.5) { magnitude } else { -magnitude };

        Self {
            indicator,
            comparison,
            threshold,
            weight,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.indicator.validate()?;

        let range = self.indicator.threshold_range();
        if !range.contains(&self.threshold) {
            return Err(EvolverError::InvalidGenome(format!(
                "{} threshold {} outside {:?}",
                self.indicator.name(),
                self.threshold,
                range
            )));
        }
        if !self.weight.is_finite() || !WEIGHT_MAGNITUDE.contains(&self.weight.abs()) {
            return Err(EvolverError::InvalidGenome(format!(
                "weight {} must have magnitude in {:?}",
                self.weight, WEIGHT_MAGNITUDE
            )));
        }
        Ok(())
    }

    pub fn indicator(&self) -> &Indicator {
        &self.indicator
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn lookback(&self) -> usize {
        self.indicator.lookback()
    }

    /// Undefined indicator values never fire.
    pub fn fires(&self, value: Option<f64>) -> bool {
        value.is_some_and(|v| self.comparison.holds(v, self.threshold))
    }
}
