use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::engines::evaluation::FitnessRecord;
use crate::engines::generation::{GenomeId, StrategyGenome};
use crate::engines::risk::RiskFilter;
use crate::error::Result;
use crate::types::{Action, Candle, ScopeKey, Signal, Timeframe};

/// The promoted genome for one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionRecord {
    pub scope: ScopeKey,
    pub genome: StrategyGenome,
    pub record: FitnessRecord,
    pub generation_index: usize,
    pub promoted_at: DateTime<Utc>,
}

impl ChampionRecord {
    pub fn genome_id(&self) -> GenomeId {
        self.genome.id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PromotionOutcome {
    /// Candidate replaced the incumbent (or filled an empty slot).
    Promoted { previous_score: Option<f64> },
    /// Candidate did not clear the promotion margin.
    Retained { incumbent_score: f64 },
}

/// Current champion per scope.
///
/// Single writer (the scheduler), many readers. Readers clone the `Arc` of a
/// record and evaluate outside the lock, so a decision never waits on a
/// promotion or an evolution run.
#[derive(Debug)]
pub struct ChampionRegistry {
    risk: RiskFilter,
    promotion_margin: f64,
    champions: RwLock<HashMap<ScopeKey, Arc<ChampionRecord>>>,
}

impl ChampionRegistry {
    pub fn new(risk: RiskFilter, promotion_margin: f64) -> Self {
        Self {
            risk,
            promotion_margin,
            champions: RwLock::new(HashMap::new()),
        }
    }

    /// Smallest score that displaces an incumbent scoring `current`.
    /// Scales with `|current|` so negative incumbents also need a real gain.
    pub fn promotion_bar(&self, current: f64) -> f64 {
        current + current.abs() * self.promotion_margin
    }

    /// Risk-gate the candidate, then replace the incumbent only if the
    /// candidate clears the promotion margin. A `RiskViolation` leaves the
    /// registry untouched.
    pub fn promote(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        candidate: StrategyGenome,
        record: FitnessRecord,
        generation_index: usize,
    ) -> Result<PromotionOutcome> {
        let scope = ScopeKey::new(instrument, timeframe);
        if let Err(e) = self.risk.check_promotion(&record) {
            warn!("Rejected champion candidate for {}: {}", scope, e);
            return Err(e);
        }

        let mut champions = self.champions.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous_score = champions.get(&scope).map(|c| c.record.score);
        if let Some(current) = previous_score {
            if record.score <= self.promotion_bar(current) {
                return Ok(PromotionOutcome::Retained {
                    incumbent_score: current,
                });
            }
        }

        let champion = ChampionRecord {
            scope: scope.clone(),
            genome: candidate,
            record,
            generation_index,
            promoted_at: Utc::now(),
        };
        info!(
            "Promoted {} for {} (score {:.4}, previous {:?})",
            champion.genome_id(),
            scope,
            record.score,
            previous_score
        );
        champions.insert(scope, Arc::new(champion));

        Ok(PromotionOutcome::Promoted { previous_score })
    }

    /// Reinstate a persisted champion at startup, bypassing the margin but
    /// not the genome bounds or the risk gate.
    pub fn restore(&self, champion: ChampionRecord, complexity_bound: usize) -> Result<()> {
        champion.genome.validate(complexity_bound)?;
        self.risk.check_promotion(&champion.record)?;
        let mut champions = self.champions.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        champions.insert(champion.scope.clone(), Arc::new(champion));
        Ok(())
    }

    pub fn champion(&self, scope: &ScopeKey) -> Option<Arc<ChampionRecord>> {
        let champions = self.champions.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        champions.get(scope).cloned()
    }

    pub fn scopes(&self) -> Vec<ScopeKey> {
        let champions = self.champions.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut scopes: Vec<ScopeKey> = champions.keys().cloned().collect();
        scopes.sort();
        scopes
    }

    pub fn len(&self) -> usize {
        self.champions.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live decision from the current champion. With no champion the answer
    /// is HOLD at zero confidence.
    pub fn decision(&self, instrument: &str, timeframe: Timeframe, live_window: &[Candle]) -> Result<Signal> {
        let scope = ScopeKey::new(instrument, timeframe);
        let (action, confidence, genome_id) = match self.champion(&scope) {
            Some(champion) => {
                let (action, confidence) = champion.genome.decide(live_window)?;
                (action, confidence, Some(champion.genome_id()))
            }
            None => (Action::Hold, 0.0, None),
        };

        Ok(Signal {
            instrument: scope.instrument,
            timeframe,
            action,
            confidence,
            genome_id,
            generated_at: Utc::now(),
        })
    }
}
