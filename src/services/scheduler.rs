use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::registry::{ChampionRegistry, PromotionOutcome};
use crate::config::{AppConfig, EvolutionConfig, RiskConfig};
use crate::data::DataFeed;
use crate::engines::generation::{
    fnv1a, CancelToken, EvolutionController, EvolutionOutcome, LogProgressCallback, StrategyGenome,
};
use crate::engines::risk::RiskFilter;
use crate::error::{EvolverError, Result};
use crate::storage::{PersistedState, PopulationSnapshot, StateKind, StateStore};
use crate::types::{Candle, ScopeKey, Signal};

/// What one scheduling tick did, scope by scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    /// Scopes whose data window was unavailable or whose run failed
    pub skipped: Vec<(ScopeKey, String)>,
    pub evolved: Vec<ScopeKey>,
    pub promoted: Vec<ScopeKey>,
    pub retained: Vec<ScopeKey>,
    pub rejected: Vec<ScopeKey>,
    pub signals_sent: usize,
    /// Storage failed at least once during the tick
    pub degraded: bool,
}

/// Periodically re-evolves every configured scope against its freshest
/// window and promotes the results. The only writer of the registry.
pub struct AdaptiveScheduler {
    evolution: EvolutionConfig,
    risk: RiskConfig,
    window_length: usize,
    interval: Duration,
    scopes: Vec<ScopeKey>,
    feed: Arc<dyn DataFeed>,
    store: Option<Arc<dyn StateStore>>,
    registry: Arc<ChampionRegistry>,
    /// Final population of each scope's latest run, used as the next seed
    populations: HashMap<ScopeKey, Vec<StrategyGenome>>,
    /// Newest candle each scope was last evolved against
    evolved_through: HashMap<ScopeKey, DateTime<Utc>>,
    signals: Option<Sender<Signal>>,
    cancel: CancelToken,
    degraded: bool,
    ticks: u64,
}

impl AdaptiveScheduler {
    pub fn new(config: &AppConfig, feed: Arc<dyn DataFeed>, store: Option<Arc<dyn StateStore>>) -> Result<Self> {
        config.validate()?;
        let registry = ChampionRegistry::new(RiskFilter::new(config.risk.clone())?, config.scheduler.promotion_margin);

        Ok(Self {
            evolution: config.evolution.clone(),
            risk: config.risk.clone(),
            window_length: config.scheduler.window_length,
            interval: config.scheduler.interval(),
            scopes: config.scheduler.scopes(),
            feed,
            store,
            registry: Arc::new(registry),
            populations: HashMap::new(),
            evolved_through: HashMap::new(),
            signals: None,
            cancel: CancelToken::new(),
            degraded: false,
            ticks: 0,
        })
    }

    /// Send a [`Signal`] for every scope with a champion after each tick.
    pub fn with_signal_sender(mut self, sender: Sender<Signal>) -> Self {
        self.signals = Some(sender);
        self
    }

    pub fn registry(&self) -> Arc<ChampionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Token shared with every evolution run this scheduler starts.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn scopes(&self) -> &[ScopeKey] {
        &self.scopes
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn seed_population(&self, scope: &ScopeKey) -> Option<&[StrategyGenome]> {
        self.populations.get(scope).map(Vec::as_slice)
    }

    /// Load persisted champions and populations. Returns the number of
    /// champions reinstated.
    pub fn restore(&mut self) -> usize {
        let store = match &self.store {
            Some(store) => Arc::clone(store),
            None => return 0,
        };

        let bound = self.evolution.strategy_complexity;
        let mut restored = 0;
        for scope in self.scopes.clone() {
            match self.load(store.as_ref(), &scope, StateKind::Champion) {
                Some(PersistedState::Champion(champion)) => match self.registry.restore(champion, bound) {
                    Ok(()) => restored += 1,
                    Err(e) => warn!("Discarding persisted champion for {}: {}", scope, e),
                },
                Some(other) => warn!("Unexpected {} state for {}", other.kind(), scope),
                None => {}
            }
            if let Some(PersistedState::Population(snapshot)) = self.load(store.as_ref(), &scope, StateKind::Population) {
                self.populations.insert(scope.clone(), snapshot.genomes);
            }
        }

        info!("Restored {} champions and {} populations", restored, self.populations.len());
        restored
    }

    fn load(&mut self, store: &dyn StateStore, scope: &ScopeKey, kind: StateKind) -> Option<PersistedState> {
        match store.load_state(scope, kind) {
            Ok(state) => Some(state),
            Err(EvolverError::NotFound(_)) => None,
            Err(e) => {
                self.degrade(&e);
                None
            }
        }
    }

    /// One scheduling pass: fetch every window concurrently, evolve the scopes
    /// with a fresh window in parallel, then promote and persist one scope at
    /// a time. Scopes whose newest candle was already evolved against are
    /// skipped until new data arrives.
    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };

        let windows = self.fetch_windows(&mut report);
        let fresh = self.fresh_windows(&windows, &mut report);

        let evolution = &self.evolution;
        let risk = &self.risk;
        let populations = &self.populations;
        let cancel = &self.cancel;
        let tick = self.ticks;
        let outcomes: Vec<(ScopeKey, DateTime<Utc>, Result<EvolutionOutcome>)> = fresh
            .par_iter()
            .map(|(scope, window, latest)| {
                let seeds = populations.get(*scope).map_or(&[][..], Vec::as_slice);
                let outcome = evolve_scope(evolution, risk, scope, window, seeds, cancel, tick);
                ((*scope).clone(), *latest, outcome)
            })
            .collect();

        for (scope, latest, outcome) in outcomes {
            match outcome {
                Ok(outcome) => {
                    self.evolved_through.insert(scope.clone(), latest);
                    self.accept(&scope, outcome, &mut report);
                }
                Err(e) => {
                    warn!("Evolution for {} skipped: {}", scope, e);
                    report.skipped.push((scope, e.to_string()));
                }
            }
        }
        report.skipped.sort_by(|a, b| a.0.cmp(&b.0));

        report.signals_sent = self.emit_signals(&windows);
        report.degraded = self.degraded;
        info!(
            "Tick {}: {} evolved, {} promoted, {} retained, {} rejected, {} skipped",
            report.tick,
            report.evolved.len(),
            report.promoted.len(),
            report.retained.len(),
            report.rejected.len(),
            report.skipped.len()
        );
        report
    }

    /// One fetcher per scope; completed windows arrive over a channel. Scopes
    /// without a window are skipped for this tick, never queued.
    fn fetch_windows(&self, report: &mut TickReport) -> Vec<(ScopeKey, Vec<Candle>)> {
        let (tx, rx) = mpsc::channel();
        let length = self.window_length;

        thread::scope(|s| {
            for scope in &self.scopes {
                let tx = tx.clone();
                let feed = &self.feed;
                s.spawn(move || {
                    let window = feed.get_window(&scope.instrument, scope.timeframe, length);
                    let _ = tx.send((scope.clone(), window));
                });
            }
        });
        drop(tx);

        let mut windows = Vec::new();
        for (scope, window) in rx {
            match window {
                Ok(window) => windows.push((scope, window)),
                Err(e) => {
                    warn!("No window for {} from the {} feed this tick: {}", scope, self.feed.name(), e);
                    report.skipped.push((scope, e.to_string()));
                }
            }
        }
        windows.sort_by(|a, b| a.0.cmp(&b.0));
        report.skipped.sort_by(|a, b| a.0.cmp(&b.0));
        windows
    }

    /// Windows whose newest candle is later than the one the scope was last
    /// evolved through. The rest are reported as skipped.
    fn fresh_windows<'a>(
        &self,
        windows: &'a [(ScopeKey, Vec<Candle>)],
        report: &mut TickReport,
    ) -> Vec<(&'a ScopeKey, &'a [Candle], DateTime<Utc>)> {
        let mut fresh = Vec::new();
        for (scope, window) in windows {
            let latest = match window.last() {
                Some(candle) => candle.timestamp,
                None => continue,
            };
            match self.evolved_through.get(scope) {
                Some(seen) if latest <= *seen => {
                    debug!("No fresh window for {} since {}", scope, seen);
                    report.skipped.push((scope.clone(), "no fresh window".to_string()));
                }
                _ => fresh.push((scope, window.as_slice(), latest)),
            }
        }
        fresh
    }

    fn accept(&mut self, scope: &ScopeKey, outcome: EvolutionOutcome, report: &mut TickReport) {
        report.evolved.push(scope.clone());

        let genomes: Vec<StrategyGenome> = outcome.final_population.genomes().cloned().collect();
        self.persist(
            scope,
            PersistedState::Population(PopulationSnapshot {
                scope: scope.clone(),
                generation_index: outcome.generation_index,
                genomes: genomes.clone(),
                saved_at: Utc::now(),
            }),
        );
        self.populations.insert(scope.clone(), genomes);

        let promoted = self.registry.promote(
            &scope.instrument,
            scope.timeframe,
            outcome.genome,
            outcome.record,
            outcome.generation_index,
        );
        match promoted {
            Ok(PromotionOutcome::Promoted { .. }) => {
                report.promoted.push(scope.clone());
                if let Some(champion) = self.registry.champion(scope) {
                    self.persist(scope, PersistedState::Champion(champion.as_ref().clone()));
                }
            }
            Ok(PromotionOutcome::Retained { incumbent_score }) => {
                debug!(
                    "Champion for {} retained (incumbent {:.4}, candidate {:.4})",
                    scope, incumbent_score, outcome.record.score
                );
                report.retained.push(scope.clone());
            }
            Err(_) => report.rejected.push(scope.clone()),
        }
    }

    fn persist(&mut self, scope: &ScopeKey, state: PersistedState) {
        let result = match &self.store {
            Some(store) => store.save_state(scope, &state),
            None => return,
        };
        match result {
            Ok(()) => {
                if self.degraded {
                    info!("Storage available again");
                    self.degraded = false;
                }
            }
            Err(e) => self.degrade(&e),
        }
    }

    fn degrade(&mut self, error: &EvolverError) {
        warn!("Storage unavailable, continuing in memory: {}", error);
        self.degraded = true;
    }

    fn emit_signals(&self, windows: &[(ScopeKey, Vec<Candle>)]) -> usize {
        let sender = match &self.signals {
            Some(sender) => sender,
            None => return 0,
        };

        let mut sent = 0;
        for (scope, window) in windows {
            if self.registry.champion(scope).is_none() {
                continue;
            }
            match self.registry.decision(&scope.instrument, scope.timeframe, window) {
                Ok(signal) => {
                    if sender.send(signal).is_ok() {
                        sent += 1;
                    }
                }
                Err(e) => warn!("No decision for {}: {}", scope, e),
            }
        }
        sent
    }
}

/// Per-scope seed so parallel runs differ but a seeded configuration stays
/// reproducible tick by tick.
fn scope_seed(base: u64, scope: &ScopeKey, tick: u64) -> u64 {
    base ^ fnv1a(scope.storage_key().as_bytes()).wrapping_add(tick)
}

fn evolve_scope(
    evolution: &EvolutionConfig,
    risk: &RiskConfig,
    scope: &ScopeKey,
    window: &[Candle],
    seeds: &[StrategyGenome],
    cancel: &CancelToken,
    tick: u64,
) -> Result<EvolutionOutcome> {
    let mut controller =
        EvolutionController::new(evolution.clone(), risk.clone())?.with_cancel_token(cancel.clone());
    if let Some(base) = evolution.seed {
        controller = controller.with_seed(scope_seed(base, scope, tick));
    }
    controller.run_with(window, seeds, &mut LogProgressCallback::new(scope.to_string()))
}
