use chrono::{TimeZone, Utc};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use strategy_evolver::config::{AppConfig, EvolutionConfig, SchedulerConfig};
use strategy_evolver::data::{DataFeed, MemoryFeed};
use strategy_evolver::engines::evaluation::FitnessRecord;
use strategy_evolver::engines::generation::{Aggregation, Comparison, Gene, StrategyGenome};
use strategy_evolver::functions::indicators::Indicator;
use strategy_evolver::services::{AdaptiveScheduler, ChampionRecord, SchedulerRunner};
use strategy_evolver::storage::{MemoryStore, PersistedState, StateKind, StateStore};
use strategy_evolver::types::{Candle, ScopeKey, Timeframe};
use strategy_evolver::{EvolverError, Result};

struct FailingStore;

impl StateStore for FailingStore {
    fn save_state(&self, _scope: &ScopeKey, _state: &PersistedState) -> Result<()> {
        Err(EvolverError::StorageUnavailable("disk offline".to_string()))
    }

    fn load_state(&self, _scope: &ScopeKey, _kind: StateKind) -> Result<PersistedState> {
        Err(EvolverError::StorageUnavailable("disk offline".to_string()))
    }
}

fn btc() -> ScopeKey {
    ScopeKey::new("BTC/USDT", Timeframe::H1)
}

fn eth() -> ScopeKey {
    ScopeKey::new("ETH/USDT", Timeframe::H1)
}

fn rising(len: usize) -> Vec<Candle> {
    (0..len)
        .map(|t| {
            let timestamp = Utc.timestamp_opt(1_700_000_000 + t as i64 * 3600, 0).unwrap();
            let close = 100.0 * 1.002f64.powf(t as f64) + 0.05 * (0.7 * t as f64).sin();
            Candle::new(timestamp, close, close * 1.001, close * 0.999, close, 1_000.0)
        })
        .collect()
}

/// BTC has a full window, ETH far too little history.
fn create_feed() -> Arc<MemoryFeed> {
    let feed = MemoryFeed::new();
    feed.extend(&btc(), rising(200));
    feed.extend(&eth(), rising(20));
    Arc::new(feed)
}

fn create_test_config() -> AppConfig {
    AppConfig {
        evolution: EvolutionConfig {
            population_size: 12,
            generations: 4,
            elitism_count: 2,
            strategy_complexity: 4,
            convergence_patience: 0,
            seed: Some(7),
            ..Default::default()
        },
        scheduler: SchedulerConfig {
            interval_secs: 1,
            window_length: 120,
            instruments: vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()],
            timeframes: vec![Timeframe::H1],
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_tick_promotes_and_skips_short_scopes() {
    let feed = create_feed();
    let store = Arc::new(MemoryStore::new());
    let (tx, rx) = mpsc::channel();
    let mut scheduler = AdaptiveScheduler::new(&create_test_config(), feed, Some(store.clone() as Arc<dyn StateStore>))
        .unwrap()
        .with_signal_sender(tx);

    let report = scheduler.tick();

    assert_eq!(report.tick, 1);
    assert_eq!(report.evolved, vec![btc()]);
    assert_eq!(report.promoted, vec![btc()]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, eth());
    assert!(!report.degraded);

    let registry = scheduler.registry();
    let champion = registry.champion(&btc()).unwrap();
    assert!(registry.champion(&eth()).is_none());

    // One signal, from the BTC champion
    assert_eq!(report.signals_sent, 1);
    let signal = rx.try_recv().unwrap();
    assert_eq!(signal.instrument, "BTC/USDT");
    assert_eq!(signal.genome_id, Some(champion.genome_id()));
    assert!(rx.try_recv().is_err());

    // Both the champion and the final population were persisted
    match store.load_state(&btc(), StateKind::Champion).unwrap() {
        PersistedState::Champion(saved) => assert_eq!(saved.genome_id(), champion.genome_id()),
        other => panic!("unexpected state {:?}", other.kind()),
    }
    match store.load_state(&btc(), StateKind::Population).unwrap() {
        PersistedState::Population(snapshot) => assert_eq!(snapshot.genomes.len(), 12),
        other => panic!("unexpected state {:?}", other.kind()),
    }
    assert!(matches!(
        store.load_state(&eth(), StateKind::Champion),
        Err(EvolverError::NotFound(_))
    ));
    assert_eq!(scheduler.seed_population(&btc()).map(<[_]>::len), Some(12));
}

#[test]
fn test_second_tick_keeps_a_champion() {
    let feed = create_feed();
    let mut scheduler = AdaptiveScheduler::new(&create_test_config(), feed.clone(), None).unwrap();
    scheduler.tick();
    let first = scheduler.registry().champion(&btc()).unwrap();

    feed.push(&btc(), rising(201)[200].clone());
    let report = scheduler.tick();

    assert_eq!(report.tick, 2);
    assert_eq!(report.evolved, vec![btc()]);
    assert_eq!(report.promoted.len() + report.retained.len(), 1);
    let current = scheduler.registry().champion(&btc()).unwrap();
    if report.retained.contains(&btc()) {
        assert_eq!(current.genome_id(), first.genome_id());
    } else {
        assert!(current.record.score > first.record.score);
    }
}

#[test]
fn test_restart_restores_champions_from_store() {
    let feed = create_feed();
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let mut scheduler = AdaptiveScheduler::new(&create_test_config(), feed.clone(), Some(store.clone())).unwrap();
    scheduler.tick();
    let champion = scheduler.registry().champion(&btc()).unwrap();

    let mut restarted = AdaptiveScheduler::new(&create_test_config(), feed, Some(store)).unwrap();
    assert_eq!(restarted.restore(), 1);

    let restored = restarted.registry().champion(&btc()).unwrap();
    assert_eq!(restored.genome_id(), champion.genome_id());
    assert_eq!(restored.record, champion.record);
    assert!(restarted.seed_population(&btc()).is_some());
    assert!(restarted.seed_population(&eth()).is_none());
}

#[test]
fn test_storage_failure_degrades_but_keeps_running() {
    let store: Arc<dyn StateStore> = Arc::new(FailingStore);
    let mut scheduler = AdaptiveScheduler::new(&create_test_config(), create_feed(), Some(store)).unwrap();

    assert_eq!(scheduler.restore(), 0);
    assert!(scheduler.is_degraded());

    let report = scheduler.tick();

    // Promotion happens in memory regardless
    assert!(report.degraded);
    assert_eq!(report.promoted, vec![btc()]);
    assert!(scheduler.registry().champion(&btc()).is_some());
}

#[test]
fn test_decision_without_champion_is_hold() {
    let feed = create_feed();
    let scheduler = AdaptiveScheduler::new(&create_test_config(), feed.clone(), None).unwrap();
    let window = feed.get_window("BTC/USDT", Timeframe::H1, 120).unwrap();

    let signal = scheduler.registry().decision("BTC/USDT", Timeframe::H1, &window).unwrap();

    assert_eq!(signal.action, strategy_evolver::types::Action::Hold);
    assert_eq!(signal.confidence, 0.0);
    assert!(signal.genome_id.is_none());
}

#[test]
fn test_runner_ticks_until_stopped() {
    let scheduler = AdaptiveScheduler::new(&create_test_config(), create_feed(), None).unwrap();
    let registry = scheduler.registry();
    let mut runner = SchedulerRunner::spawn(scheduler).unwrap();

    let report = runner.wait_report(Duration::from_secs(60)).unwrap();
    assert_eq!(report.tick, 1);
    assert!(runner.is_running());

    runner.stop();
    assert!(!runner.is_running());
    assert!(registry.champion(&btc()).is_some());
}

#[test]
fn test_unchanged_feed_is_not_evolved_again() {
    let feed = create_feed();
    let (tx, rx) = mpsc::channel();
    let mut scheduler = AdaptiveScheduler::new(&create_test_config(), feed.clone(), None)
        .unwrap()
        .with_signal_sender(tx);
    let first = scheduler.tick();
    assert_eq!(first.evolved, vec![btc()]);

    let second = scheduler.tick();

    assert!(second.evolved.is_empty());
    assert!(second.promoted.is_empty() && second.retained.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert_eq!(second.skipped[0], (btc(), "no fresh window".to_string()));
    assert_eq!(second.skipped[1].0, eth());
    // The existing champion still answers on the unchanged window
    assert_eq!(second.signals_sent, 1);
    assert_eq!(rx.try_iter().count(), 2);

    feed.push(&btc(), rising(201)[200].clone());
    let third = scheduler.tick();
    assert_eq!(third.evolved, vec![btc()]);
}

#[test]
fn test_restore_discards_champions_outside_genome_bounds() {
    let store = Arc::new(MemoryStore::new());
    let gene = Gene::new(Indicator::Rsi { period: 14 }, Comparison::LessThan, 30.0, 0.8).unwrap();
    // Valid under a bound of 10, but the configuration allows only 4 genes
    let genome = StrategyGenome::new(vec![gene; 6], Aggregation::Majority, 10).unwrap();
    let champion = ChampionRecord {
        scope: btc(),
        genome,
        record: FitnessRecord {
            score: 1.0,
            max_drawdown: 0.01,
            win_rate: 0.5,
            trade_count: 4,
            total_return: 0.02,
        },
        generation_index: 3,
        promoted_at: Utc::now(),
    };
    store.save_state(&btc(), &PersistedState::Champion(champion)).unwrap();

    let mut scheduler =
        AdaptiveScheduler::new(&create_test_config(), create_feed(), Some(store as Arc<dyn StateStore>)).unwrap();

    assert_eq!(scheduler.restore(), 0);
    assert!(scheduler.registry().is_empty());
    assert!(!scheduler.is_degraded());
}
