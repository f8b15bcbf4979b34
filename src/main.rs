use anyhow::Context;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::time::Duration;

use strategy_evolver::config::{AppConfig, DataConfig};
use strategy_evolver::data::build_feed;
use strategy_evolver::services::{AdaptiveScheduler, SchedulerRunner};
use strategy_evolver::storage::build_store;
use strategy_evolver::types::Signal;

const USAGE: &str = "usage: strategy-evolver [config.toml] [--once]";

fn main() -> anyhow::Result<()> {
    let mut config_path: Option<PathBuf> = None;
    let mut once = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--once" => once = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            other if config_path.is_none() => config_path = Some(PathBuf::from(other)),
            other => anyhow::bail!("unexpected argument '{}'\n{}", other, USAGE),
        }
    }

    let config = AppConfig::load_layered(config_path.as_deref()).context("loading configuration")?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    if config.data == DataConfig::Memory {
        warn!("Memory data source configured; nothing will feed it from this binary");
    }
    let feed = build_feed(&config.data);
    info!("Reading candles from the {} feed", feed.name());
    let store = build_store(&config.storage);
    if store.is_none() {
        info!("No storage configured, state is kept in memory only");
    }

    let (signal_tx, signal_rx) = channel();
    let mut scheduler = AdaptiveScheduler::new(&config, feed, store)?.with_signal_sender(signal_tx);
    scheduler.restore();
    info!(
        "Evolving {} scopes every {:?} over {} candles",
        scheduler.scopes().len(),
        scheduler.interval(),
        config.scheduler.window_length
    );

    if once {
        let report = scheduler.tick();
        drop(scheduler);
        signal_rx.try_iter().for_each(|signal| log_signal(&signal));
        info!("Single tick done: {} promoted, {} skipped", report.promoted.len(), report.skipped.len());
        return Ok(());
    }

    let runner = SchedulerRunner::spawn(scheduler)?;
    while runner.is_running() {
        while let Ok(signal) = signal_rx.recv_timeout(Duration::from_millis(500)) {
            log_signal(&signal);
        }
        while let Some(report) = runner.poll_report() {
            if report.degraded {
                warn!("Tick {} ran with storage unavailable", report.tick);
            }
        }
    }

    Ok(())
}

fn log_signal(signal: &Signal) {
    let genome = signal.genome_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
    info!(
        "{} {}: {:?} ({:.2}) from {}",
        signal.instrument, signal.timeframe, signal.action, signal.confidence, genome
    );
}
