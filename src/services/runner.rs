use log::{error, info};
use std::sync::mpsc::{channel, Receiver};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::scheduler::{AdaptiveScheduler, TickReport};
use crate::engines::generation::CancelToken;
use crate::error::Result;

/// How often the idle loop checks for a stop request.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs scheduler ticks on a background thread every interval until
/// stopped. Dropping the runner stops it.
pub struct SchedulerRunner {
    handle: Option<JoinHandle<()>>,
    report_rx: Receiver<TickReport>,
    stop_flag: CancelToken,
    evolution_cancel: CancelToken,
}

impl SchedulerRunner {
    pub fn spawn(scheduler: AdaptiveScheduler) -> Result<Self> {
        let (report_tx, report_rx) = channel();
        let stop_flag = CancelToken::new();
        let evolution_cancel = scheduler.cancel_token();
        let thread_stop = stop_flag.clone();

        let handle = thread::Builder::new()
            .name("scheduler".to_string())
            .spawn(move || {
                let mut scheduler = scheduler;
                let interval = scheduler.interval();
                info!("Scheduler started, interval {:?}", interval);

                while !thread_stop.is_cancelled() {
                    let started = Instant::now();
                    let _ = report_tx.send(scheduler.tick());

                    while !thread_stop.is_cancelled() && started.elapsed() < interval {
                        thread::sleep(POLL_INTERVAL.min(interval.saturating_sub(started.elapsed())));
                    }
                }
                info!("Scheduler stopped");
            })?;

        Ok(Self {
            handle: Some(handle),
            report_rx,
            stop_flag,
            evolution_cancel,
        })
    }

    /// Next tick report, if one is ready (non-blocking)
    pub fn poll_report(&self) -> Option<TickReport> {
        self.report_rx.try_recv().ok()
    }

    /// Block until the next tick report or until `timeout` passes.
    pub fn wait_report(&self, timeout: Duration) -> Option<TickReport> {
        self.report_rx.recv_timeout(timeout).ok()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Request a stop, cancel in-flight runs between generations, and wait
    /// for the thread to exit.
    pub fn stop(&mut self) {
        self.stop_flag.cancel();
        self.evolution_cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
