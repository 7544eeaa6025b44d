use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,
    #[error("sampling period must be greater than zero")]
    ZeroPeriod,
}

/// Fires a cycle at a fixed rate on a bounded pool of workers.
///
/// Each trigger is spawned and then forgotten by the ticker, so a slow cycle
/// (a darknet run takes 10+ seconds on a laptop CPU) never shifts the
/// schedule. Cycles overlap freely up to `workers`. A trigger that finds every
/// worker busy is skipped, so nothing piles up behind a stalled detector and
/// every cycle samples the camera at its own trigger time. A cycle that panics
/// only takes itself down.
pub struct PeriodicScheduler {
    width: usize,
    workers: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: Option<CancellationToken>,
    triggered: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
}

impl PeriodicScheduler {
    pub fn new(workers: usize) -> Self {
        let width = workers.max(1);
        Self {
            width,
            workers: Arc::new(Semaphore::new(width)),
            tracker: TaskTracker::new(),
            cancel: None,
            triggered: Arc::new(AtomicU64::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start firing `cycle` now and then every `period`.
    pub fn start<F, Fut>(&mut self, period: Duration, cycle: F) -> Result<(), SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }
        if period.is_zero() {
            return Err(SchedulerError::ZeroPeriod);
        }

        let token = CancellationToken::new();
        let ticker_token = token.clone();
        let tracker = self.tracker.clone();
        let workers = Arc::clone(&self.workers);
        let triggered = Arc::clone(&self.triggered);
        let skipped = Arc::clone(&self.skipped);

        self.tracker.reopen();
        self.tracker.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = ticker_token.cancelled() => {
                        debug!("ticker stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let trigger = triggered.fetch_add(1, Ordering::Relaxed) + 1;
                        match Arc::clone(&workers).try_acquire_owned() {
                            Ok(permit) => {
                                let fut = cycle();
                                let token = ticker_token.clone();
                                tracker.spawn(async move {
                                    let _permit = permit;
                                    if token.is_cancelled() {
                                        return;
                                    }
                                    if let Err(e) = tokio::spawn(fut).await {
                                        if e.is_panic() {
                                            error!(trigger, "sampling cycle panicked");
                                        }
                                    }
                                });
                            }
                            Err(_) => {
                                let total = skipped.fetch_add(1, Ordering::Relaxed) + 1;
                                warn!(trigger, skipped = total, "all workers busy, skipping trigger");
                            }
                        }
                    }
                }
            }
        });

        self.cancel = Some(token);
        info!(
            period_ms = period.as_millis() as u64,
            workers = self.width,
            "periodic sampling started"
        );
        Ok(())
    }

    /// Stop triggering new cycles. Running cycles are never interrupted, and
    /// no trigger is left waiting to start one later.
    ///
    /// With `await_termination`, waits up to `timeout` for in-flight cycles.
    /// Returns `true` if nothing is left running.
    pub async fn stop(&mut self, await_termination: bool, timeout: Duration) -> bool {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.tracker.close();

        if !await_termination {
            return self.tracker.is_empty();
        }

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!(
                    triggered = self.triggered(),
                    skipped = self.skipped(),
                    "periodic sampling stopped"
                );
                true
            }
            Err(_) => {
                warn!(
                    still_running = self.tracker.len(),
                    timeout_ms = timeout.as_millis() as u64,
                    "shutdown timeout elapsed, leaving cycles running"
                );
                false
            }
        }
    }

    /// Number of cycles triggered since construction.
    pub fn triggered(&self) -> u64 {
        self.triggered.load(Ordering::Relaxed)
    }

    /// Triggers dropped because every worker was busy.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl Drop for PeriodicScheduler {
    fn drop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}
