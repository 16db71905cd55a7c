use crate::config::WatchConfig;
use crate::parking::diff::{diff, snapshot_map, ChangeSet, WatchedField};
use crate::watch::client::SnapshotSource;
use crate::watch::{DashboardSnapshot, Phase, ViewState};
use anyhow::Result;
use log::{info, warn};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Drives the refresh cycle: fetch, diff against the previous snapshot,
/// apply, schedule the highlight clear, repeat.
///
/// The previous snapshot is a local of the refresh task, so there is exactly
/// one writer and no cycle ever diffs against a half-replaced reference. The
/// loop awaits each fetch before the next tick, which also guarantees at
/// most one in-flight refresh.
pub struct PollController {
    source: Arc<dyn SnapshotSource>,
    poll_interval: Duration,
    highlight_for: Duration,
    watched: BTreeSet<WatchedField>,
    view: Arc<Mutex<ViewState>>,
    /// Bumped on every applied cycle; a pending highlight clear only fires
    /// if its generation is still the latest.
    highlight_gen: Arc<AtomicU64>,
    cancel: CancellationToken,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl PollController {
    pub fn new(source: Arc<dyn SnapshotSource>, config: &WatchConfig) -> Self {
        Self {
            source,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            highlight_for: Duration::from_secs(config.highlight_secs),
            watched: WatchedField::default_set(),
            view: Arc::new(Mutex::new(ViewState::default())),
            highlight_gen: Arc::new(AtomicU64::new(0)),
            cancel: CancellationToken::new(),
            refresh_task: Mutex::new(None),
        }
    }

    /// Current view state, cloned for rendering.
    pub async fn view(&self) -> ViewState {
        self.view.lock().await.clone()
    }

    /// Perform the initial load and start the refresh loop.
    ///
    /// An initial failure is terminal for this controller: the view moves to
    /// `Errored`, no refresh loop is started and the error is returned.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        self.set_phase(Phase::Loading).await;
        info!("Loading initial dashboard snapshot");

        match self.source.fetch().await {
            Ok(snapshot) => {
                {
                    let mut view = self.view.lock().await;
                    view.rows = snapshot.rows.clone();
                    view.stats = Some(snapshot.stats.clone());
                    view.degraded = snapshot.degraded;
                    view.phase = Phase::Ready;
                }

                let handle = self.clone().spawn_refresh_loop(snapshot);
                *self.refresh_task.lock().await = Some(handle);
                Ok(())
            }
            Err(e) => {
                let mut view = self.view.lock().await;
                view.phase = Phase::Errored;
                view.error = Some(format!("Failed to load parking data: {}", e));
                Err(e)
            }
        }
    }

    /// Stop the refresh loop and disarm pending highlight clears.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.refresh_task.lock().await.take() {
            let _ = handle.await;
        }
    }

    fn spawn_refresh_loop(self: Arc<Self>, initial: DashboardSnapshot) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut previous_rows = snapshot_map(&initial.rows);
            let mut previous_stats = initial.stats;

            // First refresh happens one full period after the initial load
            let mut ticker =
                tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.set_phase(Phase::Refreshing).await;

                        match self.source.fetch().await {
                            Ok(snapshot) => {
                                let row_changes =
                                    diff(&previous_rows, &snapshot.rows, &self.watched);
                                let stat_changes =
                                    snapshot.stats.changed_fields(&previous_stats);

                                previous_rows = snapshot_map(&snapshot.rows);
                                previous_stats = snapshot.stats.clone();

                                self.apply(snapshot, row_changes, stat_changes).await;
                            }
                            Err(e) => {
                                // Stale-but-available: a live dashboard must
                                // not blank on a transient fetch failure
                                warn!("Refresh failed, keeping previous data: {}", e);
                                self.set_phase(Phase::Ready).await;
                            }
                        }
                    }
                    _ = self.cancel.cancelled() => {
                        info!("Polling stopped");
                        break;
                    }
                }
            }
        })
    }

    async fn apply(
        &self,
        snapshot: DashboardSnapshot,
        row_changes: ChangeSet,
        stat_changes: Vec<&'static str>,
    ) {
        let generation = self.highlight_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let has_changes = !row_changes.is_empty() || !stat_changes.is_empty();

        {
            let mut view = self.view.lock().await;
            view.rows = snapshot.rows;
            view.stats = Some(snapshot.stats);
            view.degraded = snapshot.degraded;
            view.row_changes = row_changes;
            view.stat_changes = stat_changes;
            view.phase = Phase::Ready;
        }

        if has_changes {
            self.schedule_highlight_clear(generation);
        }
    }

    fn schedule_highlight_clear(&self, generation: u64) {
        let view = self.view.clone();
        let highlight_gen = self.highlight_gen.clone();
        let token = self.cancel.clone();
        let delay = self.highlight_for;

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    // A newer cycle owns the highlights now; leave them alone
                    if highlight_gen.load(Ordering::SeqCst) != generation {
                        return;
                    }
                    let mut view = view.lock().await;
                    view.row_changes.clear();
                    view.stat_changes.clear();
                }
                _ = token.cancelled() => {}
            }
        });
    }

    async fn set_phase(&self, phase: Phase) {
        self.view.lock().await.phase = phase;
    }
}
