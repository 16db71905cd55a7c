use crate::parking::diff::ChangeSet;
use crate::parking::session::ParkingRow;
use crate::parking::stats::DashboardStats;

pub mod client;
pub mod controller;

pub use client::{ApiClient, SnapshotSource};
pub use controller::PollController;

/// One fetch of both dashboard endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub rows: Vec<ParkingRow>,
    pub stats: DashboardStats,
    /// True when either endpoint served fallback samples.
    pub degraded: bool,
}

/// Lifecycle of one watcher mount.
///
/// `Errored` is terminal: an initial load failure is not retried, the mount
/// has to be recreated. Refresh failures never reach this state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Refreshing,
    Errored,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::Ready => "ready",
            Phase::Refreshing => "refreshing",
            Phase::Errored => "errored",
        }
    }
}

/// Everything a renderer needs for one frame. Cloned out of the controller;
/// renderers never hold its lock across a frame.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub phase: Phase,
    pub rows: Vec<ParkingRow>,
    pub stats: Option<DashboardStats>,
    /// Row highlights for the current highlight cycle.
    pub row_changes: ChangeSet,
    /// Wire names of stats fields that changed last cycle.
    pub stat_changes: Vec<&'static str>,
    pub degraded: bool,
    pub error: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            rows: Vec::new(),
            stats: None,
            row_changes: ChangeSet::default(),
            stat_changes: Vec::new(),
            degraded: false,
            error: None,
        }
    }
}
