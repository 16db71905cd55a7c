pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod parking;
pub mod watch;

// Re-export main components for easier use
pub use error::Error;
pub use parking::{
    diff, normalize, normalize_document, Aggregator, ChangeSet, DashboardStats, ParkingRow,
    ParkingSession, SessionStatus, WatchedField,
};
pub use watch::{ApiClient, PollController};
