pub mod diff;
pub mod record;
pub mod session;
pub mod stats;

pub use diff::{diff, snapshot_map, ChangeSet, DiffRow, RowChange, WatchedField};
pub use record::{decode_fee, decode_time, FeeEncoding, RawDetectionRecord, TimeEncoding};
pub use session::{
    format_duration, normalize, normalize_document, ParkingRow, ParkingSession, SessionStatus,
};
pub use stats::{Aggregator, DashboardStats, GrowthFigures, GrowthModel, PriorDayGrowth};
