use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::parking::session::ParkingSession;

/// Total spots in the lot unless configured otherwise.
pub const DEFAULT_CAPACITY: i64 = 100;

/// Dashboard statistics, recomputed on every poll. The wire shape of
/// `/api/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_vehicles: i64,
    pub available_spots: i64,
    pub available_percent: i64,
    pub today_revenue: f64,
    pub revenue_growth: f64,
    pub vehicle_growth: f64,
}

impl DashboardStats {
    /// Wire-named fields that differ from `previous`, for stat-card
    /// highlighting. Exact equality, matching how the dashboard compares.
    pub fn changed_fields(&self, previous: &DashboardStats) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.total_vehicles != previous.total_vehicles {
            changed.push("totalVehicles");
        }
        if self.available_spots != previous.available_spots {
            changed.push("availableSpots");
        }
        if self.available_percent != previous.available_percent {
            changed.push("availablePercent");
        }
        if self.today_revenue != previous.today_revenue {
            changed.push("todayRevenue");
        }
        if self.revenue_growth != previous.revenue_growth {
            changed.push("revenueGrowth");
        }
        if self.vehicle_growth != previous.vehicle_growth {
            changed.push("vehicleGrowth");
        }
        changed
    }
}

/// Growth percentages comparing today against a reference period.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GrowthFigures {
    pub revenue_growth: f64,
    pub vehicle_growth: f64,
}

/// Pluggable comparison backing the two growth figures.
///
/// Implementations decide what the reference period is and how its figures
/// are obtained; the aggregator only forwards the snapshot and today's
/// revenue.
pub trait GrowthModel: Send + Sync {
    fn growth(
        &self,
        sessions: &[ParkingSession],
        today_revenue: f64,
        now: DateTime<Local>,
    ) -> GrowthFigures;
}

/// Compares today against the previous calendar day, both derived from the
/// same snapshot: completed-session revenue and entry counts. Days with no
/// baseline data yield zero growth rather than an undefined ratio.
pub struct PriorDayGrowth;

impl GrowthModel for PriorDayGrowth {
    fn growth(
        &self,
        sessions: &[ParkingSession],
        today_revenue: f64,
        now: DateTime<Local>,
    ) -> GrowthFigures {
        let today = now.date_naive();
        let yesterday = match today.pred_opt() {
            Some(day) => day,
            None => return GrowthFigures::default(),
        };

        let yesterday_revenue = revenue_for_day(sessions, yesterday);
        let today_entries = entries_for_day(sessions, today);
        let yesterday_entries = entries_for_day(sessions, yesterday);

        GrowthFigures {
            revenue_growth: percent_change(today_revenue, yesterday_revenue),
            vehicle_growth: percent_change(today_entries as f64, yesterday_entries as f64),
        }
    }
}

/// Derives dashboard statistics from a normalized snapshot.
pub struct Aggregator {
    capacity: i64,
    growth: Box<dyn GrowthModel>,
}

impl Aggregator {
    pub fn new(capacity: i64, growth: Box<dyn GrowthModel>) -> Self {
        Self { capacity, growth }
    }

    pub fn with_capacity(capacity: i64) -> Self {
        Self::new(capacity, Box::new(PriorDayGrowth))
    }

    /// Full derivation from the snapshot alone: the active count is the
    /// number of sessions with no exit time.
    pub fn aggregate(&self, sessions: &[ParkingSession], now: DateTime<Local>) -> DashboardStats {
        let active = sessions.iter().filter(|s| s.exit_time.is_none()).count() as i64;
        self.aggregate_with_active(sessions, active, now)
    }

    /// Same derivation, with the active count supplied by the caller. The
    /// stats endpoint passes the store-side count here; it can lag the
    /// fetched snapshot by one record, which is acceptable for a read-only
    /// dashboard ("last read wins").
    pub fn aggregate_with_active(
        &self,
        sessions: &[ParkingSession],
        active_vehicles: i64,
        now: DateTime<Local>,
    ) -> DashboardStats {
        // Over-capacity lots go negative here on purpose; clamping would
        // hide the overflow from the dashboard.
        let available_spots = self.capacity - active_vehicles;
        let available_percent =
            ((available_spots as f64 / self.capacity as f64) * 100.0).round() as i64;

        let today_revenue = revenue_for_day(sessions, now.date_naive());
        let figures = self.growth.growth(sessions, today_revenue, now);

        DashboardStats {
            total_vehicles: sessions.len() as i64,
            available_spots,
            available_percent,
            today_revenue,
            revenue_growth: figures.revenue_growth,
            vehicle_growth: figures.vehicle_growth,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

fn entered_on(session: &ParkingSession, day: NaiveDate) -> bool {
    session
        .entry_time
        .map(|t| t.with_timezone(&Local).date_naive() == day)
        .unwrap_or(false)
}

/// Revenue for one local calendar day: completed sessions only, keyed by
/// entry date. Active sessions are excluded even when they entered today.
fn revenue_for_day(sessions: &[ParkingSession], day: NaiveDate) -> f64 {
    sessions
        .iter()
        .filter(|s| s.exit_time.is_some() && entered_on(s, day))
        .map(|s| s.fee)
        .sum()
}

fn entries_for_day(sessions: &[ParkingSession], day: NaiveDate) -> usize {
    sessions.iter().filter(|s| entered_on(s, day)).count()
}

/// Percentage change to one decimal place; zero when the baseline is zero.
fn percent_change(today: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }
    (((today - baseline) / baseline) * 1000.0).round() / 10.0
}
