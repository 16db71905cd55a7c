use std::collections::{BTreeSet, HashMap};

use crate::parking::session::{ParkingRow, ParkingSession};

/// Session fields the change detector watches. Entry time is deliberately
/// not one of them: entries are assumed immutable after creation, so an
/// entry-time difference is never highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WatchedField {
    ExitTime,
    Duration,
    Fee,
    Status,
}

impl WatchedField {
    pub const DEFAULT: [WatchedField; 4] = [
        WatchedField::ExitTime,
        WatchedField::Duration,
        WatchedField::Fee,
        WatchedField::Status,
    ];

    pub fn default_set() -> BTreeSet<WatchedField> {
        Self::DEFAULT.into_iter().collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchedField::ExitTime => "exitTime",
            WatchedField::Duration => "duration",
            WatchedField::Fee => "fee",
            WatchedField::Status => "status",
        }
    }
}

/// Change outcome for one row. A new row carries no per-field list; every
/// watched field counts as changed for display purposes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowChange {
    pub is_new: bool,
    pub changed: BTreeSet<WatchedField>,
}

/// Advisory change map for one highlight cycle, keyed by vehicle number.
/// Never feeds back into stats or stored state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    entries: HashMap<String, RowChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, vehicle_number: &str) -> Option<&RowChange> {
        self.entries.get(vehicle_number)
    }

    /// Whether this row/field pair should be emphasized right now.
    pub fn is_highlighted(&self, vehicle_number: &str, field: WatchedField) -> bool {
        self.entries
            .get(vehicle_number)
            .map(|c| c.is_new || c.changed.contains(&field))
            .unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RowChange)> {
        self.entries.iter()
    }
}

/// Anything the detector can compare: canonical sessions in the core,
/// formatted rows in the watcher. Same algorithm either way.
pub trait DiffRow {
    fn key(&self) -> &str;
    fn field_eq(&self, other: &Self, field: WatchedField) -> bool;
}

impl DiffRow for ParkingSession {
    fn key(&self) -> &str {
        &self.vehicle_number
    }

    fn field_eq(&self, other: &Self, field: WatchedField) -> bool {
        match field {
            WatchedField::ExitTime => self.exit_time == other.exit_time,
            WatchedField::Duration => self.duration_minutes == other.duration_minutes,
            WatchedField::Fee => self.fee == other.fee,
            WatchedField::Status => self.status() == other.status(),
        }
    }
}

impl DiffRow for ParkingRow {
    fn key(&self) -> &str {
        &self.vehicle_number
    }

    fn field_eq(&self, other: &Self, field: WatchedField) -> bool {
        match field {
            WatchedField::ExitTime => self.exit_time == other.exit_time,
            WatchedField::Duration => self.duration == other.duration,
            WatchedField::Fee => self.fee == other.fee,
            WatchedField::Status => self.status == other.status,
        }
    }
}

/// Key a snapshot by vehicle number for the next cycle's diff. On duplicate
/// plates the first occurrence wins, matching the first-match lookup the
/// dashboard table used.
pub fn snapshot_map<T: DiffRow + Clone>(rows: &[T]) -> HashMap<String, T> {
    let mut map = HashMap::with_capacity(rows.len());
    for row in rows {
        map.entry(row.key().to_string()).or_insert_with(|| row.clone());
    }
    map
}

/// Compare the current snapshot against the previous one.
///
/// Rows absent from `previous` are new; rows present in both contribute the
/// watched fields that differ by value; rows that disappeared produce no
/// entry at all.
pub fn diff<T: DiffRow>(
    previous: &HashMap<String, T>,
    current: &[T],
    watched: &BTreeSet<WatchedField>,
) -> ChangeSet {
    let mut entries = HashMap::new();

    for row in current {
        match previous.get(row.key()) {
            None => {
                entries.insert(
                    row.key().to_string(),
                    RowChange {
                        is_new: true,
                        changed: BTreeSet::new(),
                    },
                );
            }
            Some(prev) => {
                let changed: BTreeSet<WatchedField> = watched
                    .iter()
                    .copied()
                    .filter(|field| !row.field_eq(prev, *field))
                    .collect();

                if !changed.is_empty() {
                    entries.insert(
                        row.key().to_string(),
                        RowChange {
                            is_new: false,
                            changed,
                        },
                    );
                }
            }
        }
    }

    ChangeSet { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parking::session::normalize_document;
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn session(plate: &str, fee: f64) -> ParkingSession {
        ParkingSession {
            vehicle_number: plate.to_string(),
            entry_time: Some(at("2024-04-02T09:00:00Z")),
            exit_time: Some(at("2024-04-02T10:00:00Z")),
            duration_minutes: Some(60),
            fee,
        }
    }

    #[test]
    fn identical_snapshots_yield_empty_change_set() {
        let rows = vec![session("A", 10.0), session("B", 20.0)];
        let previous = snapshot_map(&rows);

        let changes = diff(&previous, &rows, &WatchedField::default_set());
        assert!(changes.is_empty());

        // And again: diffing is idempotent
        let changes = diff(&previous, &rows, &WatchedField::default_set());
        assert!(changes.is_empty());
    }

    #[test]
    fn new_vehicle_yields_exactly_one_is_new_entry() {
        let previous = snapshot_map(&[session("A", 10.0)]);
        let current = vec![session("A", 10.0), session("B", 20.0)];

        let changes = diff(&previous, &current, &WatchedField::default_set());
        assert_eq!(changes.len(), 1);

        let change = changes.get("B").unwrap();
        assert!(change.is_new);
        assert!(change.changed.is_empty());
        assert!(changes.get("A").is_none());

        // A new row highlights every watched field
        assert!(changes.is_highlighted("B", WatchedField::Fee));
        assert!(changes.is_highlighted("B", WatchedField::Status));
    }

    #[test]
    fn fee_only_change_flags_fee_exclusively() {
        let previous = snapshot_map(&[session("A", 10.0)]);
        let current = vec![session("A", 25.0)];

        let changes = diff(&previous, &current, &WatchedField::default_set());
        let change = changes.get("A").unwrap();
        assert!(!change.is_new);
        assert_eq!(
            change.changed,
            BTreeSet::from([WatchedField::Fee]),
        );
        assert!(changes.is_highlighted("A", WatchedField::Fee));
        assert!(!changes.is_highlighted("A", WatchedField::Status));
    }

    #[test]
    fn entry_time_differences_are_never_flagged() {
        let mut moved = session("A", 10.0);
        moved.entry_time = Some(at("2024-04-02T09:30:00Z"));

        let previous = snapshot_map(&[session("A", 10.0)]);
        let changes = diff(&previous, &[moved], &WatchedField::default_set());
        assert!(changes.is_empty());
    }

    #[test]
    fn narrowed_watched_set_ignores_other_fields() {
        let mut current = session("A", 10.0);
        current.exit_time = None;
        current.duration_minutes = Some(240);

        let previous = snapshot_map(&[session("A", 10.0)]);
        let watched = BTreeSet::from([WatchedField::Fee]);

        let changes = diff(&previous, &[current], &watched);
        assert!(changes.is_empty());
    }

    #[test]
    fn disappearing_rows_are_not_signaled() {
        let previous = snapshot_map(&[session("A", 10.0), session("B", 20.0)]);
        let current = vec![session("A", 10.0)];

        let changes = diff(&previous, &current, &WatchedField::default_set());
        assert!(changes.is_empty());
    }

    #[test]
    fn duplicate_plates_are_tolerated_not_deduplicated() {
        let first = session("A", 10.0);
        let mut second = session("A", 99.0);
        second.exit_time = Some(at("2024-04-02T11:00:00Z"));

        // Previous keeps the first occurrence
        let previous = snapshot_map(&[first.clone(), second.clone()]);
        assert_eq!(previous.get("A").unwrap().fee, 10.0);

        // Both current occurrences are compared; the later one wins the slot
        let changes = diff(&previous, &[first, second], &WatchedField::default_set());
        let change = changes.get("A").unwrap();
        assert!(change.changed.contains(&WatchedField::Fee));
        assert!(change.changed.contains(&WatchedField::ExitTime));
    }

    #[test]
    fn formatted_rows_diff_like_sessions() {
        let active = ParkingRow {
            vehicle_number: "A".to_string(),
            entry_time: "09:30 AM".to_string(),
            exit_time: "--".to_string(),
            duration: "1h 0m".to_string(),
            fee: "Rs. 0".to_string(),
            status: "Active".to_string(),
        };
        let completed = ParkingRow {
            exit_time: "11:00 AM".to_string(),
            duration: "1h 30m".to_string(),
            fee: "Rs. 50".to_string(),
            status: "Completed".to_string(),
            ..active.clone()
        };

        let previous = snapshot_map(&[active]);
        let changes = diff(&previous, &[completed], &WatchedField::default_set());
        let change = changes.get("A").unwrap();
        assert_eq!(change.changed, WatchedField::default_set());
    }

    #[test]
    fn exit_recorded_one_cycle_later_flags_all_four_fields() {
        let t0 = at("2024-04-02T09:00:00Z");
        let first_poll = t0 + Duration::minutes(30);
        let second_poll = first_poll + Duration::minutes(60);

        let before = json!({
            "license_plate_number": "AB1",
            "entry_time": t0.to_rfc3339(),
            "exit_time": null,
            "parking_fee": 0
        });
        let after = json!({
            "license_plate_number": "AB1",
            "entry_time": t0.to_rfc3339(),
            "exit_time": (t0 + Duration::minutes(90)).to_rfc3339(),
            "parking_fee": 50
        });

        let previous = snapshot_map(&[normalize_document(&before, first_poll)]);
        let current = vec![normalize_document(&after, second_poll)];

        let changes = diff(&previous, &current, &WatchedField::default_set());
        let change = changes.get("AB1").unwrap();
        assert!(!change.is_new);
        assert_eq!(
            change.changed,
            BTreeSet::from([
                WatchedField::ExitTime,
                WatchedField::Duration,
                WatchedField::Fee,
                WatchedField::Status,
            ])
        );
    }
}
