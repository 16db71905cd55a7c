use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::parking::record::{decode_fee, decode_time, RawDetectionRecord};

/// Placeholder shown for absent times and durations.
pub const EMPTY_FIELD: &str = "--";

/// One vehicle's parking interval in canonical form.
///
/// Derived fresh from a raw record on every poll; nothing here is written
/// back to the store. Duration is computed at normalization time, so an
/// active session shows a longer duration on every cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ParkingSession {
    /// Identity key. The store does not enforce uniqueness; duplicates are
    /// carried through untouched. Missing plates normalize to "".
    pub vehicle_number: String,
    pub entry_time: Option<DateTime<Utc>>,
    pub exit_time: Option<DateTime<Utc>>,
    /// Whole minutes, floored. `None` when the entry time is unknown.
    pub duration_minutes: Option<i64>,
    pub fee: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "Active",
            SessionStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ParkingSession {
    /// Status is a pure function of exit presence, never stored separately.
    pub fn status(&self) -> SessionStatus {
        if self.exit_time.is_some() {
            SessionStatus::Completed
        } else {
            SessionStatus::Active
        }
    }
}

/// Convert a raw detection record into a canonical session.
///
/// `now` bounds the duration of sessions that have not exited yet; it is
/// passed in rather than read from the clock so the computation stays pure.
pub fn normalize(raw: &RawDetectionRecord, now: DateTime<Utc>) -> ParkingSession {
    let entry_time = decode_time(raw.entry_time.as_ref());
    let exit_time = decode_time(raw.exit_time.as_ref());

    let duration_minutes = entry_time.map(|entry| {
        let bound = exit_time.unwrap_or(now);
        (bound - entry).num_milliseconds().div_euclid(60_000)
    });

    ParkingSession {
        vehicle_number: raw.license_plate_number.clone().unwrap_or_default(),
        entry_time,
        exit_time,
        duration_minutes,
        fee: decode_fee(raw.parking_fee.as_ref()),
    }
}

/// Normalize a store document directly.
pub fn normalize_document(doc: &Value, now: DateTime<Utc>) -> ParkingSession {
    normalize(&RawDetectionRecord::from_document(doc), now)
}

/// Split whole minutes into hours and remainder minutes, floored.
pub fn format_duration(total_minutes: i64) -> String {
    let hours = total_minutes.div_euclid(60);
    let minutes = total_minutes.rem_euclid(60);
    format!("{}h {}m", hours, minutes)
}

fn format_clock(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%I:%M %p").to_string()
}

/// Display projection of a session: the exact row shape `/api/parking`
/// serves and the watcher renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkingRow {
    pub vehicle_number: String,
    pub entry_time: String,
    pub exit_time: String,
    pub duration: String,
    pub fee: String,
    pub status: String,
}

impl ParkingRow {
    pub fn from_session(session: &ParkingSession) -> Self {
        Self {
            vehicle_number: session.vehicle_number.clone(),
            entry_time: session
                .entry_time
                .map(format_clock)
                .unwrap_or_else(|| EMPTY_FIELD.to_string()),
            exit_time: session
                .exit_time
                .map(format_clock)
                .unwrap_or_else(|| EMPTY_FIELD.to_string()),
            duration: session
                .duration_minutes
                .map(format_duration)
                .unwrap_or_else(|| EMPTY_FIELD.to_string()),
            // f64 Display keeps whole fees free of a trailing ".0"
            fee: format!("Rs. {}", session.fee),
            status: session.status().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn same_instant_across_encodings_normalizes_identically() {
        let now = at("2024-04-02T20:00:00Z");
        let ms = at("2024-04-02T09:30:00Z").timestamp_millis();

        let docs = [
            json!({"license_plate_number": "AB1", "entry_time": {"$date": {"$numberLong": ms.to_string()}}}),
            json!({"license_plate_number": "AB1", "entry_time": {"$date": "2024-04-02T09:30:00Z"}}),
            json!({"license_plate_number": "AB1", "entry_time": "2024-04-02T09:30:00Z"}),
        ];

        let sessions: Vec<ParkingSession> =
            docs.iter().map(|d| normalize_document(d, now)).collect();

        for session in &sessions {
            assert_eq!(session.entry_time, Some(at("2024-04-02T09:30:00Z")));
        }
        assert_eq!(sessions[0], sessions[1]);
        assert_eq!(sessions[1], sessions[2]);
    }

    #[test]
    fn status_follows_exit_presence_only() {
        let now = Utc::now();

        let active = normalize_document(
            &json!({"license_plate_number": "A", "entry_time": "2024-04-02T09:00:00Z"}),
            now,
        );
        assert_eq!(active.status(), SessionStatus::Active);

        // No entry at all: still Completed, because an exit is recorded
        let exit_only = normalize_document(
            &json!({"license_plate_number": "B", "exit_time": "2024-04-02T10:00:00Z"}),
            now,
        );
        assert_eq!(exit_only.status(), SessionStatus::Completed);
        assert_eq!(exit_only.duration_minutes, None);

        let empty = normalize_document(&json!({"license_plate_number": "C"}), now);
        assert_eq!(empty.status(), SessionStatus::Active);
    }

    #[test]
    fn duration_floors_minutes_after_hours() {
        let now = Utc::now();
        let doc = json!({
            "license_plate_number": "KA01",
            "entry_time": "2024-04-02T09:00:00Z",
            "exit_time": "2024-04-02T10:45:00Z"
        });
        let session = normalize_document(&doc, now);
        assert_eq!(session.duration_minutes, Some(105));
        assert_eq!(format_duration(105), "1h 45m");

        // 44m59s floors to 44, never rounds up
        let doc = json!({
            "license_plate_number": "KA01",
            "entry_time": "2024-04-02T09:00:00Z",
            "exit_time": "2024-04-02T10:44:59Z"
        });
        let session = normalize_document(&doc, now);
        assert_eq!(session.duration_minutes, Some(104));
        assert_eq!(format_duration(104), "1h 44m");
    }

    #[test]
    fn active_session_duration_is_bounded_by_now() {
        let entry = at("2024-04-02T09:00:00Z");
        let now = at("2024-04-02T10:15:30Z");
        let doc = json!({
            "license_plate_number": "KA01",
            "entry_time": entry.to_rfc3339()
        });
        let session = normalize_document(&doc, now);
        assert_eq!(session.duration_minutes, Some(75));
    }

    #[test]
    fn absent_fields_render_as_placeholders() {
        let now = Utc::now();
        let session = normalize_document(&json!({}), now);
        assert_eq!(session.vehicle_number, "");
        assert_eq!(session.fee, 0.0);

        let row = ParkingRow::from_session(&session);
        assert_eq!(row.entry_time, EMPTY_FIELD);
        assert_eq!(row.exit_time, EMPTY_FIELD);
        assert_eq!(row.duration, EMPTY_FIELD);
        assert_eq!(row.fee, "Rs. 0");
        assert_eq!(row.status, "Active");
    }

    #[test]
    fn fee_display_drops_trailing_zero_fraction() {
        let now = Utc::now();
        let whole = normalize_document(&json!({"parking_fee": 50}), now);
        assert_eq!(ParkingRow::from_session(&whole).fee, "Rs. 50");

        let fractional = normalize_document(&json!({"parking_fee": "12.50"}), now);
        assert_eq!(ParkingRow::from_session(&fractional).fee, "Rs. 12.5");
    }

    #[test]
    fn row_serializes_with_camel_case_keys() {
        let row = ParkingRow {
            vehicle_number: "KA01AB1234".to_string(),
            entry_time: "09:30 AM".to_string(),
            exit_time: EMPTY_FIELD.to_string(),
            duration: "1h 45m".to_string(),
            fee: "Rs. 50".to_string(),
            status: "Active".to_string(),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["vehicleNumber"], "KA01AB1234");
        assert_eq!(value["entryTime"], "09:30 AM");
        assert_eq!(value["exitTime"], "--");
    }
}
