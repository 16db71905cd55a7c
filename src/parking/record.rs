use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::debug;
use serde_json::Value;

/// Raw detection document as it sits in the store.
///
/// The collection has been written by several producers over its lifetime
/// and every field is loosely typed; the `$`-prefixed wrappers seen in the
/// time and fee fields are extended-JSON leftovers from the collection's
/// dump/restore history.
#[derive(Debug, Clone, Default)]
pub struct RawDetectionRecord {
    pub license_plate_number: Option<String>,
    pub entry_time: Option<Value>,
    pub exit_time: Option<Value>,
    pub parking_fee: Option<Value>,
}

impl RawDetectionRecord {
    /// Pull the known fields out of an arbitrary JSON document.
    pub fn from_document(doc: &Value) -> Self {
        Self {
            license_plate_number: to_plate(doc.get("license_plate_number")),
            entry_time: doc.get("entry_time").cloned(),
            exit_time: doc.get("exit_time").cloned(),
            parking_fee: doc.get("parking_fee").cloned(),
        }
    }
}

fn to_plate(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// The legal on-store encodings of a detection timestamp.
///
/// Classification is purely structural; whether the carried value actually
/// parses is decided by [`TimeEncoding::resolve`]. An unparseable value in
/// any variant resolves to `None`, never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeEncoding {
    /// `{"$date": {"$numberLong": "1712083620000"}}` — the payload may be a
    /// string or a number.
    EpochMillisWrapper(Value),
    /// `{"$date": <value>}` where the value is a date string or epoch number.
    DateWrapper(Value),
    /// A bare string or number holding the timestamp itself.
    Bare(Value),
    Absent,
}

impl TimeEncoding {
    /// Classify one raw time field into its encoding variant.
    pub fn classify(field: Option<&Value>) -> Self {
        let value = match field {
            None | Some(Value::Null) => return Self::Absent,
            Some(v) => v,
        };

        if let Some(date) = value.get("$date") {
            if let Some(long) = date.get("$numberLong") {
                return Self::EpochMillisWrapper(long.clone());
            }
            return Self::DateWrapper(date.clone());
        }

        Self::Bare(value.clone())
    }

    /// Resolve the encoding to an instant, or `None` when it does not parse.
    pub fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::EpochMillisWrapper(long) => {
                parse_i64(long).and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            }
            Self::DateWrapper(value) | Self::Bare(value) => parse_date_value(value),
            Self::Absent => None,
        }
    }
}

/// Decode one raw time field, recovering every malformed shape to `None`.
pub fn decode_time(field: Option<&Value>) -> Option<DateTime<Utc>> {
    let encoding = TimeEncoding::classify(field);
    let resolved = encoding.resolve();

    if resolved.is_none() && !matches!(encoding, TimeEncoding::Absent) {
        debug!("Unparseable timestamp shape: {:?}", encoding);
    }

    resolved
}

/// The legal on-store encodings of a parking fee.
#[derive(Debug, Clone, PartialEq)]
pub enum FeeEncoding {
    /// `{"$numberInt": "7"}` — the payload may be a string or a number.
    IntWrapper(Value),
    Number(f64),
    Text(String),
    Absent,
}

impl FeeEncoding {
    /// Classify one raw fee field into its encoding variant.
    pub fn classify(field: Option<&Value>) -> Self {
        let value = match field {
            None | Some(Value::Null) => return Self::Absent,
            Some(v) => v,
        };

        if let Some(int) = value.get("$numberInt") {
            return Self::IntWrapper(int.clone());
        }
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(f) => Self::Number(f),
                None => Self::Absent,
            },
            Value::String(s) => Self::Text(s.clone()),
            _ => Self::Absent,
        }
    }

    /// Resolve the encoding to a fee amount, defaulting to `0`.
    ///
    /// Negative and fractional values pass through untouched; there is no
    /// validation layer here. The integer wrapper truncates, matching the
    /// producers that wrote it.
    pub fn resolve(&self) -> f64 {
        match self {
            Self::IntWrapper(int) => parse_i64(int).map(|n| n as f64).unwrap_or(0.0),
            Self::Number(f) => *f,
            Self::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            Self::Absent => 0.0,
        }
    }
}

/// Decode one raw fee field, recovering every malformed shape to `0`.
pub fn decode_fee(field: Option<&Value>) -> f64 {
    FeeEncoding::classify(field).resolve()
}

fn parse_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn parse_date_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Parse a date string in the formats the store is known to contain.
///
/// Digit-only strings are NOT treated as epoch values here; only the
/// `$numberLong` wrapper carries epoch strings.
fn parse_date_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Some producers drop the timezone suffix; take those as UTC
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }

    None
}
