use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::types::Json;

use crate::utils::time_format::timestamp_from_value;

/// One check-in/check-out event as stored in the `attendances` collection.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub id: String,
    /// Reference to `UserRecord::id`; may dangle.
    pub user_id: String,
    pub date: Option<NaiveDate>,
    pub check_in: Option<Punch>,
    pub check_out: Option<Punch>,
    pub breaks: Vec<BreakInterval>,
    pub total_hours: Option<f64>,
    pub overtime_hours: Option<f64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Punch {
    pub time: Option<NaiveDateTime>,
    pub timezone: Option<String>,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A break boundary pair. Unparsable timestamps decode to `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BreakInterval {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl BreakInterval {
    /// Whole-interval length, or `None` when either bound is missing or the
    /// interval runs backwards.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }
}

/// Raw row shape of the `attendances` table.
#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: String,
    pub user_id: String,
    pub date: Option<NaiveDate>,
    pub check_in: Option<Json<Value>>,
    pub check_out: Option<Json<Value>>,
    pub breaks: Option<Json<Value>>,
    pub total_hours: Option<f64>,
    pub overtime_hours: Option<f64>,
    pub status: Option<String>,
}

impl From<AttendanceRow> for AttendanceRecord {
    fn from(row: AttendanceRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            check_in: row.check_in.as_deref().and_then(Punch::from_value),
            check_out: row.check_out.as_deref().and_then(Punch::from_value),
            breaks: row
                .breaks
                .as_deref()
                .map(BreakInterval::list_from_value)
                .unwrap_or_default(),
            total_hours: row.total_hours,
            overtime_hours: row.overtime_hours,
            status: non_empty(row.status),
        }
    }
}

/// Blank text reads back from the delimited snapshot as absent, so it is
/// absent from the start.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl Punch {
    /// Accepts either `{time, timezone, location}` objects or a bare timestamp.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Object(map) if !map.contains_key("$date") => Some(Self {
                time: map.get("time").and_then(timestamp_from_value),
                timezone: non_empty(
                    map.get("timezone")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                ),
                location: map.get("location").and_then(GeoPoint::from_value),
            }),
            other => Some(Self {
                time: timestamp_from_value(other),
                ..Self::default()
            }),
        }
    }
}

impl GeoPoint {
    fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            latitude: value.get("latitude")?.as_f64()?,
            longitude: value.get("longitude")?.as_f64()?,
        })
    }
}

impl BreakInterval {
    fn from_value(value: &Value) -> Self {
        let bound = |keys: [&str; 2]| {
            keys.iter()
                .find_map(|k| value.get(*k))
                .and_then(timestamp_from_value)
        };
        Self {
            start: bound(["startTime", "start"]),
            end: bound(["endTime", "end"]),
        }
    }

    /// Every array element yields one interval, even when it is garbage,
    /// so the break count always matches the stored sequence.
    pub fn list_from_value(value: &Value) -> Vec<Self> {
        value
            .as_array()
            .map(|items| items.iter().map(Self::from_value).collect())
            .unwrap_or_default()
    }
}
