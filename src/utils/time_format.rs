use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Rendering used for every timestamp cell of the merged table.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a timestamp string in any of the shapes the attendance documents carry.
/// Offsets are normalised to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Decode a timestamp out of a JSON document field.
///
/// Accepts plain strings, epoch milliseconds and extended JSON `{"$date": ...}`.
/// Anything else is treated as absent.
pub fn timestamp_from_value(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        Value::Object(map) => map.get("$date").and_then(timestamp_from_value),
        _ => None,
    }
}

pub fn date_from_value(value: &Value) -> Option<NaiveDate> {
    if let Value::String(s) = value {
        if let Ok(d) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
            return Some(d);
        }
    }
    timestamp_from_value(value).map(|dt| dt.date())
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// serde adapter for `Option<NaiveDateTime>` cells rendered as `YYYY-MM-DD HH:MM:SS`.
pub mod optional_timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.collect_str(&ts.format(TIMESTAMP_FORMAT)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
                .map(Some)
                .map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_rfc3339_and_naive_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();

        assert_eq!(parse_timestamp("2024-03-01T09:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T11:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T09:30:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("   "), None);
    }

    #[test]
    fn decodes_extended_json_and_epoch_millis() {
        let ts = timestamp_from_value(&json!({"$date": "2024-03-01T09:30:00Z"})).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-01 09:30:00");

        let ts = timestamp_from_value(&json!(0)).unwrap();
        assert_eq!(format_timestamp(&ts), "1970-01-01 00:00:00");

        assert_eq!(timestamp_from_value(&json!(true)), None);
        assert_eq!(timestamp_from_value(&json!({"time": 3})), None);
    }

    #[test]
    fn date_accepts_plain_dates_and_timestamps() {
        let d = NaiveDate::from_ymd_opt(2023, 7, 14).unwrap();
        assert_eq!(date_from_value(&json!("2023-07-14")), Some(d));
        assert_eq!(date_from_value(&json!("2023-07-14T18:00:00Z")), Some(d));
        assert_eq!(date_from_value(&json!("14/07/2023")), None);
    }
}
