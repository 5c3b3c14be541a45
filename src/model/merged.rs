use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::error::SyncResult;
use crate::utils::time_format::optional_timestamp;

/// Placeholder written for user-derived cells whose value is unknown.
pub const NOT_AVAILABLE: &str = "N/A";

/// A user-derived cell: either a value or the explicit `N/A` sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Value(T),
    NotAvailable,
}

impl<T> Field<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Field::Value(_))
    }

    pub fn as_ref(&self) -> Field<&T> {
        match self {
            Field::Value(v) => Field::Value(v),
            Field::NotAvailable => Field::NotAvailable,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Field::NotAvailable, Field::Value)
    }
}

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(v) => v.fmt(f),
            Field::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Value(v) => v.serialize(serializer),
            Field::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

/// Cells are always decoded from their text form, so this is only meant for
/// the delimited snapshot format.
impl<'de, T> Deserialize<'de> for Field<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == NOT_AVAILABLE {
            return Ok(Field::NotAvailable);
        }
        raw.parse()
            .map(Field::Value)
            .map_err(serde::de::Error::custom)
    }
}

/// One attendance event joined with its employee profile.
///
/// Field order is the column order of every serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MergedRow {
    #[schema(example = "6650e0c2a1b2c3d4e5f60718")]
    pub attendance_id: String,
    #[schema(example = "6650d9f0a1b2c3d4e5f60001")]
    pub employee_id: String,
    #[schema(value_type = Option<String>, format = "date", example = "2024-05-02")]
    pub date: Option<NaiveDate>,
    #[serde(with = "optional_timestamp")]
    #[schema(value_type = Option<String>, example = "2024-05-02 08:59:10")]
    pub check_in_time: Option<NaiveDateTime>,
    pub check_in_timezone: Option<String>,
    #[serde(with = "optional_timestamp")]
    #[schema(value_type = Option<String>, example = "2024-05-02 18:01:44")]
    pub check_out_time: Option<NaiveDateTime>,
    pub check_out_timezone: Option<String>,
    pub break_count: usize,
    #[schema(example = 25.0)]
    pub break_total_duration_minutes: f64,
    #[schema(example = "2024-05-02 12:00:00 - 2024-05-02 12:10:00")]
    pub break_intervals: String,
    pub total_working_hours: Option<f64>,
    pub overtime_hours: Option<f64>,
    pub status: Option<String>,
    #[schema(value_type = String, example = "Asha Rao")]
    pub employee_name: Field<String>,
    #[schema(value_type = String, example = "Backend Engineer")]
    pub employee_position: Field<String>,
    #[schema(value_type = String, example = "engineering;backend")]
    pub employee_department: Field<String>,
    #[schema(value_type = String, example = "female")]
    pub employee_gender: Field<String>,
    #[schema(value_type = String, format = "date", example = "2023-07-14")]
    pub employee_joining_date: Field<NaiveDate>,
    #[schema(value_type = String, example = "true")]
    pub employee_approved: Field<bool>,
    #[schema(value_type = String, example = "2")]
    pub employee_leave_count: Field<usize>,
    #[schema(value_type = String, example = "From 2024-01-10 to 2024-01-12")]
    pub employee_leave_dates: Field<String>,
}

impl MergedRow {
    /// Header row of the delimited form, in column order.
    pub const COLUMNS: &'static [&'static str] = &[
        "attendance_id",
        "employee_id",
        "date",
        "check_in_time",
        "check_in_timezone",
        "check_out_time",
        "check_out_timezone",
        "break_count",
        "break_total_duration_minutes",
        "break_intervals",
        "total_working_hours",
        "overtime_hours",
        "status",
        "employee_name",
        "employee_position",
        "employee_department",
        "employee_gender",
        "employee_joining_date",
        "employee_approved",
        "employee_leave_count",
        "employee_leave_dates",
    ];

    /// True when none of the user-derived columns carries a value, which is
    /// the shape of a row whose user reference did not resolve.
    pub fn is_unresolved(&self) -> bool {
        !(self.employee_name.is_available()
            || self.employee_position.is_available()
            || self.employee_department.is_available()
            || self.employee_gender.is_available()
            || self.employee_joining_date.is_available()
            || self.employee_approved.is_available()
            || self.employee_leave_count.is_available()
            || self.employee_leave_dates.is_available())
    }
}

/// Denormalized attendance view, one row per attendance record, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedTable {
    rows: Vec<MergedRow>,
}

impl MergedTable {
    pub fn new(rows: Vec<MergedRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[MergedRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<MergedRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header row plus one line per record.
    pub fn to_csv(&self) -> SyncResult<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());

        writer.write_record(MergedRow::COLUMNS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        // every cell was produced from a Rust string
        String::from_utf8(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
    }

    pub fn from_csv(text: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let rows = reader
            .deserialize::<MergedRow>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows })
    }
}
