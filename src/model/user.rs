use chrono::NaiveDate;
use serde_json::Value;
use sqlx::types::Json;

use crate::utils::time_format::date_from_value;

/// Employee profile fields that never leave the store: they are not selected
/// by the user query and have no column in any merged, cached or exported table.
pub const EXCLUDED_USER_FIELDS: &[&str] = &[
    "password",
    "aadhar",
    "panNo",
    "image",
    "address",
    "phone",
    "email",
    "dateOfBirth",
    "linkedInId",
    "githubId",
    "isSuperUser",
    "invitedBy",
    "addedBy",
];

/// Columns of the `users` table the store adapter is allowed to read.
pub const USER_PROFILE_COLUMNS: &[&str] = &[
    "id",
    "name",
    "position",
    "joining_date",
    "leave_dates",
    "gender",
    "tags",
    "is_approved",
];

/// One employee profile, restricted to non-sensitive attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserRecord {
    pub id: String,
    pub name: Option<String>,
    pub position: Option<String>,
    pub joining_date: Option<NaiveDate>,
    pub leave_dates: Vec<LeaveInterval>,
    pub gender: Option<String>,
    pub tags: Vec<String>,
    pub approved: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeaveInterval {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub name: Option<String>,
    pub position: Option<String>,
    pub joining_date: Option<NaiveDate>,
    pub leave_dates: Option<Json<Value>>,
    pub gender: Option<String>,
    pub tags: Option<Json<Value>>,
    pub is_approved: Option<bool>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            position: row.position,
            joining_date: row.joining_date,
            leave_dates: row
                .leave_dates
                .as_deref()
                .map(LeaveInterval::list_from_value)
                .unwrap_or_default(),
            gender: row.gender,
            tags: row.tags.as_deref().map(tags_from_value).unwrap_or_default(),
            approved: row.is_approved,
        }
    }
}

impl LeaveInterval {
    fn from_value(value: &Value) -> Self {
        // older documents store the end of the leave under `leaveDate`
        Self {
            start: first_date(value, &["startDate", "start"]),
            end: first_date(value, &["endDate", "leaveDate", "end"]),
        }
    }

    pub fn list_from_value(value: &Value) -> Vec<Self> {
        value
            .as_array()
            .map(|items| items.iter().map(Self::from_value).collect())
            .unwrap_or_default()
    }
}

fn first_date(value: &Value, keys: &[&str]) -> Option<NaiveDate> {
    keys.iter()
        .find_map(|k| value.get(*k))
        .and_then(date_from_value)
}

fn tags_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}
