//! Left join of attendance events onto employee profiles.
//!
//! This is the only place that decides which columns a merged row carries.

use std::collections::HashMap;

use crate::model::{
    AttendanceRecord, BreakInterval, Field, LeaveInterval, MergedRow, MergedTable, NOT_AVAILABLE,
    UserRecord,
};
use crate::utils::time_format::format_timestamp;

/// Aggregate of an attendance record's break sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakStats {
    pub count: usize,
    pub total_minutes: f64,
}

/// Count every stored break; only well-formed intervals contribute duration.
pub fn break_stats(breaks: &[BreakInterval]) -> BreakStats {
    let total_seconds: i64 = breaks
        .iter()
        .filter_map(BreakInterval::duration)
        .map(|d| d.num_seconds())
        .sum();

    BreakStats {
        count: breaks.len(),
        total_minutes: round_2(total_seconds as f64 / 60.0),
    }
}

/// Join `attendances` onto `users` by user reference.
///
/// Returns `None` when either side is empty: that is a normal state of the
/// store (nothing seeded yet), not an error. Otherwise yields exactly one row
/// per attendance record in input order.
pub fn merge_records(
    attendances: &[AttendanceRecord],
    users: &[UserRecord],
) -> Option<MergedTable> {
    if attendances.is_empty() || users.is_empty() {
        return None;
    }

    // first profile wins on duplicate ids, so the join never fans out
    let mut by_id: HashMap<&str, &UserRecord> = HashMap::with_capacity(users.len());
    for user in users {
        by_id.entry(user.id.as_str()).or_insert(user);
    }

    let rows = attendances
        .iter()
        .map(|attendance| merge_row(attendance, by_id.get(attendance.user_id.as_str()).copied()))
        .collect();

    Some(MergedTable::new(rows))
}

fn merge_row(attendance: &AttendanceRecord, user: Option<&UserRecord>) -> MergedRow {
    let breaks = break_stats(&attendance.breaks);
    let check_in = attendance.check_in.as_ref();
    let check_out = attendance.check_out.as_ref();

    let mut row = MergedRow {
        attendance_id: attendance.id.clone(),
        employee_id: attendance.user_id.clone(),
        date: attendance.date,
        check_in_time: check_in.and_then(|p| p.time),
        check_in_timezone: check_in.and_then(|p| p.timezone.clone()),
        check_out_time: check_out.and_then(|p| p.time),
        check_out_timezone: check_out.and_then(|p| p.timezone.clone()),
        break_count: breaks.count,
        break_total_duration_minutes: breaks.total_minutes,
        break_intervals: format_break_intervals(&attendance.breaks),
        total_working_hours: attendance.total_hours,
        overtime_hours: attendance.overtime_hours,
        status: attendance.status.clone(),
        employee_name: Field::NotAvailable,
        employee_position: Field::NotAvailable,
        employee_department: Field::NotAvailable,
        employee_gender: Field::NotAvailable,
        employee_joining_date: Field::NotAvailable,
        employee_approved: Field::NotAvailable,
        employee_leave_count: Field::NotAvailable,
        employee_leave_dates: Field::NotAvailable,
    };

    if let Some(user) = user {
        row.employee_name = user.name.clone().into();
        row.employee_position = user.position.clone().into();
        row.employee_department = Field::Value(user.tags.join(";"));
        row.employee_gender = user.gender.clone().into();
        row.employee_joining_date = user.joining_date.into();
        row.employee_approved = user.approved.into();
        row.employee_leave_count = Field::Value(user.leave_dates.len());
        row.employee_leave_dates = Field::Value(format_leave_dates(&user.leave_dates));
    }

    row
}

fn format_break_intervals(breaks: &[BreakInterval]) -> String {
    if breaks.is_empty() {
        return NOT_AVAILABLE.to_string();
    }

    breaks
        .iter()
        .map(|b| {
            format!(
                "{} - {}",
                b.start.as_ref().map_or_else(|| NOT_AVAILABLE.to_string(), format_timestamp),
                b.end.as_ref().map_or_else(|| NOT_AVAILABLE.to_string(), format_timestamp),
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_leave_dates(leaves: &[LeaveInterval]) -> String {
    leaves
        .iter()
        .map(|leave| {
            format!(
                "From {} to {}",
                Field::from(leave.start),
                Field::from(leave.end)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{NaiveDate, NaiveDateTime};

    use crate::model::{AttendanceRecord, BreakInterval, LeaveInterval, Punch, UserRecord};

    pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    pub fn attendance(id: &str, user_id: &str) -> AttendanceRecord {
        AttendanceRecord {
            id: id.to_string(),
            user_id: user_id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 2),
            check_in: Some(Punch {
                time: Some(at(9, 0)),
                timezone: Some("Asia/Kolkata".to_string()),
                location: None,
            }),
            check_out: None,
            breaks: vec![BreakInterval {
                start: Some(at(12, 0)),
                end: Some(at(12, 30)),
            }],
            total_hours: Some(8.0),
            overtime_hours: Some(0.5),
            status: Some("present".to_string()),
        }
    }

    pub fn user(id: &str, name: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            name: Some(name.to_string()),
            position: Some("Engineer".to_string()),
            joining_date: NaiveDate::from_ymd_opt(2023, 7, 14),
            leave_dates: vec![LeaveInterval {
                start: NaiveDate::from_ymd_opt(2024, 1, 10),
                end: NaiveDate::from_ymd_opt(2024, 1, 12),
            }],
            gender: Some("female".to_string()),
            tags: vec!["engineering".to_string(), "backend".to_string()],
            approved: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{at, attendance, user};
    use super::*;

    #[test]
    fn empty_side_yields_no_table() {
        assert!(merge_records(&[], &[user("u1", "Asha")]).is_none());
        assert!(merge_records(&[attendance("a1", "u1")], &[]).is_none());
        assert!(merge_records(&[], &[]).is_none());
    }

    #[test]
    fn two_valid_breaks_and_one_malformed() {
        let breaks = vec![
            BreakInterval {
                start: Some(at(11, 0)),
                end: Some(at(11, 10)),
            },
            BreakInterval {
                start: Some(at(15, 0)),
                end: Some(at(15, 15)),
            },
            BreakInterval {
                start: Some(at(16, 0)),
                end: None,
            },
        ];

        let stats = break_stats(&breaks);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.total_minutes, 25.0);
        assert_eq!(
            format_break_intervals(&breaks),
            "2024-05-02 11:00:00 - 2024-05-02 11:10:00; \
             2024-05-02 15:00:00 - 2024-05-02 15:15:00; \
             2024-05-02 16:00:00 - N/A"
        );
    }

    #[test]
    fn dangling_reference_gets_sentinels_and_keeps_attendance_fields() {
        let attendances = vec![
            attendance("a1", "u1"),
            attendance("a2", "u2"),
            attendance("a3", "ghost"),
        ];
        let users = vec![user("u1", "Asha"), user("u2", "Ravi")];

        let table = merge_records(&attendances, &users).unwrap();
        assert_eq!(table.len(), 3);

        let ids: Vec<&str> = table.rows().iter().map(|r| r.attendance_id.as_str()).collect();
        assert_eq!(ids, ["a1", "a2", "a3"]);

        let orphan = &table.rows()[2];
        assert!(orphan.is_unresolved());
        assert_eq!(orphan.employee_id, "ghost");
        assert_eq!(orphan.check_in_time, Some(at(9, 0)));
        assert_eq!(orphan.break_count, 1);
        assert_eq!(orphan.break_total_duration_minutes, 30.0);
        assert_eq!(orphan.total_working_hours, Some(8.0));
        assert_eq!(orphan.status.as_deref(), Some("present"));

        let resolved = &table.rows()[1];
        assert_eq!(resolved.employee_name, Field::Value("Ravi".to_string()));
        assert_eq!(
            resolved.employee_department,
            Field::Value("engineering;backend".to_string())
        );
        assert_eq!(resolved.employee_leave_count, Field::Value(1));
        assert_eq!(
            resolved.employee_leave_dates,
            Field::Value("From 2024-01-10 to 2024-01-12".to_string())
        );
    }

    #[test]
    fn duplicate_user_ids_do_not_fan_out() {
        let users = vec![user("u1", "First"), user("u1", "Second")];
        let table = merge_records(&[attendance("a1", "u1")], &users).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].employee_name, Field::Value("First".to_string()));
    }

    #[test]
    fn merge_is_byte_identical_across_runs() {
        let attendances = vec![attendance("a1", "u1"), attendance("a2", "ghost")];
        let users = vec![user("u1", "Asha")];

        let first = merge_records(&attendances, &users).unwrap().to_csv().unwrap();
        let second = merge_records(&attendances, &users).unwrap().to_csv().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn resolved_user_without_optional_fields() {
        let bare = UserRecord {
            id: "u1".to_string(),
            ..UserRecord::default()
        };
        let table = merge_records(&[attendance("a1", "u1")], &[bare]).unwrap();
        let row = &table.rows()[0];

        assert_eq!(row.employee_name, Field::NotAvailable);
        assert_eq!(row.employee_leave_count, Field::Value(0));
        assert_eq!(row.employee_leave_dates, Field::Value(String::new()));
        assert!(!row.is_unresolved());
    }
}
