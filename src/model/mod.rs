pub mod attendance;
pub mod merged;
pub mod user;

pub use attendance::{AttendanceRecord, BreakInterval, GeoPoint, Punch};
pub use merged::{Field, MergedRow, MergedTable, NOT_AVAILABLE};
pub use user::{LeaveInterval, UserRecord};
