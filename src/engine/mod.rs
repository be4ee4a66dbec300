//! Attendance policy and reporting rules. Everything in here is pure: the
//! clock and the records are always passed in.

pub mod policy;
pub mod summary;

pub use policy::{DEFAULT_CUTOFF, is_after_cutoff, is_logging_allowed, resolve_auto_status};
pub use summary::{
    AttendanceSummary, GroupKey, GroupSummary, Grouping, available_months_and_years,
    filter_by_month_year_status, summarize, summarize_by_group,
};
