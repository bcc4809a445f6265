//! The activity log is organized through [log_storage::CsvLogStorage].
//! The basic idea is:
//!   - The log is a single CSV file with `date,name,status` rows.
//!   - Only completed (`y`) and skipped (`s`) marks are stored.
//!   - The whole file is rewritten on save, never appended to.

pub mod log_storage;
