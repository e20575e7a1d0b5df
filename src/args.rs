//! Argument-vector builders shared by every high-level command.
//!
//! Every command in [`crate::commands`] assembles its argv through these
//! three primitives rather than hand-rolling `if`/`push` chains, so the
//! conditional-flag shape stays uniform across the whole command API.

use chrono::{DateTime, TimeZone};

/// Appends `flag` to `args` iff `condition` is true.
pub fn add_if(args: &mut Vec<String>, condition: bool, flag: &str) {
    if condition {
        args.push(flag.to_string());
    }
}

/// Appends `prefix` followed by `value` iff `value` is non-empty.
pub fn add_pair_if_nonempty(args: &mut Vec<String>, prefix: &str, value: &str) {
    if !value.is_empty() {
        args.push(prefix.to_string());
        args.push(value.to_string());
    }
}

/// Appends `prefix` followed by `date` formatted as `yyyy-MM-dd HH:mm:ss`,
/// iff a date was supplied.
pub fn add_date_if<Tz: TimeZone>(args: &mut Vec<String>, prefix: &str, date: Option<&DateTime<Tz>>)
where
    Tz::Offset: std::fmt::Display,
{
    if let Some(date) = date {
        args.push(prefix.to_string());
        args.push(date.format("%Y-%m-%d %H:%M:%S").to_string());
    }
}
