//! Utility functions for delivery-time checks, string truncation, and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - Parsing the daily delivery time and deciding whether a batch is due
//! - String truncation for logging provider error bodies
//! - File system validation for the local store directory

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fs as stdfs;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

/// Parse an `HH:MM` (or `HH:MM:SS`) local delivery time.
pub fn parse_delivery_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M").or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
}

/// Decide whether the daily batch should run at `now`.
///
/// The batch is due once the local clock has reached `delivery_time` and no
/// batch has completed yet on `now`'s date.
pub fn batch_is_due(now: NaiveDateTime, delivery_time: NaiveTime, last_run: Option<NaiveDate>) -> bool {
    let already_ran = last_run == Some(now.date());
    let due = now.time() >= delivery_time && !already_ran;
    debug!(%now, %delivery_time, ?last_run, due, "Computed batch due");
    due
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (on a character
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a marker file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let check_path = path.join("..__write_check__");
    stdfs::File::create(&check_path)?;
    let _ = stdfs::remove_file(&check_path);
    info!("Directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: (i32, u32, u32), h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "é".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with("é…"));
        assert!(result.contains("(+18 bytes)"));
    }

    #[test]
    fn test_parse_delivery_time() {
        assert_eq!(parse_delivery_time("08:00").unwrap(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(parse_delivery_time(" 17:30:15 ").unwrap(), NaiveTime::from_hms_opt(17, 30, 15).unwrap());
        assert!(parse_delivery_time("8am").is_err());
    }

    #[test]
    fn test_batch_not_due_before_delivery_time() {
        let eight = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert!(!batch_is_due(at((2025, 10, 6), 7, 59), eight, None));
        assert!(batch_is_due(at((2025, 10, 6), 8, 0), eight, None));
    }

    #[test]
    fn test_batch_runs_once_per_day() {
        let eight = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2025, 10, 5).unwrap();
        assert!(!batch_is_due(at((2025, 10, 6), 9, 0), eight, Some(today)));
        assert!(batch_is_due(at((2025, 10, 6), 9, 0), eight, Some(yesterday)));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__write_check__").exists());
    }
}
