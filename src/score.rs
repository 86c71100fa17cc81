//! Normalisation of the store's many score representations
//!
//! The spreadsheet backend hands back elapsed times as plain numbers, `MM:SS`
//! or `HH:MM:SS` strings, or (when a cell was auto-formatted as a time) as a
//! date-time whose time-of-day carries the duration. Everything is folded into
//! [`ElapsedTime`]; anything unreadable becomes [`ElapsedTime::Unfinished`].

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde_json::Value;
use std::fmt;

/// Shown in place of a time for players that did not finish
pub const UNFINISHED_LABEL: &str = "did not finish";

/// Canonical elapsed time of one run.
///
/// Variant order matters: every `Finished` value sorts before `Unfinished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElapsedTime {
    /// Milliseconds from session start to the last puzzle solved
    Finished(u64),
    Unfinished,
}

impl ElapsedTime {
    pub fn from_millis(ms: u64) -> Self {
        ElapsedTime::Finished(ms)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, ElapsedTime::Finished(_))
    }

    pub fn as_millis(&self) -> Option<u64> {
        match self {
            ElapsedTime::Finished(ms) => Some(*ms),
            ElapsedTime::Unfinished => None,
        }
    }

    /// Representation written to the store's score column
    pub fn to_cell(&self) -> String {
        match self {
            ElapsedTime::Finished(ms) => format_millis(*ms),
            ElapsedTime::Unfinished => String::new(),
        }
    }
}

impl fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_elapsed(*self))
    }
}

/// Parse any score cell. Never fails; unreadable input is `Unfinished`.
pub fn parse_score(raw: &Value) -> ElapsedTime {
    match raw {
        Value::Number(n) => n.as_f64().map(from_f64).unwrap_or(ElapsedTime::Unfinished),
        Value::String(s) => parse_score_str(s),
        _ => ElapsedTime::Unfinished,
    }
}

pub fn parse_score_str(raw: &str) -> ElapsedTime {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ElapsedTime::Unfinished;
    }

    if let Some(ms) = parse_clock(trimmed) {
        return ElapsedTime::Finished(ms);
    }

    if let Ok(number) = trimmed.parse::<f64>() {
        return from_f64(number);
    }

    parse_time_of_day(trimmed)
        .map(ElapsedTime::Finished)
        .unwrap_or(ElapsedTime::Unfinished)
}

/// `MM:SS` for finished runs, [`UNFINISHED_LABEL`] otherwise
pub fn format_elapsed(elapsed: ElapsedTime) -> String {
    match elapsed {
        ElapsedTime::Finished(ms) => format_millis(ms),
        ElapsedTime::Unfinished => UNFINISHED_LABEL.to_string(),
    }
}

/// Whole seconds only; minutes grow past two digits rather than rolling over
pub fn format_millis(ms: u64) -> String {
    let total_seconds = ms / 1000;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

fn from_f64(value: f64) -> ElapsedTime {
    if value.is_finite() && value >= 0.0 {
        ElapsedTime::Finished(value.floor() as u64)
    } else {
        ElapsedTime::Unfinished
    }
}

/// `MM:SS` or `HH:MM:SS`. Minutes and seconds after the first group are two digits.
fn parse_clock(raw: &str) -> Option<u64> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    let digits: Vec<u64> = parts.iter().map(|p| p.parse().ok()).collect::<Option<_>>()?;
    let seconds = match (parts.as_slice(), digits.as_slice()) {
        ([_, ss], [minutes, seconds]) if ss.len() == 2 => {
            minutes.checked_mul(60)?.checked_add(*seconds)?
        }
        ([hh, mm, ss], [hours, minutes, seconds])
            if hh.len() <= 2 && mm.len() == 2 && ss.len() == 2 =>
        {
            hours * 3600 + minutes * 60 + seconds
        }
        _ => return None,
    };
    seconds.checked_mul(1000)
}

/// The date part is meaningless here: the backend stores durations as an
/// offset into its epoch day, so only the UTC time-of-day is kept.
fn parse_time_of_day(raw: &str) -> Option<u64> {
    let utc: DateTime<Utc> = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.with_timezone(&Utc)
    } else if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        dt.with_timezone(&Utc)
    } else {
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())?
            .and_utc()
    };

    let time = utc.time();
    let millis = (time.nanosecond() / 1_000_000).min(999) as u64;
    Some(
        time.hour() as u64 * 3_600_000
            + time.minute() as u64 * 60_000
            + time.second() as u64 * 1000
            + millis,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_are_milliseconds() {
        assert_eq!(parse_score(&json!(83400)), ElapsedTime::Finished(83_400));
        assert_eq!(parse_score(&json!(1500.7)), ElapsedTime::Finished(1500));
        assert_eq!(parse_score(&json!(-5)), ElapsedTime::Unfinished);
    }

    #[test]
    fn test_clock_strings() {
        assert_eq!(parse_score_str("01:23"), ElapsedTime::Finished(83_000));
        assert_eq!(parse_score_str("1:05"), ElapsedTime::Finished(65_000));
        assert_eq!(parse_score_str("01:02:03"), ElapsedTime::Finished(3_723_000));
        assert_eq!(parse_score_str("125:00"), ElapsedTime::Finished(7_500_000));
    }

    #[test]
    fn test_bare_numeric_strings() {
        assert_eq!(parse_score_str(" 4200 "), ElapsedTime::Finished(4200));
        assert_eq!(parse_score_str("Infinity"), ElapsedTime::Unfinished);
        assert_eq!(parse_score_str("NaN"), ElapsedTime::Unfinished);
    }

    #[test]
    fn test_spreadsheet_time_of_day_ignores_date() {
        assert_eq!(
            parse_score_str("1899-12-30T00:01:23.000Z"),
            ElapsedTime::Finished(83_000)
        );
        assert_eq!(
            parse_score_str("1899-12-30T00:00:42.250Z"),
            ElapsedTime::Finished(42_250)
        );
        assert_eq!(
            parse_score_str("2024-05-01 00:02:00"),
            ElapsedTime::Finished(120_000)
        );
    }

    #[test]
    fn test_unreadable_input_is_unfinished() {
        for raw in [
            json!(null),
            json!(""),
            json!("   "),
            json!("soon"),
            json!("1:2:3:4"),
            json!("12:5"),
            json!(true),
            json!([1, 2]),
            json!({"score": 3}),
        ] {
            assert_eq!(parse_score(&raw), ElapsedTime::Unfinished, "input {raw}");
        }
    }

    #[test]
    fn test_oversized_clock_is_unfinished() {
        assert_eq!(
            parse_score(&json!("100000000000000000:00")),
            ElapsedTime::Unfinished
        );
        assert_eq!(parse_score_str("307445734561825860:15"), ElapsedTime::Unfinished);
        assert_eq!(parse_score_str("18446744073709551615:00"), ElapsedTime::Unfinished);
        assert_eq!(parse_score_str("99999999999999999999999:00"), ElapsedTime::Unfinished);
        assert_eq!(parse_score_str("99:59:59"), ElapsedTime::Finished(359_999_000));
    }

    #[test]
    fn test_hostile_input_never_panics() {
        let long_digits = "9".repeat(400);
        let strings = [
            long_digits.clone(),
            format!("{long_digits}:00"),
            format!("00:{long_digits}"),
            format!("{long_digits}:{long_digits}:{long_digits}"),
            format!("{}:59", u64::MAX),
            format!("{}:59", u64::MAX / 60),
            format!("{}:00", u64::MAX / 60_000 + 1),
            "-1:00".to_string(),
            "-01:-30".to_string(),
            "1e308".to_string(),
            "-1e308".to_string(),
            "::".to_string(),
            ":00".to_string(),
            "1:2:3:4:5:6".to_string(),
            "99:99:99".to_string(),
            "12:34:56:78".to_string(),
            "٣:٤٥".to_string(),
            "9999-99-99T99:99:99Z".to_string(),
        ];
        for raw in &strings {
            let _ = parse_score_str(raw);
            let _ = parse_score(&json!(raw));
        }

        for raw in [
            json!(u64::MAX),
            json!(i64::MIN),
            json!(1e308),
            json!(-1e308),
            json!(f64::MAX),
            json!(0.000001),
        ] {
            let _ = parse_score(&raw);
        }
        assert_eq!(parse_score(&json!(-1e308)), ElapsedTime::Unfinished);
        assert!(parse_score(&json!(1e308)).is_finished());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_elapsed(ElapsedTime::Finished(0)), "00:00");
        assert_eq!(format_elapsed(ElapsedTime::Finished(83_999)), "01:23");
        assert_eq!(format_elapsed(ElapsedTime::Unfinished), UNFINISHED_LABEL);
        assert!(!ElapsedTime::Unfinished.to_string().contains("inf"));
        assert_eq!(ElapsedTime::Unfinished.to_cell(), "");
    }

    #[test]
    fn test_format_then_parse_keeps_whole_seconds() {
        for ms in [0u64, 999, 1000, 59_999, 60_000, 83_456, 119_900, 3_599_999, 7_265_001] {
            let parsed = parse_score_str(&format_millis(ms));
            assert_eq!(parsed, ElapsedTime::Finished(ms / 1000 * 1000), "ms {ms}");
        }
    }

    #[test]
    fn test_unfinished_sorts_after_every_finished_time() {
        let mut times = vec![
            ElapsedTime::Unfinished,
            ElapsedTime::Finished(u64::MAX),
            ElapsedTime::Finished(3),
        ];
        times.sort();
        assert_eq!(
            times,
            vec![
                ElapsedTime::Finished(3),
                ElapsedTime::Finished(u64::MAX),
                ElapsedTime::Unfinished
            ]
        );
    }
}
