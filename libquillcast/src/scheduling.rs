//! Parsing of user-supplied publish times
//!
//! Accepted forms, tried in order:
//! - RFC 3339 timestamps: `2025-06-01T09:00:00Z`
//! - Unix timestamps in seconds: `1748768400`
//! - Relative durations: `30m`, `2h`, `1 day`, optionally prefixed with `in `
//! - Natural language: `tomorrow`, `next monday 10am`

use chrono::{DateTime, Duration, Utc};

use crate::error::{QuillcastError, Result};

/// Parse `input` relative to `now`
pub fn parse_schedule(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(QuillcastError::InvalidInput(
            "Schedule time cannot be empty".to_string(),
        ));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if input.chars().all(|c| c.is_ascii_digit()) {
        return input
            .parse::<i64>()
            .ok()
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .ok_or_else(|| QuillcastError::InvalidInput(format!("Invalid timestamp: {}", input)));
    }

    let relative = input.strip_prefix("in ").unwrap_or(input);
    if let Some(duration) = parse_duration(relative) {
        return now
            .checked_add_signed(duration)
            .ok_or_else(|| QuillcastError::InvalidInput("Duration out of range".to_string()));
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us).map_err(|_| {
        QuillcastError::InvalidInput(format!("Could not parse schedule time: {}", input))
    })
}

/// Parse `input` and require the result to lie after `now`
pub fn parse_future_schedule(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let when = parse_schedule(input, now)?;
    if when <= now {
        return Err(QuillcastError::InvalidInput(
            "Scheduled time must be in the future".to_string(),
        ));
    }
    Ok(when)
}

fn parse_duration(input: &str) -> Option<Duration> {
    let std_duration = humantime::parse_duration(input).ok()?;
    Duration::from_std(std_duration).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_durations() {
        assert_eq!(parse_schedule("30m", now()).unwrap(), now() + Duration::minutes(30));
        assert_eq!(parse_schedule("2h", now()).unwrap(), now() + Duration::hours(2));
        assert_eq!(parse_schedule("1day", now()).unwrap(), now() + Duration::days(1));
        assert_eq!(parse_schedule("in 90m", now()).unwrap(), now() + Duration::minutes(90));
    }

    #[test]
    fn test_parse_rfc3339() {
        let parsed = parse_schedule("2025-07-04T09:30:00+02:00", now()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 7, 4, 7, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_unix_timestamp() {
        let parsed = parse_schedule("1748779200", now()).unwrap();
        assert_eq!(parsed.timestamp(), 1_748_779_200);
    }

    #[test]
    fn test_parse_tomorrow() {
        let parsed = parse_schedule("tomorrow", now()).unwrap();
        let diff = (parsed - now()).num_hours();
        assert!((12..=36).contains(&diff), "Expected about a day, got {}h", diff);
    }

    #[test]
    fn test_parse_empty_and_garbage() {
        assert!(parse_schedule("", now()).is_err());
        assert!(parse_schedule("   ", now()).is_err());
        assert!(parse_schedule("when pigs fly", now()).is_err());
    }

    #[test]
    fn test_future_schedule_rejects_past() {
        assert!(parse_future_schedule("2020-01-01T00:00:00Z", now()).is_err());
        assert!(parse_future_schedule("10m", now()).is_ok());
    }
}
