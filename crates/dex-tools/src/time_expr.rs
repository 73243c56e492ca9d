use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use regex::Regex;

/// Resolves the loose time expressions the planner's rule-based fallback
/// extracts (`"5m"`, `"2h"`, `"3d"`, `"3pm"`, `"15:30"`, `"tomorrow"`,
/// `"tomorrow3pm"`) into an absolute UTC instant relative to `now`.
pub fn parse_reminder_time(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim().to_lowercase();

    if let Some(rest) = raw.strip_prefix("tomorrow") {
        let time_part = rest.trim();
        let time = if time_part.is_empty() {
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        } else {
            parse_clock(time_part)?
        };
        let tomorrow = (now + Duration::days(1)).date_naive();
        return Ok(Utc.from_utc_datetime(&tomorrow.and_time(time)));
    }

    if let Some(caps) = Regex::new(r"^(\d+)m$").unwrap().captures(&raw) {
        let minutes: i64 = caps[1].parse().map_err(|_| "invalid minute count".to_string())?;
        return Ok(now + Duration::minutes(minutes));
    }
    if let Some(caps) = Regex::new(r"^(\d+)h$").unwrap().captures(&raw) {
        let hours: i64 = caps[1].parse().map_err(|_| "invalid hour count".to_string())?;
        return Ok(now + Duration::hours(hours));
    }
    if let Some(caps) = Regex::new(r"^(\d+)d$").unwrap().captures(&raw) {
        let days: i64 = caps[1].parse().map_err(|_| "invalid day count".to_string())?;
        return Ok(now + Duration::days(days));
    }

    // Absolute clock time: fires today if still ahead, else tomorrow.
    let time = parse_clock(&raw)?;
    let today = now.date_naive();
    let candidate = Utc.from_utc_datetime(&today.and_time(time));
    if candidate > now {
        Ok(candidate)
    } else {
        Ok(Utc.from_utc_datetime(&(today + Duration::days(1)).and_time(time)))
    }
}

fn parse_clock(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    let caps = Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*(am|pm)?$")
        .unwrap()
        .captures(raw)
        .ok_or_else(|| format!("unrecognized time expression: {raw}"))?;

    let mut hour: u32 = caps[1].parse().map_err(|_| "invalid hour".to_string())?;
    let minute: u32 = caps.get(2).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);

    if let Some(meridiem) = caps.get(3) {
        let is_pm = meridiem.as_str() == "pm";
        if is_pm && hour != 12 {
            hour += 12;
        } else if !is_pm && hour == 12 {
            hour = 0;
        }
    }

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| format!("invalid time: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 31, 10, 0, 0).unwrap()
    }

    #[test]
    fn minutes_relative_offset() {
        let result = parse_reminder_time("5m", fixed_now()).unwrap();
        assert_eq!(result, fixed_now() + Duration::minutes(5));
    }

    #[test]
    fn default_one_minute_is_not_one_hour() {
        // "1m" must mean one minute, matching the planner's documented
        // fallback default, not one hour.
        let result = parse_reminder_time("1m", fixed_now()).unwrap();
        assert_eq!(result, fixed_now() + Duration::minutes(1));
    }

    #[test]
    fn absolute_time_today_if_still_ahead() {
        let result = parse_reminder_time("3pm", fixed_now()).unwrap();
        assert_eq!(result.date_naive(), fixed_now().date_naive());
        assert_eq!(result.hour(), 15);
    }

    #[test]
    fn absolute_time_rolls_to_tomorrow_if_passed() {
        let result = parse_reminder_time("9am", fixed_now()).unwrap();
        assert_eq!(result.date_naive(), (fixed_now() + Duration::days(1)).date_naive());
    }

    #[test]
    fn tomorrow_without_time_defaults_to_nine_am() {
        let result = parse_reminder_time("tomorrow", fixed_now()).unwrap();
        assert_eq!(result.hour(), 9);
        assert_eq!(result.date_naive(), (fixed_now() + Duration::days(1)).date_naive());
    }

    #[test]
    fn tomorrow_with_time() {
        let result = parse_reminder_time("tomorrow3pm", fixed_now()).unwrap();
        assert_eq!(result.hour(), 15);
    }
}
