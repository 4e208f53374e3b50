//! Period string resolution
//!
//! Every report row is labelled with a "Period" string. Depending on the export
//! this is either a plain ISO timestamp or an interval such as
//! `"Saturday, 2/12 - 7:00am - 8:00am"` (older exports omit the year, newer
//! ones write `2/12/2022`). Intervals resolve to their midpoint.

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

/// Zone the SunPower portal reports in unless told otherwise
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::US::Pacific;

/// "<Weekday>, <Month>/<Day>[/<Year>]"
static DATE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]+),\s*(\d{1,2})/(\d{1,2})(?:/(\d{4}))?$")
        .expect("date prefix pattern is valid")
});

type Strategy = fn(&str, i32, Tz) -> Option<DateTime<Tz>>;

/// Parse strategies in priority order; the first one to succeed wins
const STRATEGIES: &[(&str, Strategy)] = &[("iso", parse_iso), ("range", parse_range)];

/// Resolve a period string into an absolute timestamp
///
/// `fallback_year` is applied to interval strings that omit the year and
/// `tz` is attached to anything without explicit zone information.
///
/// Never fails: strings no strategy understands are logged and resolve to the
/// Unix epoch, so the row stays in the pipeline with a detectably-wrong time.
pub fn resolve_period(period: &str, fallback_year: i32, tz: Tz) -> DateTime<Tz> {
    for (name, strategy) in STRATEGIES {
        if let Some(resolved) = strategy(period, fallback_year, tz) {
            log::trace!("Resolved period '{}' as {} -> {}", period, name, resolved);
            return resolved;
        }
    }

    log::error!("Failed to parse period '{}'", period);
    epoch(tz)
}

/// The sentinel returned for unparsable periods
pub fn epoch(tz: Tz) -> DateTime<Tz> {
    DateTime::<Utc>::UNIX_EPOCH.with_timezone(&tz)
}

/// Attach a zone to a wall-clock time
///
/// Ambiguous times (DST fall back) take the earlier occurrence. Times inside a
/// spring-forward gap are read with the offset in force before the gap.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earlier, _later) => Some(earlier),
        LocalResult::None => {
            let before = tz
                .from_local_datetime(&(naive - Duration::hours(3)))
                .earliest()?;
            let offset = before.offset().fix().local_minus_utc();
            Some(tz.from_utc_datetime(&(naive - Duration::seconds(offset as i64))))
        }
    }
}

/// ISO-8601 date or date-time, with or without an offset
fn parse_iso(period: &str, _fallback_year: i32, tz: Tz) -> Option<DateTime<Tz>> {
    let s = period.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&tz));
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M%:z",
        "%Y-%m-%d %H:%M%:z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M%z",
        "%Y-%m-%d %H:%M%z",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&tz));
        }
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return localize(tz, naive);
        }
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    localize(tz, date.and_time(NaiveTime::MIN))
}

/// "<Weekday>, <M>/<D>[/<YYYY>] - <start> - <end>" resolved to its midpoint
fn parse_range(period: &str, fallback_year: i32, tz: Tz) -> Option<DateTime<Tz>> {
    let segments: Vec<&str> = period.split('-').map(str::trim).collect();
    let [prefix, start, end] = segments.as_slice() else {
        return None;
    };

    let date = parse_date_prefix(prefix, fallback_year)?;
    let start = localize(tz, date.and_time(parse_clock(start)?))?;
    let end_naive = date.and_time(parse_clock(end)?);
    let mut end = localize(tz, end_naive)?;

    // Interval crosses midnight; the next day's wall time may fall in a DST gap
    if end < start {
        end = localize(tz, end_naive.checked_add_days(Days::new(1))?)?;
    }

    Some(start + (end - start) / 2)
}

/// The weekday must be a weekday name but is not checked against the date
fn parse_date_prefix(prefix: &str, fallback_year: i32) -> Option<NaiveDate> {
    let caps = DATE_PREFIX.captures(prefix)?;
    caps[1].parse::<Weekday>().ok()?;

    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let year = match caps.get(4) {
        Some(year) => year.as_str().parse().ok()?,
        None => fallback_year,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

/// 12-hour clock time such as "7:00am" or "11:30 PM"
fn parse_clock(segment: &str) -> Option<NaiveTime> {
    let compact: String = segment.split_whitespace().collect();
    NaiveTime::parse_from_str(&compact, "%I:%M%p").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::US::Pacific;

    fn pacific(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Tz> {
        Pacific.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_iso_without_zone_is_localized() {
        let resolved = resolve_period("2022-02-12T07:30:00", 2022, Pacific);
        assert_eq!(resolved, pacific(2022, 2, 12, 7, 30, 0));

        let resolved = resolve_period("2022-02-12 07:30", 2022, Pacific);
        assert_eq!(resolved, pacific(2022, 2, 12, 7, 30, 0));
    }

    #[test]
    fn test_iso_ignores_fallback_year() {
        let a = resolve_period("2021-06-01T12:00:00", 1999, Pacific);
        let b = resolve_period("2021-06-01T12:00:00", 2030, Pacific);
        assert_eq!(a, b);
        assert_eq!(a, pacific(2021, 6, 1, 12, 0, 0));
    }

    #[test]
    fn test_iso_with_offset_keeps_instant() {
        let resolved = resolve_period("2022-02-12T15:30:00+00:00", 2022, Pacific);
        assert_eq!(resolved, pacific(2022, 2, 12, 7, 30, 0));

        let resolved = resolve_period("2022-02-12T15:30:00Z", 2022, Pacific);
        assert_eq!(resolved.timestamp(), pacific(2022, 2, 12, 7, 30, 0).timestamp());

        let resolved = resolve_period("2022-02-12T15:30:00+0000", 2022, Pacific);
        assert_eq!(resolved, pacific(2022, 2, 12, 7, 30, 0));

        let resolved = resolve_period("2022-02-12 10:30-0500", 2022, Pacific);
        assert_eq!(resolved, pacific(2022, 2, 12, 7, 30, 0));
    }

    #[test]
    fn test_iso_date_only_is_local_midnight() {
        let resolved = resolve_period("2022-02-12", 2000, Pacific);
        assert_eq!(resolved, pacific(2022, 2, 12, 0, 0, 0));
    }

    #[test]
    fn test_range_without_year_uses_fallback() {
        let resolved = resolve_period("Saturday, 2/12 - 7:00am - 8:00am", 2022, Pacific);
        assert_eq!(resolved, pacific(2022, 2, 12, 7, 30, 0));
    }

    #[test]
    fn test_range_with_year_ignores_fallback() {
        let resolved = resolve_period("Saturday, 2/12/2022 - 7:00am - 8:00am", 1999, Pacific);
        assert_eq!(resolved, pacific(2022, 2, 12, 7, 30, 0));
    }

    #[test]
    fn test_range_trims_segments_and_accepts_upper_case() {
        let resolved = resolve_period("  Saturday,  2/12   -   1:00PM -  3:00PM ", 2022, Pacific);
        assert_eq!(resolved, pacific(2022, 2, 12, 14, 0, 0));
    }

    #[test]
    fn test_range_wraps_past_midnight() {
        let start = pacific(2022, 2, 12, 23, 30, 0);
        let resolved = resolve_period("Saturday, 2/12 - 11:30pm - 12:30am", 2022, Pacific);
        assert!(resolved > start);
        assert_eq!(resolved, pacific(2022, 2, 13, 0, 0, 0));
    }

    #[test]
    fn test_range_wrapping_into_midnight_dst_gap() {
        // Havana springs forward at midnight on 2022-03-13, so 12:00am never happens
        let resolved = resolve_period("Saturday, 3/12 - 11:00pm - 12:00am", 2022, chrono_tz::America::Havana);
        assert_ne!(resolved.timestamp(), 0);

        // 23:00 CST is 04:00 UTC and the gap end reads as 05:00 UTC
        let expected = Utc.with_ymd_and_hms(2022, 3, 13, 4, 30, 0).unwrap();
        assert_eq!(resolved.with_timezone(&Utc), expected);
    }

    #[test]
    fn test_range_midpoint_keeps_sub_minute_precision() {
        let resolved = resolve_period("Saturday, 2/12 - 7:00am - 7:01am", 2022, Pacific);
        assert_eq!(resolved, pacific(2022, 2, 12, 7, 0, 30));
    }

    #[test]
    fn test_range_weekday_not_cross_checked() {
        // 2022-02-12 was a Saturday
        let resolved = resolve_period("Monday, 2/12 - 7:00am - 8:00am", 2022, Pacific);
        assert_eq!(resolved, pacific(2022, 2, 12, 7, 30, 0));
    }

    #[test]
    fn test_range_rejects_bad_weekday_and_date() {
        assert_eq!(resolve_period("Someday, 2/12 - 7:00am - 8:00am", 2022, Pacific).timestamp(), 0);
        assert_eq!(resolve_period("Saturday, 2/30 - 7:00am - 8:00am", 2022, Pacific).timestamp(), 0);
        assert_eq!(resolve_period("Saturday, 2/12 - 7:00am", 2022, Pacific).timestamp(), 0);
    }

    #[test]
    fn test_garbage_resolves_to_epoch() {
        let resolved = resolve_period("garbage", 2022, Pacific);
        assert_eq!(resolved.timestamp(), 0);
        assert_eq!(resolved, epoch(Pacific));
        assert_eq!(resolve_period("", 2022, Pacific).timestamp(), 0);
    }

    #[test]
    fn test_localize_spring_forward_gap() {
        // 2:30am on 2022-03-13 does not exist in Pacific time; read it as PST
        let naive = NaiveDate::from_ymd_opt(2022, 3, 13)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let resolved = localize(Pacific, naive).unwrap();
        let expected = Utc.with_ymd_and_hms(2022, 3, 13, 10, 30, 0).unwrap();
        assert_eq!(resolved.with_timezone(&Utc), expected);
    }

    #[test]
    fn test_localize_fall_back_takes_earlier() {
        // 1:30am on 2022-11-06 happens twice; the first one is PDT
        let naive = NaiveDate::from_ymd_opt(2022, 11, 6)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        let resolved = localize(Pacific, naive).unwrap();
        let expected = Utc.with_ymd_and_hms(2022, 11, 6, 8, 30, 0).unwrap();
        assert_eq!(resolved.with_timezone(&Utc), expected);
    }
}
