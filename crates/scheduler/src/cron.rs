//! Timezone-safe 5-field cron evaluator (spec §4.M, component M).
//!
//! Grounded on the teacher's `cron_next_tz`/`cron_matches_naive`/`parse_tz`
//! (`crates/gateway/src/runtime/schedules/cron.rs`) for field materialization
//! and the classical cron day-match rule (day-of-month OR day-of-week when
//! both are constrained). The next-fire search itself walks a UTC instant
//! cursor rather than a local-naive one: at each candidate instant we format
//! `{month, day, weekday, hour, minute}` via `cursor.with_timezone(&tz)` (spec
//! §4.M's "zoned-time formatter") and snap the cursor forward to the next UTC
//! hour/day boundary on a field mismatch. A UTC cursor makes every instant
//! map to exactly one local time — nonexistent local times (spring-forward)
//! are never produced by the instant→local direction, so they are skipped
//! for free, and repeated local times (fall-back) are visited twice, once
//! per underlying UTC instant, so the search can land on the *second*
//! occurrence instead of only ever finding the first.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use sa_domain::error::{Error, Result};

const MAX_ITERATIONS: u32 = 600_000;
const MAX_LOOKAHEAD_YEARS: i32 = 5;

/// Parse a timezone string into a `chrono_tz::Tz`. Unlike the teacher's
/// `parse_tz` (which falls back to UTC), an invalid zone is a
/// `cron_invalid` error per spec §6 ("an invalid zone returns `undefined`
/// from the normalizer").
pub fn parse_tz(tz: &str) -> Result<chrono_tz::Tz> {
    tz.parse::<chrono_tz::Tz>()
        .map_err(|_| Error::CronInvalid { field: "timezone".into(), message: format!("unknown IANA zone: {tz}") })
}

/// A materialized cron field: sorted unique values plus whether the set
/// spans the field's full legal range (spec §4.M: "true iff the set equals
/// the full range").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronField {
    pub values: Vec<u32>,
    pub any: bool,
}

impl CronField {
    fn new(mut values: Vec<u32>, min: u32, max: u32) -> Self {
        values.sort_unstable();
        values.dedup();
        let any = values.len() as u64 == (max - min + 1) as u64
            && values.first() == Some(&min)
            && values.last() == Some(&max);
        Self { values, any }
    }

    pub fn matches(&self, value: u32) -> bool {
        self.values.binary_search(&value).is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct CronSchedule {
    pub minute: CronField,
    pub hour: CronField,
    pub day_of_month: CronField,
    pub month: CronField,
    /// Normalized to 0..=6 (Sunday=0); `7` in the source is folded into `0`.
    pub day_of_week: CronField,
}

fn parse_field(raw: &str, min: u32, max: u32, normalize: impl Fn(u32) -> u32) -> Result<Vec<u32>> {
    let mut values = Vec::new();
    for part in raw.split(',') {
        if part == "*" {
            values.extend(min..=max);
            continue;
        }
        if let Some(step_str) = part.strip_prefix("*/") {
            let step: u32 = step_str
                .parse()
                .map_err(|_| Error::CronInvalid { field: "step".into(), message: format!("bad step in '{part}'") })?;
            if step == 0 {
                return Err(Error::CronInvalid { field: "step".into(), message: "step must be > 0".into() });
            }
            let mut v = min;
            while v <= max {
                values.push(v);
                v += step;
            }
            continue;
        }
        if let Some((range, step_str)) = part.split_once('/') {
            let step: u32 = step_str
                .parse()
                .map_err(|_| Error::CronInvalid { field: "step".into(), message: format!("bad step in '{part}'") })?;
            if step == 0 {
                return Err(Error::CronInvalid { field: "step".into(), message: "step must be > 0".into() });
            }
            let (start, end) = parse_range(range, min, max)?;
            let mut v = start;
            while v <= end {
                values.push(v);
                v += step;
            }
            continue;
        }
        if part.contains('-') {
            let (start, end) = parse_range(part, min, max)?;
            values.extend(start..=end);
            continue;
        }
        let n: u32 = part
            .parse()
            .map_err(|_| Error::CronInvalid { field: "value".into(), message: format!("bad value '{part}'") })?;
        if n < min || n > max {
            return Err(Error::CronInvalid {
                field: "value".into(),
                message: format!("{n} out of range {min}..={max}"),
            });
        }
        values.push(n);
    }
    Ok(values.into_iter().map(normalize).collect())
}

fn parse_range(raw: &str, min: u32, max: u32) -> Result<(u32, u32)> {
    let (start_s, end_s) = raw
        .split_once('-')
        .ok_or_else(|| Error::CronInvalid { field: "range".into(), message: format!("bad range '{raw}'") })?;
    let start: u32 = start_s
        .parse()
        .map_err(|_| Error::CronInvalid { field: "range".into(), message: format!("bad range start '{raw}'") })?;
    let end: u32 = end_s
        .parse()
        .map_err(|_| Error::CronInvalid { field: "range".into(), message: format!("bad range end '{raw}'") })?;
    if start > end || start < min || end > max {
        return Err(Error::CronInvalid { field: "range".into(), message: format!("range '{raw}' outside {min}..={max}") });
    }
    Ok((start, end))
}

impl CronSchedule {
    /// Parse the 5-field form: `minute hour dayOfMonth month dayOfWeek`.
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(Error::CronInvalid {
                field: "expr".into(),
                message: format!("expected 5 fields, got {}", fields.len()),
            });
        }
        let minute = CronField::new(parse_field(fields[0], 0, 59, |v| v)?, 0, 59);
        let hour = CronField::new(parse_field(fields[1], 0, 23, |v| v)?, 0, 23);
        let day_of_month = CronField::new(parse_field(fields[2], 1, 31, |v| v)?, 1, 31);
        let month = CronField::new(parse_field(fields[3], 1, 12, |v| v)?, 1, 12);
        // dow accepts 0..=7 with 7 folded into 0, so parse against 0..=7
        // then normalize and rebuild the field against the canonical 0..=6.
        let raw_dow = parse_field(fields[4], 0, 7, |v| if v == 7 { 0 } else { v })?;
        let day_of_week = CronField::new(raw_dow, 0, 6);
        Ok(Self { minute, hour, day_of_month, month, day_of_week })
    }

    /// Classical cron day-match rule (spec §4.M): if both day-of-month and
    /// day-of-week are constrained, a match in *either* suffices; if one is
    /// `any` the other decides; both `any` always matches.
    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom_match = self.day_of_month.matches(date.day());
        let dow_match = self.day_of_week.matches(date.weekday().num_days_from_sunday());
        match (self.day_of_month.any, self.day_of_week.any) {
            (true, true) => true,
            (true, false) => dow_match,
            (false, true) => dom_match,
            (false, false) => dom_match || dow_match,
        }
    }
}

/// Smallest UTC instant strictly after `cursor`, truncated to the start of
/// an hour.
fn next_utc_hour_boundary(cursor: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = cursor.with_minute(0).unwrap().with_second(0).unwrap().with_nanosecond(0).unwrap();
    if truncated <= cursor {
        truncated + Duration::hours(1)
    } else {
        truncated
    }
}

/// Smallest UTC instant strictly after `cursor`, truncated to the start of
/// a day.
fn next_utc_day_boundary(cursor: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = Utc.from_utc_datetime(&cursor.date_naive().and_hms_opt(0, 0, 0).unwrap());
    if truncated <= cursor {
        truncated + Duration::days(1)
    } else {
        truncated
    }
}

/// Compute the next fire time after `after`, evaluated in UTC.
pub fn next_run_at_utc(expr: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    next_run_at_tz(expr, after, chrono_tz::UTC)
}

/// Compute the next fire time after `after`, evaluated in the given
/// timezone (spec §4.M, DST-correct per the §8 scenarios).
///
/// Walks a UTC instant cursor rather than a local-naive one (spec §4.M's
/// zoned-time formatter): at each candidate instant, local fields are read
/// via `cursor.with_timezone(&tz)`, which is always well-defined for a
/// concrete UTC instant. A field mismatch snaps the cursor forward to the
/// next UTC day/hour boundary (month and day-of-month/day-of-week
/// mismatches snap by day; hour mismatches snap by hour); a minute
/// mismatch steps by one UTC minute. Nonexistent local times
/// (spring-forward) are never produced by the instant-to-local direction,
/// so they're skipped automatically; repeated local times (fall-back) are
/// visited once per underlying UTC instant, so the second occurrence is
/// reachable rather than only ever the first.
pub fn next_run_at_tz(expr: &str, after: DateTime<Utc>, tz: chrono_tz::Tz) -> Result<Option<DateTime<Utc>>> {
    let schedule = CronSchedule::parse(expr)?;
    let mut cursor = (after + Duration::minutes(1)).with_second(0).unwrap().with_nanosecond(0).unwrap();
    let deadline_year = cursor.with_timezone(&tz).year() + MAX_LOOKAHEAD_YEARS;

    for _ in 0..MAX_ITERATIONS {
        let local = cursor.with_timezone(&tz);
        if local.year() > deadline_year {
            return Ok(None);
        }
        if !schedule.month.matches(local.month()) {
            cursor = next_utc_day_boundary(cursor);
            continue;
        }
        if !schedule.day_matches(local.date_naive()) {
            cursor = next_utc_day_boundary(cursor);
            continue;
        }
        if !schedule.hour.matches(local.hour()) {
            cursor = next_utc_hour_boundary(cursor);
            continue;
        }
        if !schedule.minute.matches(local.minute()) {
            cursor += Duration::minutes(1);
            continue;
        }
        return Ok(Some(cursor));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn every_five_minutes_field_is_not_any() {
        let s = CronSchedule::parse("*/5 * * * *").unwrap();
        assert!(!s.minute.any);
        assert!(s.minute.matches(0));
        assert!(!s.minute.matches(3));
        assert!(s.hour.any);
    }

    #[test]
    fn star_and_full_range_both_report_any() {
        let a = CronSchedule::parse("* * * * *").unwrap();
        let b = CronSchedule::parse("0-59 * * * *").unwrap();
        assert!(a.minute.any);
        assert!(b.minute.any);
    }

    #[test]
    fn dow_seven_folds_into_zero() {
        let s = CronSchedule::parse("0 0 * * 7").unwrap();
        assert!(s.day_of_week.matches(0));
        assert_eq!(s.day_of_week.values, vec![0]);
    }

    #[test]
    fn both_day_fields_constrained_use_or_rule() {
        // 15th of the month OR Monday
        let s = CronSchedule::parse("0 0 15 * 1").unwrap();
        let the_15th_tuesday = NaiveDate::from_ymd_opt(2026, 7, 15).unwrap(); // not a Monday
        assert!(s.day_matches(the_15th_tuesday));
        let some_monday = NaiveDate::from_ymd_opt(2026, 7, 20).unwrap();
        assert!(s.day_matches(some_monday));
        let neither = NaiveDate::from_ymd_opt(2026, 7, 21).unwrap();
        assert!(!s.day_matches(neither));
    }

    #[test]
    fn invalid_timezone_is_error() {
        assert!(parse_tz("Not/Real").is_err());
    }

    #[test]
    fn monotonic_next_run() {
        let after = Utc.with_ymd_and_hms(2026, 6, 15, 10, 0, 0).unwrap();
        let next = next_run_at_utc("30 * * * *", after).unwrap().unwrap();
        assert!(next > after);
        assert_eq!(next.minute(), 30);
    }

    #[test]
    fn cron_spring_forward_seed_scenario() {
        // spec §8 scenario 4: 30 2 * * * in America/New_York, after
        // 2026-03-08T06:59:00Z -> next fire 2026-03-09T06:30:00Z (local
        // 02:30 on 2026-03-08 doesn't exist).
        let after = Utc.with_ymd_and_hms(2026, 3, 8, 6, 59, 0).unwrap();
        let tz = parse_tz("America/New_York").unwrap();
        let next = next_run_at_tz("30 2 * * *", after, tz).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 9, 6, 30, 0).unwrap());
    }

    #[test]
    fn cron_fall_back_seed_scenario() {
        // spec §8 scenario 5: 30 1 * * * in America/New_York, after
        // 2026-11-01T05:40:00Z -> next fire 2026-11-01T06:30:00Z (the
        // second local 01:30 after clock rollback).
        let after = Utc.with_ymd_and_hms(2026, 11, 1, 5, 40, 0).unwrap();
        let tz = parse_tz("America/New_York").unwrap();
        let next = next_run_at_tz("30 1 * * *", after, tz).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 11, 1, 6, 30, 0).unwrap());
    }

    #[test]
    fn yearly_sparse_cron_within_iteration_cap() {
        // Feb 29 at midnight only fires on leap years; exercises the
        // month/day skip path across multi-year gaps.
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let next = next_run_at_utc("0 0 29 2 *", after).unwrap().unwrap();
        assert_eq!(next.year(), 2028);
        assert_eq!(next.month(), 2);
        assert_eq!(next.day(), 29);
    }

    #[test]
    fn exhausted_lookahead_returns_none() {
        // day-of-month 31 in February never exists, and no day-of-week
        // constraint rescues it; the 5-year cap must bail out cleanly.
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let result = next_run_at_utc("0 0 31 2 *", after).unwrap();
        assert!(result.is_none());
    }
}
