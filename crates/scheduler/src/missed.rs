//! Missed-fire catch-up policy and failure-driven cooldown (supplemented
//! feature: present in the teacher, silent in spec §4.M/§4.N). Grounded on
//! the teacher's `missed_window_count`/`runs_to_fire`
//! (`crates/gateway/src/runtime/schedule_runner.rs`) and `cooldown_minutes`
//! (`crates/gateway/src/runtime/schedules/model.rs`), ported from
//! `DateTime<Utc>` arguments to the millisecond-epoch timestamps
//! `SchedulerIntent` carries everywhere else.

use chrono::{DateTime, Utc};

use sa_domain::error::Result;
use sa_domain::scheduler::MissedPolicy;

use crate::cron::next_run_at_tz;

/// A failed run is never deferred past 24 hours, however many times it's
/// failed in a row.
pub const MAX_COOLDOWN_MINUTES: u64 = 24 * 60;

/// Exponential backoff in minutes: `2^(failures - 1)`, capped at
/// `MAX_COOLDOWN_MINUTES`. Zero failures means no cooldown.
pub fn cooldown_minutes(consecutive_failures: u32) -> u64 {
    if consecutive_failures == 0 {
        return 0;
    }
    let exp = (consecutive_failures - 1).min(20);
    let minutes = 1u64.checked_shl(exp).unwrap_or(MAX_COOLDOWN_MINUTES);
    minutes.min(MAX_COOLDOWN_MINUTES)
}

fn ms_to_utc(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Count cron windows between `last_fire_ms` (exclusive) and `now_ms`
/// (inclusive), capped one past `max_catchup` since callers only need to
/// distinguish "one missed window" from "more than `max_catchup`".
/// `None` for `last_fire_ms` (never fired) counts as exactly one missed
/// window, matching the teacher's "never run" short-circuit.
pub fn missed_window_count(cron: &str, tz: chrono_tz::Tz, last_fire_ms: Option<i64>, now_ms: i64, max_catchup: usize) -> Result<usize> {
    let anchor = match last_fire_ms {
        Some(ms) => ms_to_utc(ms),
        None => return Ok(1),
    };
    let now = ms_to_utc(now_ms);
    let mut count = 0usize;
    let mut cursor = anchor;
    loop {
        match next_run_at_tz(cron, cursor, tz)? {
            Some(next) if next <= now => {
                count += 1;
                cursor = next;
                if count > max_catchup {
                    break;
                }
            }
            _ => break,
        }
    }
    Ok(count)
}

/// How many runs to credit for a reconciliation, per `MissedPolicy` (spec
/// supplement): `Skip` drops anything beyond a single missed window
/// entirely (zero runs if more than one window was missed), `RunOnce`
/// collapses any number of missed windows into a single run, and
/// `CatchUp` fires every missed window up to `max_catchup`.
pub fn runs_to_fire(policy: MissedPolicy, cron: &str, tz: chrono_tz::Tz, last_fire_ms: Option<i64>, now_ms: i64, max_catchup: usize) -> Result<usize> {
    let missed = missed_window_count(cron, tz, last_fire_ms, now_ms, max_catchup)?;
    Ok(match policy {
        MissedPolicy::Skip => {
            if missed > 1 {
                0
            } else {
                missed
            }
        }
        MissedPolicy::RunOnce => missed.min(1),
        MissedPolicy::CatchUp => missed.min(max_catchup),
    })
}
