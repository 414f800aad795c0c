//! Cron parsing/next-fire computation and the scheduler intent projection
//! (spec §4.M, §4.N, components M/N).

pub mod cron;
pub mod intent;
pub mod missed;

pub use cron::{next_run_at_tz, next_run_at_utc, parse_tz, CronField, CronSchedule};
pub use intent::IntentStore;
pub use missed::{cooldown_minutes, missed_window_count, runs_to_fire};
