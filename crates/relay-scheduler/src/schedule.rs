//! `calcNextRun` (§4.J): schedule-type-specific next-run computation.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;

use crate::error::{Result, SchedulerError};
use crate::types::{Job, ScheduleType};

/// Parses a single numeric/unit duration like `"30s"`, `"5m"`, `"1h"`,
/// `"2d"` — the `every` schedule type's wire format.
pub fn parse_every_duration(spec: &str) -> Result<chrono::Duration> {
    let spec = spec.trim();
    let split_at = spec
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| SchedulerError::InvalidSchedule(spec.to_string()))?;
    let (digits, unit) = spec.split_at(split_at);

    let n: i64 = digits
        .parse()
        .map_err(|_| SchedulerError::InvalidSchedule(spec.to_string()))?;

    let duration = match unit {
        "s" => chrono::Duration::seconds(n),
        "m" => chrono::Duration::minutes(n),
        "h" => chrono::Duration::hours(n),
        "d" => chrono::Duration::days(n),
        other => {
            return Err(SchedulerError::InvalidSchedule(format!(
                "unknown duration unit '{other}' in '{spec}'"
            )))
        }
    };

    if duration <= chrono::Duration::zero() {
        return Err(SchedulerError::InvalidSchedule(format!(
            "duration must be > 0: {spec}"
        )));
    }

    Ok(duration)
}

/// Computes the next execution time for `job` starting strictly after
/// `from`. `Ok(None)` means the schedule is exhausted — the caller
/// disables the job rather than deleting it (§3 Job invariant).
pub fn calc_next_run(job: &Job, from: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    match job.schedule_type {
        ScheduleType::Every => {
            let duration = parse_every_duration(&job.schedule)?;
            Ok(Some(from + duration))
        }

        ScheduleType::Cron => {
            // The `cron` crate parses 6/7-field expressions with a leading
            // seconds field; spec.md's cron expressions are the standard
            // 5-field, minute-resolution kind, so a "0 " prefix adapts one
            // to the other without losing precision spec.md never promised.
            let expr = format!("0 {}", job.schedule);
            let schedule = CronSchedule::from_str(&expr).map_err(|e| {
                SchedulerError::InvalidSchedule(format!("{}: {e}", job.schedule))
            })?;
            Ok(schedule.after(&from).next())
        }

        ScheduleType::At => {
            let at = DateTime::parse_from_rfc3339(&job.schedule)
                .map_err(|e| SchedulerError::InvalidSchedule(format!("{}: {e}", job.schedule)))?
                .with_timezone(&Utc);
            if at > from {
                Ok(Some(at))
            } else {
                Ok(None)
            }
        }
    }
}
