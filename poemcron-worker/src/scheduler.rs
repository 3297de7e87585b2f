/// Cron scheduler
///
/// Fires a single job at every time matching a cron expression until its
/// cancellation token is cancelled.
///
/// # Expressions
///
/// Fields are seconds first, with day-of-week optional:
///
/// | Field        | Values                    |
/// |--------------|---------------------------|
/// | Seconds      | 0-59                      |
/// | Minutes      | 0-59                      |
/// | Hours        | 0-23                      |
/// | Day of month | 1-31                      |
/// | Month        | 1-12 or Jan-Dec           |
/// | Day of week  | 0-6 (0 = Sunday) or Sun-Sat, defaults to `*` |
///
/// `*`, `?`, lists, ranges and `/step` are accepted in every field. When
/// both day of month and day of week are restricted, a day matching either
/// one fires.
///
/// Descriptors: `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`,
/// `@midnight`, `@hourly` and `@every <duration>` (e.g. `@every 1h30m`).
/// `@every` delays are whole seconds, at least one.
///
/// Expressions are validated in `Scheduler::new`, before any trigger.
/// Trigger times are computed in the local time zone.
///
/// # Overlap
///
/// Runs are serialized. The next trigger is computed after the current run
/// returns, so triggers that elapse while a run is in flight are skipped.
///
/// # Failures
///
/// A run that returns an error or panics is logged and counted; the
/// scheduler continues with the next trigger.
///
/// # Example
///
/// ```no_run
/// use poemcron_worker::jobs::PoemJob;
/// use poemcron_worker::scheduler::Scheduler;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(job: PoemJob) -> Result<(), Box<dyn std::error::Error>> {
/// let scheduler = Scheduler::new("0 0 */2 * * *", Arc::new(job))?;
/// let cancel = CancellationToken::new();
///
/// let stats = scheduler.run(cancel.clone()).await;
/// println!("{} runs, {} failed", stats.triggered, stats.failed);
/// # Ok(())
/// # }
/// ```

use crate::jobs::Job;
use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Scheduler setup errors
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The cron expression could not be parsed
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidExpression {
        /// Expression as configured
        expression: String,

        /// Parser message
        reason: String,
    },
}

/// Counters reported when the scheduler stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Runs started
    pub triggered: u64,

    /// Runs that returned an error or panicked
    pub failed: u64,
}

/// Parsed trigger rule
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Calendar schedules; a time matching any of them fires
    Calendar(Vec<Schedule>),

    /// Fixed delay (`@every`)
    Every(chrono::Duration),
}

impl Trigger {
    /// Returns the first trigger strictly after `after`
    pub fn next_after<Z: TimeZone>(&self, after: &DateTime<Z>) -> Option<DateTime<Z>> {
        match self {
            Trigger::Calendar(schedules) => schedules
                .iter()
                .filter_map(|schedule| schedule.after(after).next())
                .min(),
            Trigger::Every(delay) => {
                let subsec = chrono::Duration::nanoseconds(i64::from(after.timestamp_subsec_nanos()));
                after
                    .clone()
                    .checked_sub_signed(subsec)?
                    .checked_add_signed(*delay)
            }
        }
    }
}

/// Cron scheduler for one job
pub struct Scheduler {
    /// Expression as configured
    expression: String,

    /// Parsed trigger rule
    trigger: Trigger,

    /// Job fired at every trigger
    job: Arc<dyn Job>,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `expression` - Cron expression
    /// * `job` - Job fired at every trigger
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::InvalidExpression` if the expression is malformed.
    pub fn new(expression: &str, job: Arc<dyn Job>) -> Result<Self, ScheduleError> {
        let trigger = parse_expression(expression)?;

        Ok(Scheduler {
            expression: expression.trim().to_string(),
            trigger,
            job,
        })
    }

    /// Returns the configured expression
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Returns the first trigger strictly after `after`
    pub fn next_after<Z: TimeZone>(&self, after: &DateTime<Z>) -> Option<DateTime<Z>> {
        self.trigger.next_after(after)
    }

    /// Runs the scheduler loop
    ///
    /// Sleeps until each trigger, runs the job to completion, and repeats
    /// until `cancel` is cancelled or the schedule has no further triggers.
    /// An in-flight run is allowed to finish before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) -> SchedulerStats {
        let mut stats = SchedulerStats::default();

        tracing::info!(
            expression = %self.expression,
            job = self.job.name(),
            "Scheduler starting"
        );

        let mut last: Option<DateTime<Local>> = None;

        loop {
            let now = Local::now();
            // Never fire the same trigger twice if the timer woke slightly early.
            let from = match last {
                Some(last) if last > now => last,
                _ => now,
            };
            let next = match self.next_after(&from) {
                Some(next) => next,
                None => {
                    tracing::warn!(expression = %self.expression, "Schedule has no further triggers");
                    break;
                }
            };

            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!(next = %next, wait_ms = wait.as_millis() as u64, "Next trigger");

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Shutdown requested, scheduler stopping");
                    break;
                }
                _ = sleep(wait) => {}
            }

            last = Some(next);
            stats.triggered += 1;
            if !self.fire().await {
                stats.failed += 1;
            }
        }

        tracing::info!(
            triggered = stats.triggered,
            failed = stats.failed,
            "Scheduler stopped"
        );

        stats
    }

    /// Runs the job once, isolated in its own task
    ///
    /// Returns whether the run succeeded.
    async fn fire(&self) -> bool {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", run_id = %run_id, job = self.job.name());

        let job = self.job.clone();
        let handle = tokio::spawn(async move { job.run().await }.instrument(span));

        match handle.await {
            Ok(Ok(())) => {
                tracing::info!(run_id = %run_id, "Run succeeded");
                true
            }
            Ok(Err(e)) => {
                tracing::error!(run_id = %run_id, error = %format!("{:#}", e), "Run failed");
                false
            }
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Run panicked");
                false
            }
        }
    }
}

/// Parses a cron expression or descriptor
///
/// # Errors
///
/// Returns `ScheduleError::InvalidExpression` if the expression is malformed.
pub fn parse_expression(expression: &str) -> Result<Trigger, ScheduleError> {
    let trimmed = expression.trim();
    let invalid = |reason: String| ScheduleError::InvalidExpression {
        expression: trimmed.to_string(),
        reason,
    };

    let Some(descriptor) = trimmed.strip_prefix('@') else {
        return calendar(trimmed).map_err(invalid);
    };

    if let Some(delay) = descriptor.strip_prefix("every ") {
        return every(delay.trim()).map_err(invalid);
    }

    let fields = match descriptor {
        "yearly" | "annually" => "0 0 0 1 1 *",
        "monthly" => "0 0 0 1 * *",
        "weekly" => "0 0 0 * * 0",
        "daily" | "midnight" => "0 0 0 * * *",
        "hourly" => "0 0 * * * *",
        other => return Err(invalid(format!("unrecognized descriptor @{}", other))),
    };
    calendar(fields).map_err(invalid)
}

fn calendar(expression: &str) -> Result<Trigger, String> {
    let mut fields: Vec<String> = expression
        .split_whitespace()
        .map(|field| if field == "?" { "*".to_string() } else { field.to_string() })
        .collect();

    match fields.len() {
        5 => fields.push("*".to_string()),
        6 => {}
        n => return Err(format!("expected 5 or 6 fields, found {}", n)),
    }
    let weekdays = weekday_field(&fields[5])?;
    fields[5] = weekdays;

    // Restricting both day fields means either may match.
    let variants = if fields[3] != "*" && fields[5] != "*" {
        let mut by_month_day = fields.clone();
        by_month_day[5] = "*".to_string();
        let mut by_weekday = fields;
        by_weekday[3] = "*".to_string();
        vec![by_month_day, by_weekday]
    } else {
        vec![fields]
    };

    variants
        .iter()
        .map(|fields| Schedule::from_str(&fields.join(" ")).map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()
        .map(Trigger::Calendar)
}

// Shifts numeric weekdays from 0-6 (Sunday first) to the parser's 1-7.
fn weekday_field(field: &str) -> Result<String, String> {
    let parts = field
        .split(',')
        .map(|part| -> Result<String, String> {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (part, None),
            };
            let range = match range.split_once('-') {
                Some((low, high)) => format!("{}-{}", weekday(low)?, weekday(high)?),
                None => weekday(range)?,
            };
            Ok(match step {
                Some(step) => format!("{}/{}", range, step),
                None => range,
            })
        })
        .collect::<Result<Vec<String>, String>>()?;

    Ok(parts.join(","))
}

fn weekday(token: &str) -> Result<String, String> {
    match token.parse::<u32>() {
        Ok(day) if day <= 6 => Ok((day + 1).to_string()),
        Ok(day) => Err(format!("day of week {} is out of range 0-6", day)),
        Err(_) => Ok(token.to_string()),
    }
}

fn every(delay: &str) -> Result<Trigger, String> {
    let parsed = humantime::parse_duration(delay).map_err(|e| e.to_string())?;
    let seconds = parsed.as_secs().max(1);

    i64::try_from(seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .map(Trigger::Every)
        .ok_or_else(|| format!("delay '{}' is out of range", delay))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    struct Noop;

    #[async_trait]
    impl Job for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        async fn run(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_six_field_expression() {
        let scheduler = Scheduler::new("0 0 */2 * * *", Arc::new(Noop)).unwrap();
        assert_eq!(
            scheduler.next_after(&at("2024-03-01T01:30:00Z")),
            Some(at("2024-03-01T02:00:00Z"))
        );
        assert_eq!(
            scheduler.next_after(&at("2024-03-01T02:00:00Z")),
            Some(at("2024-03-01T04:00:00Z"))
        );
    }

    #[test]
    fn test_five_field_expression_is_seconds_first() {
        let scheduler = Scheduler::new("0 */2 * * *", Arc::new(Noop)).unwrap();
        assert_eq!(scheduler.expression(), "0 */2 * * *");
        assert_eq!(
            scheduler.next_after(&at("2024-03-01T01:30:00Z")),
            Some(at("2024-03-01T01:32:00Z"))
        );

        let scheduler = Scheduler::new("30 8 * * *", Arc::new(Noop)).unwrap();
        assert_eq!(
            scheduler.next_after(&at("2024-03-01T09:00:00Z")),
            Some(at("2024-03-01T09:08:30Z"))
        );
    }

    #[test]
    fn test_weekday_zero_is_sunday() {
        // 2024-03-02 is a Saturday
        let saturday = at("2024-03-02T09:00:00Z");

        let sunday = Scheduler::new("0 0 8 * * 0", Arc::new(Noop)).unwrap();
        assert_eq!(sunday.next_after(&saturday), Some(at("2024-03-03T08:00:00Z")));

        let monday = Scheduler::new("0 0 8 * * 1", Arc::new(Noop)).unwrap();
        assert_eq!(monday.next_after(&saturday), Some(at("2024-03-04T08:00:00Z")));

        let friday_or_saturday = Scheduler::new("0 0 8 * * 5-6", Arc::new(Noop)).unwrap();
        assert_eq!(
            friday_or_saturday.next_after(&saturday),
            Some(at("2024-03-08T08:00:00Z"))
        );

        let named = Scheduler::new("0 0 8 ? * Mon", Arc::new(Noop)).unwrap();
        assert_eq!(named.next_after(&saturday), Some(at("2024-03-04T08:00:00Z")));
    }

    #[test]
    fn test_day_of_month_or_weekday() {
        // The 15th, or any Sunday
        let scheduler = Scheduler::new("0 0 8 15 * 0", Arc::new(Noop)).unwrap();
        assert_eq!(
            scheduler.next_after(&at("2024-03-11T09:00:00Z")),
            Some(at("2024-03-15T08:00:00Z"))
        );
        assert_eq!(
            scheduler.next_after(&at("2024-03-15T09:00:00Z")),
            Some(at("2024-03-17T08:00:00Z"))
        );
    }

    #[test]
    fn test_descriptor_expression() {
        let scheduler = Scheduler::new("@hourly", Arc::new(Noop)).unwrap();
        assert_eq!(
            scheduler.next_after(&at("2024-03-01T09:15:00Z")),
            Some(at("2024-03-01T10:00:00Z"))
        );

        let weekly = Scheduler::new("@weekly", Arc::new(Noop)).unwrap();
        assert_eq!(
            weekly.next_after(&at("2024-03-06T12:00:00Z")),
            Some(at("2024-03-10T00:00:00Z"))
        );

        let midnight = Scheduler::new("@midnight", Arc::new(Noop)).unwrap();
        assert_eq!(
            midnight.next_after(&at("2024-03-06T12:00:00Z")),
            Some(at("2024-03-07T00:00:00Z"))
        );
    }

    #[test]
    fn test_every_descriptor() {
        let scheduler = Scheduler::new("@every 2h", Arc::new(Noop)).unwrap();
        assert_eq!(
            scheduler.next_after(&at("2024-03-01T01:30:00.500Z")),
            Some(at("2024-03-01T03:30:00Z"))
        );

        let scheduler = Scheduler::new("@every 1m30s", Arc::new(Noop)).unwrap();
        assert_eq!(
            scheduler.next_after(&at("2024-03-01T01:30:00Z")),
            Some(at("2024-03-01T01:31:30Z"))
        );

        let scheduler = Scheduler::new("@every 200ms", Arc::new(Noop)).unwrap();
        assert_eq!(
            scheduler.next_after(&at("2024-03-01T01:30:00Z")),
            Some(at("2024-03-01T01:30:01Z"))
        );
    }

    #[test]
    fn test_invalid_expressions() {
        for expression in [
            "",
            "not a cron",
            "61 * * * * *",
            "* * *",
            "0 0 0 1 1 * 2024",
            "0 0 8 * * 7",
            "@fortnightly",
            "@every soon",
        ] {
            let result = Scheduler::new(expression, Arc::new(Noop));
            assert!(
                matches!(result, Err(ScheduleError::InvalidExpression { .. })),
                "'{}' should be rejected",
                expression
            );
        }
    }

    #[test]
    fn test_invalid_expression_message() {
        let err = parse_expression("bogus").unwrap_err();
        assert!(err.to_string().contains("'bogus'"));
        assert!(err.to_string().contains("expected 5 or 6 fields"));
    }

    #[test]
    fn test_weekday_field_shift() {
        assert_eq!(weekday_field("0").unwrap(), "1");
        assert_eq!(weekday_field("1-5").unwrap(), "2-6");
        assert_eq!(weekday_field("0,6").unwrap(), "1,7");
        assert_eq!(weekday_field("*/2").unwrap(), "*/2");
        assert_eq!(weekday_field("1-5/2").unwrap(), "2-6/2");
        assert_eq!(weekday_field("MON-FRI").unwrap(), "MON-FRI");
        assert!(weekday_field("7").is_err());
    }

    #[tokio::test]
    async fn test_run_returns_when_cancelled() {
        let scheduler = Scheduler::new("0 0 0 1 1 *", Arc::new(Noop)).unwrap();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            sleep(std::time::Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let stats = tokio::time::timeout(std::time::Duration::from_secs(5), scheduler.run(cancel))
            .await
            .expect("scheduler should stop after cancellation");
        assert_eq!(stats, SchedulerStats::default());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_next_trigger_logged_at_info() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let scheduler = Scheduler::new("0 0 0 1 1 *", Arc::new(Noop)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        scheduler.run(cancel).await;

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Next trigger"), "{}", output);
    }

    // Trigger-driven runs are covered in tests/scheduler_tests.rs
}
