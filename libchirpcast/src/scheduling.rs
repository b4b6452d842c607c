//! Posting triggers and the scheduler loop
//!
//! Two kinds of trigger drive the bot: a fixed interval tick, aligned to
//! wall-clock multiples of the interval, and daily times evaluated as cron
//! expressions in the configured timezone. [`Schedule::run`] sleeps until the
//! earliest next firing, hands it to the callback, and repeats until the
//! shutdown future completes. Triggers that coincide fire once.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::config::ScheduleConfig;
use crate::error::{ConfigError, Result};

/// What makes a trigger fire
#[derive(Debug, Clone)]
pub enum TriggerKind {
    /// Every `Duration`, aligned to multiples of it since the Unix epoch
    Interval(Duration),
    /// Once a day at a local time
    Daily(cron::Schedule),
}

/// A named posting trigger
#[derive(Debug, Clone)]
pub struct Trigger {
    name: String,
    kind: TriggerKind,
}

impl Trigger {
    /// Tick every `every`, which must be at least one second
    pub fn interval(every: Duration) -> Result<Self> {
        if every.as_secs() == 0 {
            return Err(invalid("schedule.interval", "must be at least 1s"));
        }
        Ok(Self {
            name: format!("interval:{}", humantime::format_duration(every)),
            kind: TriggerKind::Interval(every),
        })
    }

    /// Fire daily at `time` ("HH:MM", 24-hour clock)
    pub fn daily(time: &str) -> Result<Self> {
        let parsed = NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|e| {
            invalid("schedule.daily", &format!("'{}' is not HH:MM ({})", time, e))
        })?;
        let expression = format!("0 {} {} * * *", parsed.minute(), parsed.hour());
        let schedule = cron::Schedule::from_str(&expression).map_err(|e| {
            invalid("schedule.daily", &format!("'{}' is not a valid time ({})", time, e))
        })?;

        Ok(Self {
            name: format!("daily:{:02}:{:02}", parsed.hour(), parsed.minute()),
            kind: TriggerKind::Daily(schedule),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TriggerKind {
        &self.kind
    }

    /// First firing strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>, timezone: Tz) -> Option<DateTime<Utc>> {
        match &self.kind {
            TriggerKind::Interval(every) => {
                let secs = i64::try_from(every.as_secs()).ok()?;
                let next = (after.timestamp().div_euclid(secs) + 1).checked_mul(secs)?;
                DateTime::from_timestamp(next, 0)
            }
            TriggerKind::Daily(schedule) => schedule
                .after(&after.with_timezone(&timezone))
                .next()
                .map(|local| local.with_timezone(&Utc)),
        }
    }
}

fn invalid(field: &str, reason: &str) -> crate::error::ChirpcastError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// A due trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub at: DateTime<Utc>,
    pub trigger: String,
}

/// The bot's triggers in one timezone
#[derive(Debug, Clone)]
pub struct Schedule {
    timezone: Tz,
    triggers: Vec<Trigger>,
}

impl Schedule {
    pub fn new(timezone: Tz, triggers: Vec<Trigger>) -> Self {
        Self { timezone, triggers }
    }

    /// Build from the `[schedule]` config section
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unknown timezone, an
    /// unparsable interval or a malformed daily time.
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        let timezone: Tz = config.timezone.parse().map_err(|_| {
            invalid(
                "schedule.timezone",
                &format!("unknown timezone '{}'", config.timezone),
            )
        })?;

        let mut triggers = Vec::new();
        if let Some(interval) = config.interval.as_deref().filter(|s| !s.trim().is_empty()) {
            let every = humantime::parse_duration(interval.trim()).map_err(|e| {
                invalid("schedule.interval", &format!("'{}': {}", interval, e))
            })?;
            triggers.push(Trigger::interval(every)?);
        }
        for time in &config.daily {
            triggers.push(Trigger::daily(time)?);
        }

        Ok(Self::new(timezone, triggers))
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// The earliest firing strictly after `after`
    ///
    /// When several triggers share that instant the first one listed names
    /// the firing.
    pub fn next_firing(&self, after: DateTime<Utc>) -> Option<Firing> {
        let mut best: Option<Firing> = None;
        for trigger in &self.triggers {
            let Some(at) = trigger.next_after(after, self.timezone) else {
                continue;
            };
            if best.as_ref().map_or(true, |b| at < b.at) {
                best = Some(Firing {
                    at,
                    trigger: trigger.name().to_string(),
                });
            }
        }
        best
    }

    /// Fire triggers until `shutdown` completes
    ///
    /// Shutdown is observed between firings; a running callback is always
    /// awaited to completion. Firings missed while a callback ran are
    /// skipped.
    pub async fn run<S, F, Fut>(&self, shutdown: S, mut on_fire: F)
    where
        S: Future<Output = ()>,
        F: FnMut(Firing) -> Fut,
        Fut: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let names: Vec<&str> = self.triggers.iter().map(|t| t.name()).collect();
        info!("Scheduler started ({}) in {}", names.join(", "), self.timezone);

        let mut cursor = Utc::now();
        loop {
            let Some(firing) = self.next_firing(cursor) else {
                warn!("No triggers configured, scheduler stopping");
                return;
            };

            let wait = (firing.at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            debug!("Next firing {} at {} (in {:?})", firing.trigger, firing.at, wait);

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            cursor = firing.at.max(Utc::now());
            on_fire(firing).await;
            cursor = cursor.max(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn new_york() -> Tz {
        "America/New_York".parse().unwrap()
    }

    #[test]
    fn test_daily_trigger_parsing() {
        assert_eq!(Trigger::daily("09:00").unwrap().name(), "daily:09:00");
        assert_eq!(Trigger::daily("7:05").unwrap().name(), "daily:07:05");
        assert!(Trigger::daily("25:00").is_err());
        assert!(Trigger::daily("9am").is_err());
        assert!(Trigger::daily("").is_err());
    }

    #[test]
    fn test_daily_trigger_honours_timezone() {
        let trigger = Trigger::daily("09:00").unwrap();

        // Winter: 09:00 EST is 14:00 UTC
        let next = trigger.next_after(utc(2025, 1, 15, 12, 0, 0), new_york());
        assert_eq!(next, Some(utc(2025, 1, 15, 14, 0, 0)));

        // Summer: 09:00 EDT is 13:00 UTC
        let next = trigger.next_after(utc(2025, 7, 15, 12, 0, 0), new_york());
        assert_eq!(next, Some(utc(2025, 7, 15, 13, 0, 0)));

        // Already past today: tomorrow
        let next = trigger.next_after(utc(2025, 7, 15, 13, 0, 0), new_york());
        assert_eq!(next, Some(utc(2025, 7, 16, 13, 0, 0)));
    }

    #[test]
    fn test_interval_trigger_aligns_to_clock() {
        let trigger = Trigger::interval(Duration::from_secs(300)).unwrap();
        assert_eq!(trigger.name(), "interval:5m");

        let next = trigger.next_after(utc(2025, 3, 1, 12, 3, 20), new_york());
        assert_eq!(next, Some(utc(2025, 3, 1, 12, 5, 0)));

        // Strictly after a boundary
        let next = trigger.next_after(utc(2025, 3, 1, 12, 5, 0), new_york());
        assert_eq!(next, Some(utc(2025, 3, 1, 12, 10, 0)));
    }

    #[test]
    fn test_interval_rejects_sub_second() {
        assert!(Trigger::interval(Duration::from_millis(500)).is_err());
    }

    #[test]
    fn test_from_config_defaults() {
        let schedule = Schedule::from_config(&ScheduleConfig::default()).unwrap();
        let names: Vec<&str> = schedule.triggers().iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "interval:5m",
                "daily:09:00",
                "daily:12:00",
                "daily:17:00",
                "daily:20:00"
            ]
        );
        assert_eq!(schedule.timezone(), new_york());
    }

    #[test]
    fn test_from_config_errors() {
        let bad_tz = ScheduleConfig {
            timezone: "Mars/Olympus".to_string(),
            ..ScheduleConfig::default()
        };
        let err = Schedule::from_config(&bad_tz).unwrap_err();
        assert!(err.to_string().contains("schedule.timezone"));

        let bad_interval = ScheduleConfig {
            interval: Some("soon".to_string()),
            ..ScheduleConfig::default()
        };
        assert!(Schedule::from_config(&bad_interval).is_err());

        let bad_daily = ScheduleConfig {
            daily: vec!["noon".to_string()],
            ..ScheduleConfig::default()
        };
        assert!(Schedule::from_config(&bad_daily).is_err());
    }

    #[test]
    fn test_from_config_without_interval() {
        let config = ScheduleConfig {
            interval: None,
            daily: vec!["10:30".to_string()],
            ..ScheduleConfig::default()
        };
        let schedule = Schedule::from_config(&config).unwrap();
        assert_eq!(schedule.triggers().len(), 1);
    }

    #[test]
    fn test_next_firing_picks_earliest_and_collapses_ties() {
        let schedule = Schedule::new(
            new_york(),
            vec![
                Trigger::daily("09:00").unwrap(),
                Trigger::interval(Duration::from_secs(3600)).unwrap(),
            ],
        );

        // 08:30 EST: the hourly tick at 09:00 EST coincides with the daily trigger
        let firing = schedule.next_firing(utc(2025, 1, 15, 13, 30, 0)).unwrap();
        assert_eq!(firing.at, utc(2025, 1, 15, 14, 0, 0));
        assert_eq!(firing.trigger, "daily:09:00");

        // Just after: the next hourly tick
        let firing = schedule.next_firing(firing.at).unwrap();
        assert_eq!(firing.at, utc(2025, 1, 15, 15, 0, 0));
        assert_eq!(firing.trigger, "interval:1h");
    }

    #[test]
    fn test_empty_schedule_has_no_firing() {
        let schedule = Schedule::new(new_york(), Vec::new());
        assert!(schedule.is_empty());
        assert_eq!(schedule.next_firing(Utc::now()), None);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_without_firing() {
        let schedule = Schedule::from_config(&ScheduleConfig::default()).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        schedule
            .run(async {}, move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_fires_until_shutdown() {
        let schedule = Schedule::new(
            new_york(),
            vec![Trigger::interval(Duration::from_secs(1)).unwrap()],
        );
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        schedule
            .run(tokio::time::sleep(Duration::from_millis(2500)), move |firing| {
                assert_eq!(firing.trigger, "interval:1s");
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        let count = fired.load(Ordering::SeqCst);
        assert!((2..=3).contains(&count), "fired {} times", count);
    }
}
