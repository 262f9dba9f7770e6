// ⏰ Daily Scheduler - fixed wall-clock times in the configured zone
// Each registered time of day gets its own task that sleeps until the next
// occurrence, runs the job, and goes back to sleep. A failing or slow run
// at one time never affects the others.

use crate::dates::DateNormalizer;
use chrono::{DateTime, Days, NaiveTime, Utc};
use chrono_tz::Tz;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct DailySchedule {
    times: Vec<NaiveTime>,
    normalizer: DateNormalizer,
}

impl DailySchedule {
    pub fn new(times: Vec<NaiveTime>, tz: Tz) -> Self {
        DailySchedule {
            times,
            normalizer: DateNormalizer::new(tz),
        }
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    /// Next occurrence of `time` strictly after `after`
    ///
    /// A time that falls into a DST gap fires at the first valid local
    /// instant after it.
    pub fn next_fire(&self, time: NaiveTime, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = self.normalizer.timezone();
        let today = after.with_timezone(&tz).date_naive();

        (0..=2u64)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .filter_map(|date| self.normalizer.localize(date.and_time(time)))
            .find(|candidate| *candidate > after)
    }

    /// Spawn one task per time of day, each running `job` forever
    pub fn spawn<F, Fut>(&self, job: F) -> Vec<JoinHandle<()>>
    where
        F: Fn(DateTime<Tz>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job = Arc::new(job);

        self.times
            .iter()
            .map(|&time| {
                let schedule = self.clone();
                let job = Arc::clone(&job);
                tokio::spawn(async move { schedule.run_daily(time, job).await })
            })
            .collect()
    }

    async fn run_daily<F, Fut>(&self, time: NaiveTime, job: Arc<F>)
    where
        F: Fn(DateTime<Tz>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let tz = self.normalizer.timezone();
        let mut after = Utc::now().with_timezone(&tz);

        loop {
            let Some(next) = self.next_fire(time, after) else {
                warn!(%time, "Could not compute next fire time; retrying in an hour");
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                after = Utc::now().with_timezone(&tz);
                continue;
            };

            info!(%time, next = %next, "Next expiry check scheduled");
            let wait = (next - Utc::now().with_timezone(&tz)).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            let fired = fire_instant(Utc::now().with_timezone(&tz), next);
            job(fired).await;
            after = fired;
        }
    }
}

/// Evaluation instant for a run scheduled at `scheduled`
///
/// The sleep runs on the monotonic clock; if the wall clock lags behind it
/// the run still evaluates at the scheduled instant, never the day before.
pub fn fire_instant(now: DateTime<Tz>, scheduled: DateTime<Tz>) -> DateTime<Tz> {
    now.max(scheduled)
}

/// Parse `HH:MM` (or `HH:MM:SS`)
pub fn parse_time_of_day(text: &str) -> Result<NaiveTime, String> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .map_err(|_| format!("invalid time of day '{}', expected HH:MM", text))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use tokio::sync::mpsc;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_next_fire_later_today() {
        let tz = chrono_tz::Asia::Yangon;
        let schedule = DailySchedule::new(vec![hm(9, 0), hm(12, 0)], tz);
        let now = tz.with_ymd_and_hms(2025, 3, 31, 10, 0, 0).unwrap();

        let next = schedule.next_fire(hm(12, 0), now).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_next_fire_rolls_to_tomorrow() {
        let tz = chrono_tz::Asia::Yangon;
        let schedule = DailySchedule::new(vec![hm(9, 0)], tz);
        let now = tz.with_ymd_and_hms(2025, 3, 31, 9, 0, 0).unwrap();

        // exactly at fire time → next day
        let next = schedule.next_fire(hm(9, 0), now).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_next_fire_uses_schedule_zone() {
        let tz = chrono_tz::Asia::Yangon;
        let schedule = DailySchedule::new(vec![hm(0, 0)], tz);

        // 2025-03-31 20:00 UTC = 2025-04-01 02:30 Yangon
        let now_utc = Tz::UTC.with_ymd_and_hms(2025, 3, 31, 20, 0, 0).unwrap();
        let next = schedule.next_fire(hm(0, 0), now_utc).unwrap();

        assert_eq!(next, tz.with_ymd_and_hms(2025, 4, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_next_fire_in_dst_gap() {
        let tz = chrono_tz::America::New_York;
        let schedule = DailySchedule::new(vec![hm(2, 30)], tz);
        let now = tz.with_ymd_and_hms(2025, 3, 8, 12, 0, 0).unwrap();

        let next = schedule.next_fire(hm(2, 30), now).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2025, 3, 9, 3, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("00:00"), Ok(hm(0, 0)));
        assert_eq!(parse_time_of_day(" 12:30 "), Ok(hm(12, 30)));
        assert_eq!(parse_time_of_day("07:15:00"), Ok(hm(7, 15)));
        assert!(parse_time_of_day("25:00").is_err());
        assert!(parse_time_of_day("noon").is_err());
    }

    #[test]
    fn test_fire_instant_never_before_schedule() {
        let tz = chrono_tz::Asia::Yangon;
        let scheduled = tz.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let early = tz.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap();
        let late = tz.with_ymd_and_hms(2025, 4, 1, 0, 0, 2).unwrap();

        assert_eq!(fire_instant(early, scheduled), scheduled);
        assert_eq!(fire_instant(late, scheduled), late);

        // the following run is the next day, not a second run at midnight
        let schedule = DailySchedule::new(vec![hm(0, 0)], tz);
        let fired = fire_instant(early, scheduled);
        assert_eq!(
            schedule.next_fire(hm(0, 0), fired),
            Some(tz.with_ymd_and_hms(2025, 4, 2, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_runs_job_per_time() {
        let schedule = DailySchedule::new(vec![hm(0, 0), hm(12, 0)], Tz::UTC);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = Utc::now();

        let handles = schedule.spawn(move |fired| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(fired);
            }
        });
        assert_eq!(handles.len(), 2);

        // paused clock: the runtime skips ahead to each sleeping task
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first > started);
        assert!(second > started);
        for fired in [first, second] {
            assert_eq!(fired.timezone(), Tz::UTC);
            assert_eq!(fired.time().second(), 0);
            assert!(fired.time() == hm(0, 0) || fired.time() == hm(12, 0));
        }

        for handle in handles {
            handle.abort();
        }
    }
}
