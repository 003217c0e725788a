//! Nightly statistics rollup.
//!
//! At 00:05 local time the scheduler aggregates yesterday's session and
//! transcode activity into one row per calendar day.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::LoopHandle;
use crate::repository::StatsRepository;

fn run_at() -> NaiveTime {
    NaiveTime::from_hms_opt(0, 5, 0).expect("00:05 is a valid time of day")
}

pub struct RollupScheduler {
    stats_repo: Arc<dyn StatsRepository>,
}

impl RollupScheduler {
    pub fn new(stats_repo: Arc<dyn StatsRepository>) -> Self {
        Self { stats_repo }
    }

    /// Spawn the scheduler loop.
    pub fn start(self: Arc<Self>) -> LoopHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                let now = Local::now();
                let next = next_run_after(now);
                let wait = (next - now)
                    .to_std()
                    .unwrap_or(std::time::Duration::from_secs(1));
                debug!(at = %next, "next daily rollup scheduled");

                tokio::select! {
                    () = tokio::time::sleep(wait) => {
                        if let Err(e) = self.run_once().await {
                            warn!("daily rollup failed: {}", e);
                        }
                    }
                    _ = stop_rx.changed() => {
                        debug!("rollup scheduler stopping");
                        return;
                    }
                }
            }
        });
        LoopHandle::new(stop_tx, handle)
    }

    /// Aggregate yesterday and upsert its row. Public for tests.
    pub async fn run_once(&self) -> crate::Result<()> {
        let yesterday = Local::now().date_naive() - ChronoDuration::days(1);
        let row = self.stats_repo.compute_daily_rollup(yesterday).await?;
        self.stats_repo.upsert_daily_stat(&row).await?;
        info!(day = %yesterday, sessions = row.session_count, "daily rollup stored");
        Ok(())
    }
}

/// First 00:05 strictly after `now`.
fn next_run_after(now: DateTime<Local>) -> DateTime<Local> {
    let today_run = now
        .date_naive()
        .and_time(run_at())
        .and_local_timezone(Local)
        .earliest()
        .unwrap_or(now);

    if today_run > now {
        today_run
    } else {
        (now.date_naive() + ChronoDuration::days(1))
            .and_time(run_at())
            .and_local_timezone(Local)
            .earliest()
            .unwrap_or(now + ChronoDuration::days(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DailyStat;
    use crate::repository::MockStatsRepository;
    use chrono::{NaiveDate, TimeZone, Timelike};

    #[test]
    fn next_run_is_tonight_before_cutoff() {
        let now = Local.with_ymd_and_hms(2026, 3, 1, 0, 1, 0).unwrap();
        let next = next_run_after(now);
        assert_eq!(next.date_naive(), now.date_naive());
        assert_eq!((next.hour(), next.minute()), (0, 5));
    }

    #[test]
    fn next_run_rolls_to_tomorrow_after_cutoff() {
        let now = Local.with_ymd_and_hms(2026, 3, 1, 0, 5, 0).unwrap();
        let next = next_run_after(now);
        assert_eq!(
            next.date_naive(),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );
    }

    #[tokio::test]
    async fn run_once_computes_then_upserts() {
        let mut stats = MockStatsRepository::new();
        stats.expect_compute_daily_rollup().times(1).returning(|day| {
            Ok(DailyStat {
                day,
                total_play_secs: 3600,
                session_count: 4,
                transcode_count: 2,
                transcode_failures: 0,
                unique_users: 3,
            })
        });
        stats
            .expect_upsert_daily_stat()
            .withf(|row| row.session_count == 4)
            .times(1)
            .returning(|_| Ok(()));

        let scheduler = RollupScheduler::new(Arc::new(stats));
        scheduler.run_once().await.unwrap_or_else(|e| panic!("{e}"));
    }
}
