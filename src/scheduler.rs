//! The daily background job that posts fixed expenses for every active user.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use time::{Date, Duration, OffsetDateTime, Time};

use crate::{
    Error,
    fixed_expense::run_fixed_expenses_for_date,
    timezone::{get_local_date, get_local_offset},
    user::get_active_user_ids,
};

/// When the daily job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// The hour of the day, from 0 to 23, in `local_timezone`.
    pub hour: u8,
    /// The canonical name of the timezone that decides the hour and "today".
    pub local_timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            hour: 3,
            local_timezone: "Etc/UTC".to_owned(),
        }
    }
}

/// Get the time from `now` until the next `hour`:00 in the offset of `now`.
///
/// If `now` is exactly on the hour, the next run is a day later.
pub fn duration_until_next_run(now: OffsetDateTime, hour: u8) -> Duration {
    let run_time = Time::from_hms(hour.min(23), 0, 0).unwrap_or(Time::MIDNIGHT);
    let today_run = now.replace_time(run_time);

    if today_run > now {
        today_run - now
    } else {
        today_run + Duration::days(1) - now
    }
}

/// Post the fixed expenses due on `today` for every active user and return the total posted.
///
/// A failure for one user is logged and does not stop the others.
///
/// # Errors
///
/// Returns an error if the lock cannot be acquired or the users cannot be listed.
pub fn run_daily_postings(db_connection: &Mutex<Connection>, today: Date) -> Result<usize, Error> {
    let mut connection = db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let mut total = 0;

    for user_id in get_active_user_ids(&connection)? {
        match run_fixed_expenses_for_date(user_id, today, &mut connection) {
            Ok(posted) => total += posted,
            Err(error) => {
                tracing::error!("Could not post fixed expenses for user {user_id}: {error}")
            }
        }
    }

    Ok(total)
}

/// Run [run_daily_postings] once a day at the configured hour, forever.
///
/// Spawn this as a task and abort the task to stop it.
pub async fn run_scheduler(db_connection: Arc<Mutex<Connection>>, config: SchedulerConfig) {
    tracing::info!(
        "Posting fixed expenses daily at {:02}:00 {}",
        config.hour,
        config.local_timezone
    );

    loop {
        let Some(offset) = get_local_offset(&config.local_timezone) else {
            tracing::error!(
                "Stopping the scheduler, invalid timezone {}",
                config.local_timezone
            );
            return;
        };

        let now = OffsetDateTime::now_utc().to_offset(offset);
        let wait = duration_until_next_run(now, config.hour);
        tracing::debug!("Next fixed expense run in {wait}");
        tokio::time::sleep(wait.unsigned_abs()).await;

        let result = get_local_date(&config.local_timezone)
            .and_then(|today| run_daily_postings(&db_connection, today));

        match result {
            Ok(total) => tracing::info!("Posted {total} fixed expenses"),
            Err(error) => tracing::error!("The daily fixed expense run failed: {error}"),
        }
    }
}
