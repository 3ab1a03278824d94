//! Wall-clock jobs: the hourly save and the ten-minute maintenance tick.
//!
//! Both run in local time, independent of each other and of any command
//! in flight.

use std::sync::Arc;

use chrono::{Duration as TimeDelta, Local, NaiveDateTime, Timelike};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::server::Server;

/// Minute past the hour of the first maintenance tick; the others follow
/// every ten minutes.
const MAINTENANCE_OFFSET: u32 = 5;
const MAINTENANCE_EVERY: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    /// Minute 0 of every hour.
    HourlySave,
    /// Minutes 5, 15, ..., 55.
    Maintenance,
}

impl Job {
    pub const ALL: [Job; 2] = [Job::HourlySave, Job::Maintenance];

    /// First fire time strictly after `now`.
    pub fn next_fire(&self, now: NaiveDateTime) -> NaiveDateTime {
        let hour_start = now
            - TimeDelta::seconds(i64::from(now.minute() * 60 + now.second()))
            - TimeDelta::nanoseconds(i64::from(now.nanosecond()));
        match self {
            Job::HourlySave => hour_start + TimeDelta::hours(1),
            Job::Maintenance => (MAINTENANCE_OFFSET..60)
                .step_by(MAINTENANCE_EVERY as usize)
                .map(|minute| hour_start + TimeDelta::minutes(i64::from(minute)))
                .find(|at| *at > now)
                .unwrap_or_else(|| {
                    hour_start + TimeDelta::hours(1) + TimeDelta::minutes(i64::from(MAINTENANCE_OFFSET))
                }),
        }
    }

    /// Next fire time for a loop that last fired at `last`. A wall clock
    /// that stepped back behind `last` must not repeat that run.
    pub fn next_fire_after(
        &self,
        now: NaiveDateTime,
        last: Option<NaiveDateTime>,
    ) -> NaiveDateTime {
        match last {
            Some(last) if last > now => self.next_fire(last),
            _ => self.next_fire(now),
        }
    }

    fn fire(&self, server: &Arc<Server>, at: NaiveDateTime) {
        match self {
            Job::HourlySave => server.hourly_save(at.hour()),
            Job::Maintenance => server.maintenance(),
        }
    }
}

/// Start one task per job. The tasks run until aborted.
pub fn spawn(server: Arc<Server>) -> Vec<JoinHandle<()>> {
    Job::ALL
        .into_iter()
        .map(|job| {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                info!(job = ?job, "Scheduler started");
                let mut last = None;
                loop {
                    let now = Local::now().naive_local();
                    let next = job.next_fire_after(now, last);
                    let wait = (next - now).to_std().unwrap_or_default();
                    debug!(job = ?job, next = %next, "Next run");
                    tokio::time::sleep(wait).await;
                    job.fire(&server, next);
                    last = Some(next);
                }
            })
        })
        .collect()
}
