//! Periodic removal of expired sessions and abandoned upload bindings.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::storage::db::SweepStats;
use crate::storage::models::PENDING_UPLOAD_TTL_SECONDS;
use crate::storage::{Database, DatabaseError};

pub fn sweep_once(db: &Database, now: DateTime<Utc>) -> Result<SweepStats, DatabaseError> {
    let pending_cutoff = now - chrono::Duration::seconds(PENDING_UPLOAD_TTL_SECONDS);
    db.sweep_expired(now, pending_cutoff)
}

pub fn spawn_sweeper(db: Database, interval_seconds: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match sweep_once(&db, Utc::now()) {
                Ok(stats) if stats.sessions > 0 || stats.pending_uploads > 0 => {
                    tracing::info!(
                        sessions = stats.sessions,
                        pending_uploads = stats.pending_uploads,
                        "Swept expired rows"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Sweep failed"),
            }
        }
    })
}
