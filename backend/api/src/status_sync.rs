//! Optional background task that re-applies the deadline rule to projects
//! still marked `upcoming`.
//!
//! Disabled unless `STATUS_SYNC_INTERVAL_SECS` is non-zero; without it a
//! project's status only changes through an explicit admin update.

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::db;
use crate::models::to_millis;

/// Run the sync loop forever. Spawn it as a background [`tokio`] task.
pub async fn run(pool: SqlitePool, interval_secs: u64) {
    info!("Status sync starting, interval {interval_secs}s");

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        if let Err(e) = sync_once(&pool).await {
            error!("Status sync error: {e}");
        }
    }
}

/// Perform a single pass. Returns the number of projects activated.
pub async fn sync_once(pool: &SqlitePool) -> crate::errors::Result<u64> {
    let activated = db::activate_due_projects(pool, to_millis(Utc::now())).await?;
    if activated > 0 {
        info!("Status sync activated {activated} project(s) past their deadline");
    }
    Ok(activated)
}
