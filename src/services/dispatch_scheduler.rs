//! In-process dispatch loop
//!
//! When `dispatcher.interval_secs` is set the server runs a dispatch pass on a
//! fixed interval, in addition to the cron binary and the HTTP trigger.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::services::dispatcher::PublicationDispatcher;

/// Spawn the dispatch loop; it runs for the life of the process
pub fn start_dispatch_scheduler(
    dispatcher: Arc<PublicationDispatcher>,
    interval_secs: u64,
) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_secs.max(1));
    info!(interval_secs = period.as_secs(), "Dispatch scheduler started");

    tokio::spawn(async move {
        let mut timer = interval(period);
        // A slow pass pushes the next one back instead of bursting
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;

            debug!("Running scheduled dispatch pass");
            if let Err(e) = dispatcher.dispatch_due(Utc::now()).await {
                error!("Scheduled dispatch pass failed: {:#}", e);
            }
        }
    })
}
