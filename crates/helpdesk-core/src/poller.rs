//! Periodic mailbox polling, the fallback when change notifications are
//! unavailable.

use crate::desk::{PollReport, SupportDesk};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// Polls every `period` until `shutdown` flips to true.
///
/// Ticks never overlap: a slow poll delays the next one. Errors are logged
/// and the loop keeps going. Returns the accumulated totals.
pub async fn run_poller(
    desk: Arc<SupportDesk>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> PollReport {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut totals = PollReport::default();
    info!(every_secs = period.as_secs(), "mailbox poller started");

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = tick.tick() => {
                match desk.poll_once().await {
                    Ok(report) => {
                        if report.processed > 0 || report.failed > 0 {
                            info!(
                                fetched = report.fetched,
                                processed = report.processed,
                                skipped = report.skipped,
                                failed = report.failed,
                                "poll complete"
                            );
                        } else {
                            debug!(fetched = report.fetched, "poll complete, nothing new");
                        }
                        totals.fetched += report.fetched;
                        totals.processed += report.processed;
                        totals.skipped += report.skipped;
                        totals.duplicates += report.duplicates;
                        totals.failed += report.failed;
                    }
                    Err(e) => error!(error = %e, "poll failed"),
                }
            }
        }
    }

    info!(processed = totals.processed, "mailbox poller stopped");
    totals
}
