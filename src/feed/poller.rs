use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, info};
use tokio::time::interval;

use crate::broker::RateBroker;
use crate::feed::fetcher::SnapshotSource;
use crate::feed::snapshot::should_publish;

/// Drives fetch -> change detection -> publish on a fixed cadence, forever.
///
/// A failed fetch is logged and treated like "no change"; the next cycle runs
/// after the same interval regardless. Fixed-interval retry is the only retry
/// policy, no backoff.
pub struct RatePoller<S: SnapshotSource> {
    source: S,
    broker: Arc<RateBroker>,
    poll_interval: Duration,
}

impl<S: SnapshotSource> RatePoller<S> {
    pub fn new(source: S, broker: Arc<RateBroker>, poll_interval: Duration) -> Self {
        Self {
            source,
            broker,
            poll_interval,
        }
    }

    pub async fn run(self) {
        info!(
            "Starting rate polling loop (every {}s)",
            self.poll_interval.as_secs()
        );
        let mut ticker = interval(self.poll_interval);

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// One fetch cycle. Factored out of the loop so the decision logic can be
    /// exercised without timers.
    pub async fn poll_once(&self) {
        match self.source.fetch().await {
            Ok(candidate) => {
                if should_publish(&candidate, &self.broker.current_snapshot()) {
                    self.broker.publish(candidate);
                } else {
                    debug!("Snapshot unchanged, nothing to publish");
                }
            }
            Err(e) => {
                error!("Rate fetch failed, keeping last published snapshot: {}", e);
            }
        }
    }
}
