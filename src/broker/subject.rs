use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use log::{info, warn};
use uuid::Uuid;

use crate::feed::snapshot::{RatePoint, Snapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The subscriber's connection is gone (or going).
    SendFailed(String),
    /// The subscriber exists but is not draining its queue fast enough.
    Timeout,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::SendFailed(msg) => write!(f, "send failed: {}", msg),
            DeliveryError::Timeout => write!(f, "subscriber queue full, send timed out"),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// One attached delivery target, one live connection. Implementations must
/// not block in `deliver`; a failure is reported back and isolated to that
/// subscriber.
pub trait RateSubscriber: Send + Sync {
    /// Stable identity for the lifetime of the connection. Attach is keyed on
    /// this, which is what makes it idempotent.
    fn id(&self) -> Uuid;

    fn deliver(&self, snapshot: &Snapshot) -> Result<(), DeliveryError>;
}

struct BrokerState {
    latest: Snapshot,
    previous: Snapshot,
    subscribers: HashMap<Uuid, Arc<dyn RateSubscriber>>,
}

/// Owns the authoritative published snapshot and the set of attached
/// subscribers. Constructed once in main and injected everywhere it is
/// needed; lives for the process lifetime.
pub struct RateBroker {
    state: Mutex<BrokerState>,
}

impl RateBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BrokerState {
                latest: Snapshot::new(),
                previous: Snapshot::new(),
                subscribers: HashMap::new(),
            }),
        }
    }

    /// Registers a subscriber. Attaching the same subscriber twice is a
    /// no-op: it will still receive exactly one delivery per publish.
    pub fn attach(&self, subscriber: Arc<dyn RateSubscriber>) {
        let mut state = self.state.lock().unwrap();
        let id = subscriber.id();
        if state.subscribers.insert(id, subscriber).is_none() {
            info!("Subscriber {} attached ({} total)", id, state.subscribers.len());
        }
    }

    /// Removes a subscriber. Absent ids are tolerated so a connection
    /// teardown racing an earlier failure-driven removal stays quiet.
    pub fn detach(&self, id: Uuid) {
        let mut state = self.state.lock().unwrap();
        if state.subscribers.remove(&id).is_some() {
            info!("Subscriber {} detached ({} remain)", id, state.subscribers.len());
        }
    }

    /// Replaces the published snapshot and fans it out to every subscriber
    /// attached at the moment the call starts. Returns how many deliveries
    /// succeeded.
    ///
    /// The membership copy is taken under the lock and delivery happens
    /// outside it, so attach/detach during fan-out only affect later
    /// publishes and a slow deliver cannot stall connection lifecycle events.
    /// A failed delivery is logged and skipped, never propagated.
    pub fn publish(&self, snapshot: Snapshot) -> usize {
        let recipients: Vec<Arc<dyn RateSubscriber>> = {
            let mut state = self.state.lock().unwrap();
            state.previous = std::mem::replace(&mut state.latest, snapshot.clone());
            state.subscribers.values().cloned().collect()
        };

        let mut delivered = 0;
        for subscriber in &recipients {
            match subscriber.deliver(&snapshot) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Delivery to subscriber {} failed: {}", subscriber.id(), e);
                }
            }
        }

        if !recipients.is_empty() {
            info!(
                "Published snapshot with {} instruments to {}/{} subscribers",
                snapshot.len(),
                delivered,
                recipients.len()
            );
        }
        delivered
    }

    /// The most recently published snapshot (empty before the first publish).
    pub fn current_snapshot(&self) -> Snapshot {
        self.state.lock().unwrap().latest.clone()
    }

    /// The snapshot that `current_snapshot` held before the last publish.
    pub fn previous_snapshot(&self) -> Snapshot {
        self.state.lock().unwrap().previous.clone()
    }

    /// Point query against the published snapshot, without waiting for the
    /// next publish.
    pub fn rate_for(&self, code: &str) -> Option<RatePoint> {
        self.state.lock().unwrap().latest.get(code).copied()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.subscribers.len())
            .unwrap_or(0)
    }
}

impl Default for RateBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSubscriber {
        id: Uuid,
        deliveries: Mutex<Vec<Snapshot>>,
    }

    impl RecordingSubscriber {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: Uuid::new_v4(),
                deliveries: Mutex::new(Vec::new()),
            })
        }

        fn delivery_count(&self) -> usize {
            self.deliveries.lock().unwrap().len()
        }
    }

    impl RateSubscriber for RecordingSubscriber {
        fn id(&self) -> Uuid {
            self.id
        }

        fn deliver(&self, snapshot: &Snapshot) -> Result<(), DeliveryError> {
            self.deliveries.lock().unwrap().push(snapshot.clone());
            Ok(())
        }
    }

    struct FailingSubscriber {
        id: Uuid,
    }

    impl RateSubscriber for FailingSubscriber {
        fn id(&self) -> Uuid {
            self.id
        }

        fn deliver(&self, _snapshot: &Snapshot) -> Result<(), DeliveryError> {
            Err(DeliveryError::SendFailed("connection reset".to_string()))
        }
    }

    fn usd_snapshot(current: f64, previous: f64) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert("USD".to_string(), RatePoint { current, previous });
        snapshot
    }

    #[test]
    fn test_attached_subscriber_receives_publish() {
        let broker = RateBroker::new();
        let subscriber = RecordingSubscriber::new();
        broker.attach(subscriber.clone());

        let snapshot = usd_snapshot(90.0, 89.5);
        broker.publish(snapshot.clone());

        let deliveries = subscriber.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0], snapshot);
    }

    #[test]
    fn test_detached_subscriber_receives_nothing() {
        let broker = RateBroker::new();
        let subscriber = RecordingSubscriber::new();
        broker.attach(subscriber.clone());
        broker.detach(subscriber.id());

        broker.publish(usd_snapshot(90.0, 89.5));
        assert_eq!(subscriber.delivery_count(), 0);
    }

    #[test]
    fn test_attach_is_idempotent() {
        let broker = RateBroker::new();
        let subscriber = RecordingSubscriber::new();
        broker.attach(subscriber.clone());
        broker.attach(subscriber.clone());

        broker.publish(usd_snapshot(90.0, 89.5));
        assert_eq!(subscriber.delivery_count(), 1);
    }

    #[test]
    fn test_detach_of_unknown_subscriber_is_noop() {
        let broker = RateBroker::new();
        broker.detach(Uuid::new_v4());
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[test]
    fn test_failing_subscriber_does_not_block_others() {
        let broker = RateBroker::new();
        let healthy_a = RecordingSubscriber::new();
        let healthy_b = RecordingSubscriber::new();
        broker.attach(healthy_a.clone());
        broker.attach(Arc::new(FailingSubscriber { id: Uuid::new_v4() }));
        broker.attach(healthy_b.clone());

        let delivered = broker.publish(usd_snapshot(90.0, 89.5));

        assert_eq!(delivered, 2);
        assert_eq!(healthy_a.delivery_count(), 1);
        assert_eq!(healthy_b.delivery_count(), 1);
    }

    #[test]
    fn test_publish_rotates_previous_snapshot() {
        let broker = RateBroker::new();
        let first = usd_snapshot(90.0, 89.5);
        let second = usd_snapshot(90.2, 90.0);

        broker.publish(first.clone());
        assert_eq!(broker.current_snapshot(), first);
        assert!(broker.previous_snapshot().is_empty());

        broker.publish(second.clone());
        assert_eq!(broker.current_snapshot(), second);
        assert_eq!(broker.previous_snapshot(), first);
    }

    #[test]
    fn test_rate_for_known_and_unknown_codes() {
        let broker = RateBroker::new();
        assert!(broker.rate_for("USD").is_none());

        broker.publish(usd_snapshot(90.0, 89.5));
        let point = broker.rate_for("USD").unwrap();
        assert_eq!(point.current, 90.0);
        assert_eq!(point.previous, 89.5);
        assert!(broker.rate_for("usd").is_none());
        assert!(broker.rate_for("EUR").is_none());
    }
}
