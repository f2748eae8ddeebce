use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// One tracked instrument: the value from the latest provider update and the
/// value from the update before it. Field names are the wire format sent to
/// subscribers.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct RatePoint {
    pub current: f64,
    pub previous: f64,
}

/// Full instrument-code -> rate mapping at one point in time. Key order is
/// irrelevant; equality is structural (same key set, same pairs).
pub type Snapshot = HashMap<String, RatePoint>;

/// Decides whether a freshly fetched snapshot is worth publishing.
///
/// Pure comparison, no side effects: publish iff the candidate differs from
/// the currently published snapshot in key set or in any instrument's values.
pub fn should_publish(candidate: &Snapshot, current: &Snapshot) -> bool {
    candidate != current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(current: f64, previous: f64) -> RatePoint {
        RatePoint { current, previous }
    }

    #[test]
    fn test_identical_snapshots_do_not_publish() {
        let mut a = Snapshot::new();
        a.insert("USD".to_string(), point(90.0, 89.5));
        a.insert("EUR".to_string(), point(99.1, 98.7));

        // Same contents, different insertion order.
        let mut b = Snapshot::new();
        b.insert("EUR".to_string(), point(99.1, 98.7));
        b.insert("USD".to_string(), point(90.0, 89.5));

        assert!(!should_publish(&b, &a));
    }

    #[test]
    fn test_changed_value_publishes() {
        let mut current = Snapshot::new();
        current.insert("USD".to_string(), point(90.0, 89.5));

        let mut candidate = current.clone();
        candidate.insert("USD".to_string(), point(90.2, 90.0));

        assert!(should_publish(&candidate, &current));
    }

    #[test]
    fn test_changed_key_set_publishes() {
        let mut current = Snapshot::new();
        current.insert("USD".to_string(), point(90.0, 89.5));

        let mut candidate = current.clone();
        candidate.insert("EUR".to_string(), point(99.1, 98.7));

        assert!(should_publish(&candidate, &current));
        assert!(should_publish(&Snapshot::new(), &current));
    }

    #[test]
    fn test_empty_against_empty_does_not_publish() {
        assert!(!should_publish(&Snapshot::new(), &Snapshot::new()));
    }
}
