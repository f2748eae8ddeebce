pub mod fetcher;
pub mod poller;
pub mod snapshot;

pub use fetcher::{FetchError, RateFetcher, SnapshotSource};
pub use poller::RatePoller;
pub use snapshot::{should_publish, RatePoint, Snapshot};
