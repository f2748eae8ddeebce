pub mod subject;

pub use subject::{DeliveryError, RateBroker, RateSubscriber};
