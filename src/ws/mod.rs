pub mod session;

pub use session::{WsSessionHandler, WsSubscriber};
