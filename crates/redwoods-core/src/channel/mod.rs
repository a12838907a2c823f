//! Duplex message channel with bounded automatic reconnection.
//!
//! Independent of the session core. `ReconnectingChannel` owns a
//! supervisor task that connects, pumps inbound frames to subscribers and,
//! after an unexpected close, retries a fixed number of times with a fixed
//! delay. Sends are best effort: nothing is buffered while disconnected.

pub mod connector;
pub mod error;
pub mod reconnecting;

pub use connector::{Connection, Connector, WsConnector};
pub use error::ChannelError;
pub use reconnecting::{ChannelConfig, ChannelState, ReconnectingChannel, Subscription};
