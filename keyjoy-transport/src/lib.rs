//! Control message types and delivery sinks for keyjoy
//!
//! The bridge itself only knows "publish this message somewhere". This crate
//! defines what a message looks like and where it can go:
//!
//! - [`UdpSink`] - one JSON datagram per message to a fixed peer
//! - [`JsonLinesSink`] - one JSON object per line on any `Write` (stdout, files)

pub mod error;
pub mod sink;
pub mod types;

pub use error::TransportError;
pub use sink::{JsonLinesSink, MessageSink, UdpSink};
pub use types::{ControlMessage, Header, Stamp, AXIS_COUNT, BUTTON_COUNT, DEFAULT_TOPIC};
