//! Keyboard-to-joystick teleop bridge
//!
//! Reads single keystrokes from a raw-mode terminal and publishes a fixed
//! shape joystick control message at a steady rate:
//!
//! - space stops publishing
//! - `s` resumes publishing
//! - `q` shuts the bridge down

pub mod bridge;
pub mod config;
pub mod error;
pub mod listener;
pub mod publisher;
pub mod state;
pub mod terminal;

pub use bridge::{Bridge, BridgeOptions, RunReport};
pub use config::{BridgeConfig, SinkConfig};
pub use error::{BridgeError, ConfigError};
pub use listener::{FdKeys, InputListener, KeyAction, KeyPoll, KeySource};
pub use publisher::{Clock, Publisher, SystemClock, TickOutcome};
pub use state::{SharedState, ShutdownSignal};
pub use terminal::{TerminalError, TerminalGuard};
