//! Periodic publisher
//!
//! Called once per timer tick. Emits the control message when publishing is
//! enabled and does nothing otherwise. It never waits on the sink: whatever
//! the sink returns is handed straight back to the caller.

use keyjoy_transport::{ControlMessage, MessageSink, Stamp, TransportError};
use tracing::trace;

use crate::state::SharedState;

/// Source of message timestamps
pub trait Clock {
    fn now(&self) -> Stamp;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Stamp {
        Stamp::now()
    }
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Published,
    Suppressed,
}

/// Owns the control message and the sink it goes to
pub struct Publisher<S, C = SystemClock> {
    message: ControlMessage,
    sink: S,
    clock: C,
    state: SharedState,
    last_stamp: Option<Stamp>,
}

impl<S: MessageSink, C: Clock> Publisher<S, C> {
    pub fn new(message: ControlMessage, sink: S, clock: C, state: SharedState) -> Self {
        Self {
            message,
            sink,
            clock,
            state,
            last_stamp: None,
        }
    }

    /// One timer period
    ///
    /// The stamp is only refreshed when a message actually goes out, and
    /// never moves backwards even if the wall clock does.
    pub fn tick(&mut self) -> Result<TickOutcome, TransportError> {
        if !self.state.is_publishing() {
            return Ok(TickOutcome::Suppressed);
        }

        let now = self.clock.now();
        let stamp = match self.last_stamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_stamp = Some(stamp);
        self.message.header.stamp = stamp;

        self.sink.publish(&self.message)?;
        trace!("Published control message at {}.{:09}", stamp.sec, stamp.nanosec);
        Ok(TickOutcome::Published)
    }

    pub fn message(&self) -> &ControlMessage {
        &self.message
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
