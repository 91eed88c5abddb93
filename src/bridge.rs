//! Lifecycle owner
//!
//! Wires the shared flags into the listener and publisher, drives the
//! publish timer, and tears everything down exactly once:
//!
//! 1. keep-running latched off
//! 2. listener thread joined (bounded by the key poll timeout)
//! 3. terminal attributes restored
//!
//! A `q` key, a termination signal, end of input, and dropping the bridge
//! all end up in the same teardown.

use std::os::unix::io::RawFd;
use std::thread::JoinHandle;
use std::time::Duration;

use keyjoy_transport::{ControlMessage, MessageSink};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::listener::{InputListener, KeySource};
use crate::publisher::{Clock, Publisher, SystemClock, TickOutcome};
use crate::state::{SharedState, ShutdownSignal};
use crate::terminal::TerminalGuard;

/// Startup parameters
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub period: Duration,
    pub poll_timeout: Duration,
    pub frame_id: String,
    /// Terminal to put into non-canonical mode, if any
    pub terminal_fd: Option<RawFd>,
}

impl BridgeOptions {
    pub fn from_config(config: &BridgeConfig, terminal_fd: Option<RawFd>) -> Self {
        Self {
            period: config.publish_period(),
            poll_timeout: config.poll_timeout(),
            frame_id: config.frame_id.clone(),
            terminal_fd,
        }
    }
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default(), None)
    }
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub published: u64,
    pub suppressed: u64,
    pub sink_errors: u64,
}

/// Running bridge: listener thread, publish timer, terminal guard
pub struct Bridge<S: MessageSink, C: Clock = SystemClock> {
    state: SharedState,
    signal: ShutdownSignal,
    publisher: Publisher<S, C>,
    interval: Interval,
    listener: Option<JoinHandle<()>>,
    guard: Option<TerminalGuard>,
    report: RunReport,
    last_sink_error: Option<String>,
    torn_down: bool,
}

impl<S: MessageSink, C: Clock> Bridge<S, C> {
    /// Put the terminal into raw mode, start the timer, spawn the listener
    ///
    /// Must be called from within a tokio runtime. If anything fails after
    /// the terminal was switched, the guard is dropped and restores it.
    pub fn start<K>(
        options: BridgeOptions,
        keys: K,
        sink: S,
        clock: C,
        signal: ShutdownSignal,
    ) -> Result<Self, BridgeError>
    where
        K: KeySource + Send + 'static,
    {
        if options.period.is_zero() {
            return Err(BridgeError::ZeroPeriod);
        }

        let state = SharedState::new();
        let message = ControlMessage::new(options.frame_id);

        let guard = options
            .terminal_fd
            .map(TerminalGuard::acquire)
            .transpose()?;

        let mut interval = tokio::time::interval(options.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let publisher = Publisher::new(message, sink, clock, state.clone());

        let listener = InputListener::new(
            keys,
            state.clone(),
            signal.clone(),
            options.poll_timeout,
        )
        .spawn()
        .map_err(BridgeError::Spawn)?;

        info!(
            "Bridge started: publishing every {} ms",
            options.period.as_millis()
        );

        Ok(Self {
            state,
            signal,
            publisher,
            interval,
            listener: Some(listener),
            guard,
            report: RunReport::default(),
            last_sink_error: None,
            torn_down: false,
        })
    }

    /// Publish on every tick until shutdown is requested, then tear down
    pub async fn run(mut self) -> Result<RunReport, BridgeError> {
        loop {
            tokio::select! {
                biased;
                _ = self.signal.wait() => break,
                _ = self.interval.tick() => self.on_tick(),
            }
        }
        self.shutdown()?;
        Ok(self.report)
    }

    fn on_tick(&mut self) {
        match self.publisher.tick() {
            Ok(TickOutcome::Published) => {
                self.report.published += 1;
                if let Some(prev) = self.last_sink_error.take() {
                    info!("Sink recovered (last error: {})", prev);
                }
            }
            Ok(TickOutcome::Suppressed) => self.report.suppressed += 1,
            Err(e) => {
                self.report.sink_errors += 1;
                let msg = e.to_string();
                // Only log when the failure changes, not every tick
                if self.last_sink_error.as_deref() == Some(msg.as_str()) {
                    debug!("Failed to publish control message: {}", msg);
                } else {
                    warn!("Failed to publish control message: {}", msg);
                }
                self.last_sink_error = Some(msg);
            }
        }
    }

    /// Stop the listener, join it, restore the terminal. Runs once.
    pub fn shutdown(&mut self) -> Result<(), BridgeError> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        self.state.stop();

        let joined = match self.listener.take() {
            Some(handle) => handle.join().map_err(|_| {
                error!("Input listener thread panicked");
                BridgeError::ListenerPanicked
            }),
            None => Ok(()),
        };

        // Restore even if the listener died
        let restored = match self.guard.take() {
            Some(guard) => guard.release().map_err(BridgeError::from),
            None => Ok(()),
        };

        info!(
            "Shutdown complete ({} published, {} suppressed, {} sink errors)",
            self.report.published, self.report.suppressed, self.report.sink_errors
        );
        joined.and(restored)
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn signal(&self) -> &ShutdownSignal {
        &self.signal
    }

    pub fn report(&self) -> RunReport {
        self.report
    }

    pub fn publisher(&self) -> &Publisher<S, C> {
        &self.publisher
    }
}

impl<S: MessageSink, C: Clock> Drop for Bridge<S, C> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Teardown on drop failed: {}", e);
        }
    }
}
