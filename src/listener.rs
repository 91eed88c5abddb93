//! Input listener
//!
//! Reads single bytes from the terminal on a dedicated thread and turns the
//! three operator keys into flag flips and shutdown requests. Reads go
//! through [`KeySource::poll_key`] with a timeout so the loop notices a
//! shutdown even when nobody is typing.

use std::io;
use std::os::unix::io::RawFd;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::state::{SharedState, ShutdownSignal};

/// Result of waiting for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPoll {
    /// One byte of input
    Key(u8),
    /// Nothing arrived within the timeout
    Idle,
    /// End of input
    Closed,
}

/// Something keys can be read from
pub trait KeySource {
    /// Wait up to `timeout` for a single byte
    fn poll_key(&mut self, timeout: Duration) -> io::Result<KeyPoll>;
}

/// Reads keys from a file descriptor (normally stdin) using `poll(2)`
pub struct FdKeys {
    fd: RawFd,
}

impl FdKeys {
    pub fn new(fd: RawFd) -> Self {
        Self { fd }
    }

    pub fn stdin() -> Self {
        Self::new(libc::STDIN_FILENO)
    }
}

impl KeySource for FdKeys {
    fn poll_key(&mut self, timeout: Duration) -> io::Result<KeyPoll> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        let ready = unsafe { libc::poll(&mut pfd, 1, millis) };
        if ready < 0 {
            return Err(io::Error::last_os_error());
        }
        if ready == 0 {
            return Ok(KeyPoll::Idle);
        }
        if pfd.revents & libc::POLLNVAL != 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }

        // POLLIN, POLLHUP and POLLERR all mean read() will not block
        let mut byte = 0u8;
        let n = unsafe { libc::read(self.fd, (&mut byte as *mut u8).cast(), 1) };
        match n {
            1 => Ok(KeyPoll::Key(byte)),
            0 => Ok(KeyPoll::Closed),
            _ => Err(io::Error::last_os_error()),
        }
    }
}

/// What a key does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Space: stop publishing
    Stop,
    /// `s`: resume publishing
    Resume,
    /// `q`: shut the bridge down
    Quit,
    /// Anything else
    Ignore,
}

impl KeyAction {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b' ' => KeyAction::Stop,
            b's' => KeyAction::Resume,
            b'q' => KeyAction::Quit,
            _ => KeyAction::Ignore,
        }
    }
}

/// Key loop state: the source, the shared flags, and the shutdown signal
pub struct InputListener<K> {
    keys: K,
    state: SharedState,
    shutdown: ShutdownSignal,
    poll_timeout: Duration,
}

impl<K: KeySource> InputListener<K> {
    pub fn new(
        keys: K,
        state: SharedState,
        shutdown: ShutdownSignal,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            keys,
            state,
            shutdown,
            poll_timeout,
        }
    }

    /// Apply a single key action to the shared state
    pub fn handle(&self, action: KeyAction) {
        match action {
            KeyAction::Stop => {
                self.state.set_publishing(false);
                info!("Stopped publishing control messages");
            }
            KeyAction::Resume => {
                self.state.set_publishing(true);
                info!("Resumed publishing control messages");
            }
            KeyAction::Quit => {
                if self.shutdown.request() {
                    info!("q pressed, shutting down");
                } else {
                    debug!("q pressed, shutdown already in progress");
                }
            }
            KeyAction::Ignore => {}
        }
    }

    /// Read and dispatch keys until keep-running is cleared
    ///
    /// End of input or a read error also ends the loop, after requesting
    /// shutdown so the rest of the bridge follows.
    pub fn run(mut self) {
        while self.state.keep_running() {
            match self.keys.poll_key(self.poll_timeout) {
                Ok(KeyPoll::Key(byte)) => self.handle(KeyAction::from_byte(byte)),
                Ok(KeyPoll::Idle) => {}
                Ok(KeyPoll::Closed) => {
                    info!("Input closed, shutting down");
                    self.shutdown.request();
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Error reading input: {}", e);
                    self.shutdown.request();
                    break;
                }
            }
        }
        debug!("Input listener exiting");
    }
}

impl<K: KeySource + Send + 'static> InputListener<K> {
    /// Run the key loop on its own named thread
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("keyjoy-keys".to_string())
            .spawn(move || self.run())
    }
}
