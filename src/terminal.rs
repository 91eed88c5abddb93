//! Terminal mode guard
//!
//! Takes a snapshot of the terminal attributes, switches off canonical mode
//! and echo, and puts the snapshot back when released or dropped. Nothing
//! else about the terminal is touched: output processing and signal keys
//! (Ctrl+C) keep working.

use std::io;
use std::os::unix::io::RawFd;

use thiserror::Error;
use tracing::{debug, warn};

/// Errors from terminal attribute handling
#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("fd {0} is not a terminal (run keyjoy from an interactive shell)")]
    NotATerminal(RawFd),
    #[error("Failed to read terminal attributes: {0}")]
    GetAttr(#[source] io::Error),
    #[error("Failed to apply terminal attributes: {0}")]
    SetAttr(#[source] io::Error),
}

/// Read the current attributes of `fd`
pub fn get_attributes(fd: RawFd) -> Result<libc::termios, TerminalError> {
    // SAFETY: termios is plain data; tcgetattr fills it or fails.
    let mut termios: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut termios) } != 0 {
        return Err(TerminalError::GetAttr(io::Error::last_os_error()));
    }
    Ok(termios)
}

/// Apply `termios` to `fd` immediately
pub fn set_attributes(fd: RawFd, termios: &libc::termios) -> Result<(), TerminalError> {
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) } != 0 {
        return Err(TerminalError::SetAttr(io::Error::last_os_error()));
    }
    Ok(())
}

/// Compare every attribute the terminal driver reports
///
/// `libc::termios` has no `PartialEq` without extra libc features, and
/// comparing raw bytes would include struct padding.
pub fn attributes_match(a: &libc::termios, b: &libc::termios) -> bool {
    // SAFETY: cfget*speed only read the struct.
    let speeds = unsafe {
        libc::cfgetispeed(a) == libc::cfgetispeed(b) && libc::cfgetospeed(a) == libc::cfgetospeed(b)
    };
    a.c_iflag == b.c_iflag
        && a.c_oflag == b.c_oflag
        && a.c_cflag == b.c_cflag
        && a.c_lflag == b.c_lflag
        && a.c_cc == b.c_cc
        && speeds
}

/// Non-canonical, no-echo mode for one terminal, restored on release or drop
pub struct TerminalGuard {
    fd: RawFd,
    original: libc::termios,
    restored: bool,
}

impl TerminalGuard {
    /// Snapshot the attributes of `fd`, then clear `ICANON` and `ECHO`
    ///
    /// Fails if `fd` is not a terminal. Key handling assumes unbuffered,
    /// unechoed input, so there is no canonical-mode fallback.
    pub fn acquire(fd: RawFd) -> Result<Self, TerminalError> {
        if unsafe { libc::isatty(fd) } != 1 {
            return Err(TerminalError::NotATerminal(fd));
        }

        let original = get_attributes(fd)?;
        let mut raw = original;
        raw.c_lflag &= !(libc::ICANON | libc::ECHO);
        set_attributes(fd, &raw)?;
        debug!("Terminal fd {} switched to non-canonical, no-echo mode", fd);

        Ok(Self {
            fd,
            original,
            restored: false,
        })
    }

    /// Attributes captured before raw mode was installed
    pub fn original(&self) -> &libc::termios {
        &self.original
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Put the original attributes back
    pub fn release(mut self) -> Result<(), TerminalError> {
        self.restore()
    }

    fn restore(&mut self) -> Result<(), TerminalError> {
        if self.restored {
            return Ok(());
        }
        // Single attempt, even if it fails
        self.restored = true;
        set_attributes(self.fd, &self.original)?;
        debug!("Terminal fd {} restored", self.fd);
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::pty::Pty;
    use super::*;

    #[test]
    fn test_acquire_clears_only_canon_and_echo() {
        let pty = Pty::open();
        let before = get_attributes(pty.slave).unwrap();

        let guard = TerminalGuard::acquire(pty.slave).unwrap();
        assert!(attributes_match(guard.original(), &before));

        let during = get_attributes(pty.slave).unwrap();
        assert_eq!(during.c_lflag & libc::ICANON, 0);
        assert_eq!(during.c_lflag & libc::ECHO, 0);
        assert_eq!(
            during.c_lflag | libc::ICANON | libc::ECHO,
            before.c_lflag | libc::ICANON | libc::ECHO
        );
        assert_eq!(during.c_iflag, before.c_iflag);
        assert_eq!(during.c_oflag, before.c_oflag);
        assert_eq!(during.c_cflag, before.c_cflag);
        assert_eq!(during.c_cc, before.c_cc);

        guard.release().unwrap();
    }

    #[test]
    fn test_release_restores_exact_snapshot() {
        let pty = Pty::open();
        let before = get_attributes(pty.slave).unwrap();

        let guard = TerminalGuard::acquire(pty.slave).unwrap();
        guard.release().unwrap();

        let after = get_attributes(pty.slave).unwrap();
        assert!(attributes_match(&before, &after));
    }

    #[test]
    fn test_drop_restores_exact_snapshot() {
        let pty = Pty::open();
        let before = get_attributes(pty.slave).unwrap();

        {
            let _guard = TerminalGuard::acquire(pty.slave).unwrap();
            assert!(!attributes_match(&before, &get_attributes(pty.slave).unwrap()));
        }

        assert!(attributes_match(&before, &get_attributes(pty.slave).unwrap()));
    }

    #[test]
    fn test_snapshot_not_a_default() {
        // Start from non-default attributes and make sure those come back
        let pty = Pty::open();
        let mut custom = get_attributes(pty.slave).unwrap();
        custom.c_lflag &= !libc::ECHOCTL;
        custom.c_cc[libc::VINTR] = 0x07;
        set_attributes(pty.slave, &custom).unwrap();

        let guard = TerminalGuard::acquire(pty.slave).unwrap();
        guard.release().unwrap();

        let after = get_attributes(pty.slave).unwrap();
        assert!(attributes_match(&custom, &after));
        assert_eq!(after.c_cc[libc::VINTR], 0x07);
    }

    #[test]
    fn test_not_a_terminal() {
        let mut fds = [0 as RawFd; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);

        let err = TerminalGuard::acquire(fds[0]).err().unwrap();
        assert!(matches!(err, TerminalError::NotATerminal(fd) if fd == fds[0]));

        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }
}
