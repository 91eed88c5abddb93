//! Helpers shared by the integration tests

use std::io;
use std::os::unix::io::RawFd;

/// Pseudo-terminal pair; the slave side stands in for stdin
pub struct Pty {
    pub master: RawFd,
    pub slave: RawFd,
}

impl Pty {
    pub fn open() -> Self {
        let mut master = -1;
        let mut slave = -1;
        let rc = unsafe {
            libc::openpty(
                &mut master,
                &mut slave,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(rc, 0, "openpty failed: {}", io::Error::last_os_error());
        Self { master, slave }
    }

    /// Write bytes as if typed at the terminal
    pub fn type_keys(&self, bytes: &[u8]) {
        let n = unsafe { libc::write(self.master, bytes.as_ptr().cast(), bytes.len()) };
        assert_eq!(n, bytes.len() as isize);
    }
}

impl Drop for Pty {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.slave);
            libc::close(self.master);
        }
    }
}
