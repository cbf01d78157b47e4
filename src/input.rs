//! Command input for the interactive reader
//!
//! The event loop polls stdin edge-triggered, so a readiness event is only
//! reported once per burst of data. Input is therefore read straight from
//! the descriptor, bypassing std's buffered stdin, until it runs dry.

use log::debug;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd;
use std::os::unix::io::RawFd;

/// A descriptor switched to non-blocking mode, restored on drop
pub struct NonBlockingInput {
    fd: RawFd,
    flags: OFlag,
}

impl NonBlockingInput {
    pub fn new(fd: RawFd) -> nix::Result<Self> {
        let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
        fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
        Ok(Self { fd, flags })
    }

    /// Append everything currently readable to `pending`
    ///
    /// Returns false once the other end has closed.
    pub fn drain_into(&self, pending: &mut Vec<u8>) -> nix::Result<bool> {
        let mut buf = [0u8; 1024];
        loop {
            match unistd::read(self.fd, &mut buf) {
                Ok(0) => return Ok(false),
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(Errno::EAGAIN) => return Ok(true),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl Drop for NonBlockingInput {
    fn drop(&mut self) {
        if let Err(e) = fcntl(self.fd, FcntlArg::F_SETFL(self.flags)) {
            debug!("Failed to restore descriptor flags: {}", e);
        }
    }
}

/// Split complete lines off the front of `pending`
///
/// A trailing partial line stays buffered until its newline arrives.
pub fn take_lines(pending: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = pending.drain(..=pos).collect();
        lines.push(String::from_utf8_lossy(&line).trim().to_string());
    }
    lines
}
