//! Raw-mode terminal adapter.
//!
//! Owns the terminal lifecycle (raw mode + alternate screen) and turns the
//! non-blocking stdin byte stream into discrete [`Key`] events. Input bytes
//! land in a fixed-capacity ring and are consumed only once a complete event
//! is recognized, so escape sequences split across reads decode identically
//! to sequences arriving whole.

use std::io::{self, IsTerminal, Write};
use std::os::fd::{AsRawFd, RawFd};

use crossterm::{
    cursor, execute,
    terminal::{self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::warn;

use crate::error::Error;

const RING_CAP: usize = 64;
const ESC: u8 = 0x1b;

/// A decoded input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Up,
    Down,
    Left,
    Right,
    Enter,
    Esc,
    Tab,
    Backspace,
    Unknown,
}

/// Fixed-capacity byte ring fed by non-blocking reads.
///
/// Decoding is idempotent: an incomplete escape sequence consumes nothing,
/// so callers may poll repeatedly without losing bytes. Bytes past capacity
/// are dropped (an interactive user cannot outrun 64 bytes of lookahead).
#[derive(Debug)]
pub(crate) struct ByteRing {
    buf: [u8; RING_CAP],
    len: usize,
}

impl ByteRing {
    pub(crate) fn new() -> Self {
        Self {
            buf: [0; RING_CAP],
            len: 0,
        }
    }

    pub(crate) fn push_slice(&mut self, bytes: &[u8]) {
        let room = RING_CAP - self.len;
        let n = bytes.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
    }

    fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len);
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// Decode at most one event from the front of the ring.
    ///
    /// Returns `None` when the buffer is empty or holds only the prefix of
    /// an escape sequence; in the latter case nothing is consumed and the
    /// bytes remain for the next poll.
    pub(crate) fn decode(&mut self) -> Option<Key> {
        if self.len == 0 {
            return None;
        }
        let b0 = self.buf[0];
        if b0 != ESC {
            self.consume(1);
            return Some(match b0 {
                b'\r' | b'\n' => Key::Enter,
                b'\t' => Key::Tab,
                0x7f | 0x08 => Key::Backspace,
                0x20..=0x7e => Key::Char(b0 as char),
                _ => Key::Unknown,
            });
        }

        // ESC lookahead. With only the ESC byte buffered we cannot tell a
        // bare Escape from the start of a CSI sequence; wait for more bytes.
        if self.len < 2 {
            return None;
        }
        if self.buf[1] != b'[' {
            self.consume(1);
            return Some(Key::Esc);
        }
        if self.len < 3 {
            return None;
        }
        let final_byte = self.buf[2];
        self.consume(3);
        Some(match final_byte {
            b'A' => Key::Up,
            b'B' => Key::Down,
            b'C' => Key::Right,
            b'D' => Key::Left,
            _ => Key::Unknown,
        })
    }
}

/// Terminal session: raw mode, alternate screen, size, key polling.
///
/// [`Term::deinit`] restores the user's shell on every exit path; `Drop`
/// runs it as well so an early `?` return cannot leave the terminal raw.
#[derive(Debug)]
pub struct Term {
    w: u16,
    h: u16,
    ring: ByteRing,
    stdin_fd: RawFd,
    active: bool,
}

impl Term {
    /// Enter raw mode and the alternate screen, returning current size.
    ///
    /// Fails with [`Error::NotATerminal`] unless both stdin and stdout are
    /// interactive TTYs.
    pub fn init() -> Result<Self, Error> {
        if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
            return Err(Error::NotATerminal);
        }
        enable_raw_mode()?;
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, cursor::Hide)?;
        out.flush()?;

        let stdin_fd = io::stdin().as_raw_fd();
        set_nonblocking(stdin_fd, true)?;

        let (w, h) = terminal::size()?;
        Ok(Self {
            w,
            h,
            ring: ByteRing::new(),
            stdin_fd,
            active: true,
        })
    }

    pub fn size(&self) -> (u16, u16) {
        (self.w, self.h)
    }

    /// Re-query the window size. Resize is detected by the frame loop
    /// polling this once per frame; there is no SIGWINCH handler.
    pub fn refresh_size(&mut self) -> io::Result<(u16, u16)> {
        let (w, h) = terminal::size()?;
        self.w = w;
        self.h = h;
        Ok((w, h))
    }

    /// Issue one non-blocking read and attempt to decode one key event.
    /// Never blocks; returns `None` when no complete event is buffered.
    pub fn poll_key(&mut self) -> Option<Key> {
        let mut tmp = [0u8; 32];
        // Non-blocking read(2); EAGAIN means no bytes pending.
        let n = unsafe {
            libc::read(
                self.stdin_fd,
                tmp.as_mut_ptr() as *mut libc::c_void,
                tmp.len(),
            )
        };
        if n > 0 {
            self.ring.push_slice(&tmp[..n as usize]);
        }
        self.ring.decode()
    }

    /// Restore the terminal. Idempotent; also invoked from `Drop`.
    pub fn deinit(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Err(err) = set_nonblocking(self.stdin_fd, false) {
            warn!(%err, "failed to restore blocking stdin");
        }
        let mut out = io::stdout();
        let _ = execute!(out, cursor::Show, LeaveAlternateScreen);
        if let Err(err) = disable_raw_mode() {
            warn!(%err, "failed to leave raw mode");
        }
        let _ = out.flush();
    }
}

impl Drop for Term {
    fn drop(&mut self) {
        self.deinit();
    }
}

fn set_nonblocking(fd: RawFd, on: bool) -> io::Result<()> {
    // fcntl is the only way to toggle O_NONBLOCK on an inherited fd.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        let flags = if on {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        if libc::fcntl(fd, libc::F_SETFL, flags) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_bytes_decode_immediately() {
        let mut ring = ByteRing::new();
        ring.push_slice(b"q");
        assert_eq!(ring.decode(), Some(Key::Char('q')));
        assert_eq!(ring.decode(), None);
    }

    #[test]
    fn control_bytes_map_to_named_keys() {
        let mut ring = ByteRing::new();
        ring.push_slice(b"\r\t\x7f");
        assert_eq!(ring.decode(), Some(Key::Enter));
        assert_eq!(ring.decode(), Some(Key::Tab));
        assert_eq!(ring.decode(), Some(Key::Backspace));
    }

    #[test]
    fn csi_arrow_in_one_read() {
        let mut ring = ByteRing::new();
        ring.push_slice(b"\x1b[A");
        assert_eq!(ring.decode(), Some(Key::Up));
        assert_eq!(ring.decode(), None);
    }

    #[test]
    fn csi_arrow_split_across_reads() {
        // ESC alone, then an empty read, then the rest: exactly one Up event
        // and no spurious events in between.
        let mut ring = ByteRing::new();
        ring.push_slice(&[0x1b]);
        assert_eq!(ring.decode(), None);
        ring.push_slice(&[]);
        assert_eq!(ring.decode(), None);
        ring.push_slice(b"[A");
        assert_eq!(ring.decode(), Some(Key::Up));
        assert_eq!(ring.decode(), None);
    }

    #[test]
    fn csi_split_byte_by_byte() {
        let mut ring = ByteRing::new();
        ring.push_slice(&[0x1b]);
        assert_eq!(ring.decode(), None);
        ring.push_slice(b"[");
        assert_eq!(ring.decode(), None);
        ring.push_slice(b"B");
        assert_eq!(ring.decode(), Some(Key::Down));
    }

    #[test]
    fn esc_followed_by_non_bracket_is_escape_key() {
        let mut ring = ByteRing::new();
        ring.push_slice(&[0x1b, b'x']);
        assert_eq!(ring.decode(), Some(Key::Esc));
        assert_eq!(ring.decode(), Some(Key::Char('x')));
    }

    #[test]
    fn unknown_csi_final_consumes_sequence() {
        let mut ring = ByteRing::new();
        ring.push_slice(b"\x1b[Hq");
        assert_eq!(ring.decode(), Some(Key::Unknown));
        assert_eq!(ring.decode(), Some(Key::Char('q')));
    }

    #[test]
    fn all_arrows_decode() {
        let mut ring = ByteRing::new();
        ring.push_slice(b"\x1b[A\x1b[B\x1b[C\x1b[D");
        assert_eq!(ring.decode(), Some(Key::Up));
        assert_eq!(ring.decode(), Some(Key::Down));
        assert_eq!(ring.decode(), Some(Key::Right));
        assert_eq!(ring.decode(), Some(Key::Left));
    }

    #[test]
    fn overflow_bytes_are_dropped_not_corrupting() {
        let mut ring = ByteRing::new();
        ring.push_slice(&[b'a'; 100]);
        let mut count = 0;
        while let Some(k) = ring.decode() {
            assert_eq!(k, Key::Char('a'));
            count += 1;
        }
        assert_eq!(count, RING_CAP);
    }
}
