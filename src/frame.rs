//! Frame loop: resize detection, double-buffer swap, tick pacing.

use std::io::{self, Write};
use std::time::Duration;

use crate::render::Buffer;
use crate::term::{Key, Term};

/// Reconcile both buffers with the terminal dimensions.
///
/// On a change, both buffers are resized in place and zeroed, which makes
/// the next flush repaint every cell. Returns whether a resize happened.
pub fn sync_dimensions(cur: &mut Buffer, prev: &mut Buffer, w: u16, h: u16) -> bool {
    if cur.width() == w && cur.height() == h {
        return false;
    }
    cur.resize(w, h);
    prev.resize(w, h);
    true
}

/// Drives begin/end-frame and tick pacing over a [`Term`] and two buffers.
pub struct FrameLoop {
    term: Term,
    cur: Buffer,
    prev: Buffer,
    tick: Duration,
}

impl FrameLoop {
    pub fn new(term: Term, tick: Duration) -> Self {
        let (w, h) = term.size();
        Self {
            term,
            cur: Buffer::new(w, h),
            prev: Buffer::new(w, h),
            tick,
        }
    }

    pub fn size(&self) -> (u16, u16) {
        self.term.size()
    }

    /// Poll the terminal size without starting a frame. Returns true when
    /// it no longer matches the buffers, which callers treat like input:
    /// a reason to redraw this tick.
    pub fn poll_resize(&mut self) -> io::Result<bool> {
        let (w, h) = self.term.refresh_size()?;
        Ok(self.cur.width() != w || self.cur.height() != h)
    }

    /// Refresh size, force a full repaint if it changed, and hand out a
    /// cleared buffer to draw into.
    pub fn begin_frame(&mut self) -> io::Result<&mut Buffer> {
        let (w, h) = self.term.refresh_size()?;
        sync_dimensions(&mut self.cur, &mut self.prev, w, h);
        self.cur.clear();
        Ok(&mut self.cur)
    }

    /// Flush the diff against the previous frame, then retain the current
    /// frame as the new baseline.
    pub fn end_frame(&mut self) -> io::Result<()> {
        let mut out = io::stdout().lock();
        self.cur.flush(&self.prev, &mut out)?;
        out.flush()?;
        self.prev.copy_from(&self.cur);
        Ok(())
    }

    /// Fixed-duration sleep; the only throttling in the render path.
    pub fn tick(&self) {
        std::thread::sleep(self.tick);
    }

    pub fn poll_key(&mut self) -> Option<Key> {
        self.term.poll_key()
    }

    /// Restore the terminal. Also runs on drop via [`Term`].
    pub fn shutdown(&mut self) {
        self.term.deinit();
    }
}
