//! Output sink that can be sealed against further writes.

use std::io::{self, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Wraps the caller's sink. Once sealed, writes and seeks are accepted but
/// never reach the inner sink, so a dropped zip writer cannot finalize an
/// aborted archive into it.
#[derive(Debug)]
pub struct SealableSink<W> {
    inner: W,
    sealed: Arc<AtomicBool>,
    position: u64,
}

impl<W> SealableSink<W> {
    /// Wraps `inner` and returns the handle that seals it.
    #[must_use]
    pub fn new(inner: W) -> (Self, SinkSeal) {
        let sealed = Arc::new(AtomicBool::new(false));
        let seal = SinkSeal(Arc::clone(&sealed));
        let sink = Self {
            inner,
            sealed,
            position: 0,
        };
        (sink, seal)
    }

    /// Returns the wrapped writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

/// Handle that seals a [`SealableSink`].
#[derive(Debug, Clone)]
pub struct SinkSeal(Arc<AtomicBool>);

impl SinkSeal {
    /// Rejects every later write or seek on the sink.
    pub fn seal(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns whether [`SinkSeal::seal`] was called.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl<W: Write> Write for SealableSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = if self.is_sealed() {
            buf.len()
        } else {
            self.inner.write(buf)?
        };
        self.position = self.position.saturating_add(written as u64);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.is_sealed() {
            return Ok(());
        }
        self.inner.flush()
    }
}

impl<W: Seek> Seek for SealableSink<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if !self.is_sealed() {
            self.position = self.inner.seek(pos)?;
            return Ok(self.position);
        }

        self.position = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) | SeekFrom::End(delta) => {
                self.position.saturating_add_signed(delta)
            }
        };
        Ok(self.position)
    }
}
