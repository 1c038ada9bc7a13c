//! Frame decoder
//!
//! Consumes the device byte stream one logical frame at a time. Each call to
//! [`FrameDecoder::read_frame`] reads exactly one byte first: anything other
//! than the sync byte is skipped and reported as `Ok(None)`, so callers never
//! block on line noise. Once a sync byte is seen the rest of the frame is read
//! with blocking reads.
//!
//! If the source reports `TimedOut` or `WouldBlock` mid-frame the partial
//! frame is abandoned with [`ScopeError::FrameTimeout`] and the decoder goes
//! back to waiting for the next sync byte.

use super::{control_word, READY_FLAG, SYNC_BYTE};
use crate::error::{Result, ScopeError};
use crate::types::{Frame, RawBuffer};
use std::io::{ErrorKind, Read};

/// Length of the frame header (sync, control word, ready flag)
pub const HEADER_LEN: usize = 3;

/// Counters kept by the decoder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames decoded, ready or not
    pub frames: u64,
    /// Frames that carried samples
    pub ready_frames: u64,
    /// Bytes skipped while waiting for sync
    pub skipped_bytes: u64,
    /// Frames dropped because their deadline expired
    pub abandoned_frames: u64,
    /// Every byte consumed from the source
    pub bytes_consumed: u64,
}

/// Resynchronizing decoder for the instrument frame format
#[derive(Debug, Default)]
pub struct FrameDecoder {
    stats: DecoderStats,
    payload: Vec<u8>,
}

impl FrameDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder statistics
    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    /// Read one byte and, if it is a sync byte, the frame it starts
    ///
    /// Returns `Ok(None)` when the byte was not a sync byte.
    pub fn read_frame<R: Read>(&mut self, src: &mut R) -> Result<Option<Frame>> {
        let mut byte = [0u8; 1];
        self.fill(src, &mut byte, 0, HEADER_LEN)?;
        if byte[0] != SYNC_BYTE {
            self.stats.skipped_bytes += 1;
            tracing::trace!("Skipped byte {:#04x} while waiting for sync", byte[0]);
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN - 1];
        if let Err(e) = self.fill(src, &mut header, 1, HEADER_LEN) {
            return Err(self.abandon(e));
        }
        let config = control_word::decode(header[0]);
        let ready = header[1] == READY_FLAG;

        let samples = if ready {
            let expected = HEADER_LEN + config.payload_len();
            let mut payload = std::mem::take(&mut self.payload);
            payload.resize(config.payload_len(), 0);
            let filled = self.fill(src, &mut payload, HEADER_LEN, expected);
            let raw = filled.map(|()| RawBuffer::from_payload(&payload));
            self.payload = payload;
            match raw {
                Ok(raw) => Some(raw),
                Err(e) => return Err(self.abandon(e)),
            }
        } else {
            None
        };

        self.stats.frames += 1;
        if ready {
            self.stats.ready_frames += 1;
        }

        Ok(Some(Frame {
            config,
            ready,
            samples,
        }))
    }

    fn abandon(&mut self, err: ScopeError) -> ScopeError {
        if matches!(err, ScopeError::FrameTimeout { .. }) {
            self.stats.abandoned_frames += 1;
        }
        err
    }

    /// Fill `buf` from the source; `offset` and `expected` describe the frame
    /// position for timeout reporting
    fn fill<R: Read>(
        &mut self,
        src: &mut R,
        buf: &mut [u8],
        offset: usize,
        expected: usize,
    ) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match src.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(ScopeError::Link("link closed by device".to_string()));
                }
                Ok(n) => {
                    filled += n;
                    self.stats.bytes_consumed += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Err(ScopeError::FrameTimeout {
                        received: offset + filled,
                        expected,
                    });
                }
                Err(e) => return Err(ScopeError::Link(e.to_string())),
            }
        }
        Ok(())
    }
}
