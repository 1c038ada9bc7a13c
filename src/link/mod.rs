//! Instrument link
//!
//! The instrument is a byte stream in both directions. Frames arrive from the
//! device; single control words go back. A [`Link`] exposes incoming bytes as
//! [`LinkChunk`]s on a crossbeam channel so the reactor can wait on the
//! instrument and the UI with one `Select`.
//!
//! # Implementations
//!
//! - [`SerialLink`] - A serial port, read by a pump thread
//! - [`SimulatedDevice`] - An in-process instrument emulator
//! - [`ChannelLink`] - Bytes pushed by the caller through a channel
//!
//! # Discarding input
//!
//! Every data chunk carries the discard generation that was current when its
//! bytes were read. [`Link::discard_input`] bumps the generation, so chunks
//! already queued are dropped by the [`ChunkReader`] instead of being decoded.

pub mod channel;
pub mod chunk;
pub mod serial;
pub mod sim;

pub use channel::{ChannelLink, ChannelLinkHandle};
pub use chunk::ChunkReader;
pub use serial::SerialLink;
pub use sim::{SimSettings, SimulatedDevice};

use crate::error::Result;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Capacity of the chunk channel between a link's producer and the reactor
pub const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// A unit of incoming link data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkChunk {
    /// Bytes read from the device
    Data { generation: u64, bytes: Vec<u8> },
    /// The transport failed
    Error(String),
    /// The device closed the link
    Closed,
}

/// Link counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Bytes received from the device
    pub bytes_received: u64,
    /// Control words written to the device
    pub control_words_sent: u64,
    /// Data chunks dropped because they predate a discard
    pub chunks_discarded: u64,
    /// Current discard generation
    pub generation: u64,
}

/// State shared between a link, its producer thread and its readers
#[derive(Debug, Default)]
pub struct LinkShared {
    generation: AtomicU64,
    bytes_received: AtomicU64,
    control_words_sent: AtomicU64,
    chunks_discarded: AtomicU64,
}

impl LinkShared {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Current discard generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new discard generation, returning it
    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn record_received(&self, bytes: usize) {
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_control_word(&self) {
        self.control_words_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.chunks_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> LinkStats {
        LinkStats {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            control_words_sent: self.control_words_sent.load(Ordering::Relaxed),
            chunks_discarded: self.chunks_discarded.load(Ordering::Relaxed),
            generation: self.generation(),
        }
    }
}

/// A bidirectional byte channel to the instrument
pub trait Link: Send {
    /// Incoming data, for use in a `Select`
    fn chunks(&self) -> &Receiver<LinkChunk>;

    /// Counters and discard generation
    fn shared(&self) -> &Arc<LinkShared>;

    /// Send one control word to the device
    fn write_control_word(&mut self, word: u8) -> Result<()>;

    /// Drop all input received so far
    fn discard_input(&mut self) -> Result<()>;

    /// Human readable description for logs
    fn describe(&self) -> String;

    /// Snapshot of the link counters
    fn stats(&self) -> LinkStats {
        self.shared().stats()
    }

    /// A byte reader over this link's chunks
    fn reader(&self) -> ChunkReader {
        ChunkReader::new(self.chunks().clone(), Arc::clone(self.shared()))
    }
}

/// Send a chunk from a producer thread
///
/// Retries while the channel is full, giving up (returning false) once the
/// receiver is gone or `running` is cleared.
pub(crate) fn forward_chunk(
    tx: &Sender<LinkChunk>,
    mut chunk: LinkChunk,
    running: &AtomicBool,
    retry: Duration,
) -> bool {
    loop {
        match tx.send_timeout(chunk, retry) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(c)) => {
                if !running.load(Ordering::SeqCst) {
                    return false;
                }
                chunk = c;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_generation_bump() {
        let shared = LinkShared::new();
        assert_eq!(shared.generation(), 0);
        assert_eq!(shared.bump_generation(), 1);
        assert_eq!(shared.stats().generation, 1);
    }

    #[test]
    fn test_counters() {
        let shared = LinkShared::new();
        shared.record_received(10);
        shared.record_received(5);
        shared.record_control_word();
        shared.record_discarded();
        let stats = shared.stats();
        assert_eq!(stats.bytes_received, 15);
        assert_eq!(stats.control_words_sent, 1);
        assert_eq!(stats.chunks_discarded, 1);
    }

    #[test]
    fn test_forward_gives_up_when_stopped() {
        let (tx, _rx) = bounded(1);
        let running = AtomicBool::new(false);
        assert!(forward_chunk(&tx, LinkChunk::Closed, &running, Duration::from_millis(5)));
        // Channel now full and the link is stopping
        assert!(!forward_chunk(&tx, LinkChunk::Closed, &running, Duration::from_millis(5)));
    }

    #[test]
    fn test_forward_detects_disconnect() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let running = AtomicBool::new(true);
        assert!(!forward_chunk(&tx, LinkChunk::Closed, &running, Duration::from_millis(5)));
    }
}
