//! Byte reader over a link's chunk channel
//!
//! [`ChunkReader`] turns [`LinkChunk`]s back into a `std::io::Read` byte
//! stream for the frame decoder. Reads block until data arrives or the
//! optional deadline passes, in which case `ErrorKind::TimedOut` is returned.

use super::{LinkChunk, LinkShared};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::sync::Arc;
use std::time::Instant;

/// `std::io::Read` adapter over a chunk channel
#[derive(Debug)]
pub struct ChunkReader {
    rx: Receiver<LinkChunk>,
    shared: Arc<LinkShared>,
    pending: VecDeque<u8>,
    pending_generation: u64,
    deadline: Option<Instant>,
    error: Option<String>,
    closed: bool,
}

impl ChunkReader {
    pub fn new(rx: Receiver<LinkChunk>, shared: Arc<LinkShared>) -> Self {
        let pending_generation = shared.generation();
        Self {
            rx,
            shared,
            pending: VecDeque::new(),
            pending_generation,
            deadline: None,
            error: None,
            closed: false,
        }
    }

    /// Limit blocking reads to `deadline`; `None` blocks indefinitely
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Bytes buffered and not yet read
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Whether a read would return without blocking
    ///
    /// True when bytes are buffered, or the link has reported an error or
    /// closed (reads then fail or return end of stream).
    pub fn has_pending(&mut self) -> bool {
        self.drop_stale();
        while self.pending.is_empty() && !self.at_end() {
            match self.rx.try_recv() {
                Ok(chunk) => self.accept(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.closed = true,
            }
        }
        !self.pending.is_empty() || self.at_end()
    }

    /// Drop buffered bytes and every queued chunk
    pub fn clear(&mut self) {
        self.pending.clear();
        while let Ok(chunk) = self.rx.try_recv() {
            if !matches!(chunk, LinkChunk::Data { .. }) {
                self.accept(chunk);
            }
        }
    }

    fn at_end(&self) -> bool {
        self.closed || self.error.is_some()
    }

    fn drop_stale(&mut self) {
        if !self.pending.is_empty() && self.pending_generation < self.shared.generation() {
            tracing::trace!("Dropping {} bytes received before discard", self.pending.len());
            self.pending.clear();
        }
    }

    fn accept(&mut self, chunk: LinkChunk) {
        match chunk {
            LinkChunk::Data { generation, bytes } => {
                if generation < self.shared.generation() {
                    self.shared.record_discarded();
                    return;
                }
                self.pending_generation = generation;
                self.pending.extend(bytes);
            }
            LinkChunk::Error(message) => self.error = Some(message),
            LinkChunk::Closed => self.closed = true,
        }
    }

    /// Block for the next chunk, honouring the deadline
    fn wait(&mut self) -> io::Result<()> {
        let chunk = match self.deadline {
            Some(deadline) => match self.rx.recv_deadline(deadline) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(ErrorKind::TimedOut, "frame deadline expired"));
                }
                Err(RecvTimeoutError::Disconnected) => LinkChunk::Closed,
            },
            None => self.rx.recv().unwrap_or(LinkChunk::Closed),
        };
        self.accept(chunk);
        Ok(())
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.drop_stale();
        while self.pending.is_empty() {
            if let Some(message) = &self.error {
                return Err(io::Error::new(ErrorKind::BrokenPipe, message.clone()));
            }
            if self.closed {
                return Ok(0);
            }
            self.wait()?;
        }

        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::time::Duration;

    fn reader() -> (crossbeam_channel::Sender<LinkChunk>, ChunkReader, Arc<LinkShared>) {
        let (tx, rx) = bounded(16);
        let shared = LinkShared::new();
        (tx, ChunkReader::new(rx, shared.clone()), shared)
    }

    fn data(generation: u64, bytes: &[u8]) -> LinkChunk {
        LinkChunk::Data {
            generation,
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_reads_across_chunks() {
        let (tx, mut reader, _) = reader();
        tx.send(data(0, &[1, 2])).unwrap();
        tx.send(data(0, &[3])).unwrap();

        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn test_has_pending() {
        let (tx, mut reader, _) = reader();
        assert!(!reader.has_pending());
        tx.send(data(0, &[9])).unwrap();
        assert!(reader.has_pending());
        assert_eq!(reader.buffered(), 1);
    }

    #[test]
    fn test_deadline_times_out() {
        let (_tx, mut reader, _) = reader();
        reader.set_deadline(Some(Instant::now() + Duration::from_millis(20)));
        let err = reader.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn test_stale_chunks_are_discarded() {
        let (tx, mut reader, shared) = reader();
        tx.send(data(0, &[1, 2, 3])).unwrap();
        assert!(reader.has_pending());

        shared.bump_generation();
        tx.send(data(0, &[4])).unwrap();
        tx.send(data(1, &[5])).unwrap();

        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [5]);
        assert_eq!(shared.stats().chunks_discarded, 1);
    }

    #[test]
    fn test_closed_link_reads_end_of_stream() {
        let (tx, mut reader, _) = reader();
        tx.send(data(0, &[7])).unwrap();
        tx.send(LinkChunk::Closed).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert!(reader.has_pending());
    }

    #[test]
    fn test_dropped_sender_reads_end_of_stream() {
        let (tx, mut reader, _) = reader();
        drop(tx);
        assert!(reader.has_pending());
        assert_eq!(reader.read(&mut [0u8; 1]).unwrap(), 0);
    }

    #[test]
    fn test_transport_error_surfaces() {
        let (tx, mut reader, _) = reader();
        tx.send(LinkChunk::Error("device unplugged".into())).unwrap();
        let err = reader.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
        assert!(err.to_string().contains("unplugged"));
    }

    #[test]
    fn test_clear_drops_everything_queued() {
        let (tx, mut reader, _) = reader();
        tx.send(data(0, &[1, 2])).unwrap();
        assert!(reader.has_pending());
        tx.send(data(0, &[3])).unwrap();
        reader.clear();
        assert!(!reader.has_pending());
    }
}
