//! In-process link
//!
//! [`ChannelLink`] carries the instrument side over crossbeam channels.
//! Whoever holds the [`ChannelLinkHandle`] plays the instrument: it pushes
//! frame bytes and reads back the control words the host wrote. Useful for
//! replaying captured streams and for driving the reactor in tests.

use super::{Link, LinkChunk, LinkShared, CHUNK_CHANNEL_CAPACITY};
use crate::error::{Result, ScopeError};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::Arc;

/// Host side of an in-process link
pub struct ChannelLink {
    chunks: Receiver<LinkChunk>,
    control: Sender<u8>,
    shared: Arc<LinkShared>,
}

/// Instrument side of a [`ChannelLink`]
pub struct ChannelLinkHandle {
    chunks: Sender<LinkChunk>,
    control: Receiver<u8>,
    shared: Arc<LinkShared>,
}

impl ChannelLink {
    /// Create a connected link and handle
    pub fn pair() -> (ChannelLink, ChannelLinkHandle) {
        let (chunk_tx, chunk_rx) = bounded(CHUNK_CHANNEL_CAPACITY);
        let (control_tx, control_rx) = unbounded();
        let shared = LinkShared::new();
        (
            ChannelLink {
                chunks: chunk_rx,
                control: control_tx,
                shared: Arc::clone(&shared),
            },
            ChannelLinkHandle {
                chunks: chunk_tx,
                control: control_rx,
                shared,
            },
        )
    }
}

impl Link for ChannelLink {
    fn chunks(&self) -> &Receiver<LinkChunk> {
        &self.chunks
    }

    fn shared(&self) -> &Arc<LinkShared> {
        &self.shared
    }

    fn write_control_word(&mut self, word: u8) -> Result<()> {
        self.control
            .send(word)
            .map_err(|_| ScopeError::Link("channel link was closed".to_string()))?;
        self.shared.record_control_word();
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        self.shared.bump_generation();
        Ok(())
    }

    fn describe(&self) -> String {
        "channel link".to_string()
    }
}

impl ChannelLinkHandle {
    /// Deliver bytes as if just read from the device
    pub fn push(&self, bytes: Vec<u8>) -> Result<()> {
        self.send(LinkChunk::Data {
            generation: self.shared.generation(),
            bytes,
        })
    }

    /// Deliver any chunk, including errors and end of stream
    pub fn send(&self, chunk: LinkChunk) -> Result<()> {
        self.chunks
            .send(chunk)
            .map_err(|_| ScopeError::Link("channel link was dropped".to_string()))
    }

    /// Control words written by the host since the last call
    pub fn written(&self) -> Vec<u8> {
        self.control.try_iter().collect()
    }

    pub fn shared(&self) -> &Arc<LinkShared> {
        &self.shared
    }
}
