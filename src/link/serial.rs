//! Serial port link
//!
//! The port is opened 8N1 without flow control. A cloned handle is moved into
//! a pump thread that performs blocking reads with a short timeout and forwards
//! whatever arrives as [`LinkChunk`]s. Control words are written through the
//! original handle from the reactor thread.

use super::{forward_chunk, Link, LinkChunk, LinkShared, CHUNK_CHANNEL_CAPACITY};
use crate::config::LinkConfig;
use crate::error::{Result, ScopeError};
use crossbeam_channel::{bounded, Receiver, Sender};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Size of a single pump read
const READ_CHUNK: usize = 512;

/// Instrument attached to a serial port
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    chunks: Receiver<LinkChunk>,
    shared: Arc<LinkShared>,
    running: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
    device: String,
    baud_rate: u32,
}

impl SerialLink {
    /// Open the port and start the pump thread
    ///
    /// Fails with [`ScopeError::Startup`] when the port cannot be opened.
    pub fn open(config: &LinkConfig) -> Result<Self> {
        let read_timeout = Duration::from_millis(config.read_timeout_ms.max(1));
        let port = serialport::new(&config.device, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()
            .map_err(|e| {
                ScopeError::Startup(format!("Cannot open device {}: {}", config.device, e))
            })?;

        // Anything received before the line settings took effect is garbage
        port.clear(ClearBuffer::Input)
            .map_err(|e| ScopeError::Startup(format!("Cannot flush {}: {}", config.device, e)))?;

        let reader = port.try_clone().map_err(|e| {
            ScopeError::Startup(format!("Cannot clone handle for {}: {}", config.device, e))
        })?;

        let (tx, rx) = bounded(CHUNK_CHANNEL_CAPACITY);
        let shared = LinkShared::new();
        let running = Arc::new(AtomicBool::new(true));

        let pump = {
            let shared = Arc::clone(&shared);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("serial-pump".into())
                .spawn(move || pump(reader, tx, shared, running, read_timeout))
                .map_err(|e| ScopeError::Startup(format!("Cannot spawn pump thread: {}", e)))?
        };

        tracing::info!(
            "Opened {} at {} baud (8N1, read slice {:?})",
            config.device,
            config.baud_rate,
            read_timeout
        );

        Ok(Self {
            port,
            chunks: rx,
            shared,
            running,
            pump: Some(pump),
            device: config.device.clone(),
            baud_rate: config.baud_rate,
        })
    }
}

impl Link for SerialLink {
    fn chunks(&self) -> &Receiver<LinkChunk> {
        &self.chunks
    }

    fn shared(&self) -> &Arc<LinkShared> {
        &self.shared
    }

    fn write_control_word(&mut self, word: u8) -> Result<()> {
        self.port
            .write_all(&[word])
            .and_then(|()| self.port.flush())
            .map_err(|e| ScopeError::Link(format!("Failed to send control word: {}", e)))?;
        self.shared.record_control_word();
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        let generation = self.shared.bump_generation();
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| ScopeError::Link(format!("Failed to flush input: {}", e)))?;
        tracing::debug!("Discarded input, generation {}", generation);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.device, self.baud_rate)
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(pump) = self.pump.take() {
            if pump.join().is_err() {
                tracing::error!("Serial pump thread panicked");
            }
        }
    }
}

/// Forward port input to the chunk channel until stopped or the port fails
fn pump(
    mut port: Box<dyn SerialPort>,
    tx: Sender<LinkChunk>,
    shared: Arc<LinkShared>,
    running: Arc<AtomicBool>,
    read_timeout: Duration,
) {
    let mut buf = [0u8; READ_CHUNK];
    while running.load(Ordering::SeqCst) {
        let generation = shared.generation();
        let chunk = match port.read(&mut buf) {
            Ok(0) => LinkChunk::Closed,
            Ok(n) => {
                shared.record_received(n);
                LinkChunk::Data {
                    generation,
                    bytes: buf[..n].to_vec(),
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                continue;
            }
            Err(e) => LinkChunk::Error(e.to_string()),
        };

        let last = !matches!(chunk, LinkChunk::Data { .. });
        if !forward_chunk(&tx, chunk, &running, read_timeout) || last {
            break;
        }
    }
    tracing::debug!("Serial pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_is_startup_error() {
        let config = LinkConfig {
            device: "/dev/ascope-does-not-exist".into(),
            ..LinkConfig::default()
        };
        let err = SerialLink::open(&config).err().unwrap();
        assert!(matches!(err, ScopeError::Startup(_)));
        assert_eq!(err.exit_code(), crate::error::EXIT_STARTUP);
    }
}
