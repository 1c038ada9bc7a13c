//! Simulated instrument
//!
//! An in-process stand-in for the microcontroller. It keeps its own
//! [`AcquisitionConfig`], adopts control words as they arrive, and emits a
//! not-ready frame followed by a ready frame once per frame interval. Each
//! channel is driven by a [`Waveform`] sampled at the config's sample period.
//!
//! With normal triggering every sweep starts at the same phase of the first
//! channel's waveform (rising or falling zero crossing). With auto
//! triggering the phase drifts from sweep to sweep.

use super::{forward_chunk, Link, LinkChunk, LinkShared, CHUNK_CHANNEL_CAPACITY};
use crate::error::{Result, ScopeError};
use crate::protocol::{decode, encode, READY_FLAG, SYNC_BYTE};
use crate::types::{
    AcquisitionConfig, RawBuffer, TriggerMode, TriggerSlope, SAMPLES_PER_CHANNEL,
};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Fraction of a period the phase moves per sweep in auto trigger mode
const AUTO_DRIFT: f64 = 0.37;

/// Signal shape of one simulated channel, in raw ADC units
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// Fixed value
    Constant(f64),
    /// Sine wave
    Sine {
        frequency_hz: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Square wave, high for the first half period
    Square {
        frequency_hz: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Triangle wave
    Triangle {
        frequency_hz: f64,
        amplitude: f64,
        offset: f64,
    },
}

impl Waveform {
    /// Period in seconds, if the waveform is periodic
    pub fn period_s(&self) -> Option<f64> {
        match *self {
            Waveform::Constant(_) => None,
            Waveform::Sine { frequency_hz, .. }
            | Waveform::Square { frequency_hz, .. }
            | Waveform::Triangle { frequency_hz, .. } => {
                (frequency_hz > 0.0).then(|| 1.0 / frequency_hz)
            }
        }
    }

    /// Value at time `t` seconds
    pub fn value_at(&self, t: f64) -> f64 {
        match *self {
            Waveform::Constant(v) => v,
            Waveform::Sine {
                frequency_hz,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * PI * frequency_hz * t).sin(),
            Waveform::Square {
                frequency_hz,
                amplitude,
                offset,
            } => {
                let phase = (frequency_hz * t).rem_euclid(1.0);
                if phase < 0.5 {
                    offset + amplitude
                } else {
                    offset - amplitude
                }
            }
            Waveform::Triangle {
                frequency_hz,
                amplitude,
                offset,
            } => {
                let phase = (frequency_hz * t).rem_euclid(1.0);
                let tri = if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                };
                offset + amplitude * tri
            }
        }
    }

    /// Sample as a raw ADC byte
    pub fn raw_at(&self, t: f64) -> u8 {
        self.value_at(t).round().clamp(0.0, 255.0) as u8
    }
}

/// Simulated instrument settings
#[derive(Debug, Clone, PartialEq)]
pub struct SimSettings {
    /// Time between ready frames
    pub frame_interval: Duration,
    /// Config the device starts with
    pub initial_config: AcquisitionConfig,
    /// One waveform per wire channel; missing channels read mid-scale
    pub waveforms: Vec<Waveform>,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(100),
            initial_config: AcquisitionConfig::default(),
            waveforms: vec![
                Waveform::Sine {
                    frequency_hz: 1_000.0,
                    amplitude: 100.0,
                    offset: 127.5,
                },
                Waveform::Square {
                    frequency_hz: 500.0,
                    amplitude: 80.0,
                    offset: 127.5,
                },
            ],
        }
    }
}

/// Produce one sweep of samples for `config`
///
/// `sweep` counts sweeps since start and only matters for auto triggering.
pub fn synthesize(config: &AcquisitionConfig, waveforms: &[Waveform], sweep: u64) -> RawBuffer {
    let dt = config.sample_period_us().unwrap_or(1.0) * 1e-6;
    let period = waveforms.first().and_then(Waveform::period_s).unwrap_or(0.0);

    let trigger_phase = match config.trigger_slope {
        TriggerSlope::Rising => 0.0,
        TriggerSlope::Falling => 0.5,
    };
    let drift = match config.trigger_mode {
        TriggerMode::Normal => 0.0,
        TriggerMode::Auto => (sweep as f64 * AUTO_DRIFT).fract(),
    };
    let t0 = (trigger_phase + drift) * period;

    let mut payload = Vec::with_capacity(config.payload_len());
    for ch in 0..usize::from(config.channel_count) {
        let wave = waveforms.get(ch).copied().unwrap_or(Waveform::Constant(127.5));
        payload.extend((0..SAMPLES_PER_CHANNEL).map(|i| wave.raw_at(t0 + i as f64 * dt)));
    }
    RawBuffer::from_payload(&payload)
}

/// Serialize a frame the way the instrument puts it on the wire
pub fn frame_bytes(config: &AcquisitionConfig, samples: Option<&RawBuffer>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(3 + config.payload_len());
    bytes.push(SYNC_BYTE);
    bytes.push(encode(config));
    match samples {
        Some(raw) => {
            bytes.push(READY_FLAG);
            for channel in raw.channels() {
                bytes.extend_from_slice(channel);
            }
        }
        None => bytes.push(0),
    }
    bytes
}

/// In-process instrument emulator
pub struct SimulatedDevice {
    chunks: Receiver<LinkChunk>,
    control: Sender<u8>,
    shared: Arc<LinkShared>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedDevice {
    /// Start the emulator thread
    pub fn start(settings: SimSettings) -> Result<Self> {
        let (chunk_tx, chunk_rx) = bounded(CHUNK_CHANNEL_CAPACITY);
        let (control_tx, control_rx) = unbounded();
        let shared = LinkShared::new();
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let shared = Arc::clone(&shared);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("simulated-device".into())
                .spawn(move || run_device(settings, chunk_tx, control_rx, shared, running))
                .map_err(|e| ScopeError::Startup(format!("Cannot spawn simulator: {}", e)))?
        };

        tracing::info!("Started simulated device");

        Ok(Self {
            chunks: chunk_rx,
            control: control_tx,
            shared,
            running,
            worker: Some(worker),
        })
    }
}

impl Link for SimulatedDevice {
    fn chunks(&self) -> &Receiver<LinkChunk> {
        &self.chunks
    }

    fn shared(&self) -> &Arc<LinkShared> {
        &self.shared
    }

    fn write_control_word(&mut self, word: u8) -> Result<()> {
        self.control
            .send(word)
            .map_err(|_| ScopeError::Link("simulated device has stopped".to_string()))?;
        self.shared.record_control_word();
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        self.shared.bump_generation();
        Ok(())
    }

    fn describe(&self) -> String {
        "simulated device".to_string()
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Simulated device thread panicked");
            }
        }
    }
}

fn run_device(
    settings: SimSettings,
    tx: Sender<LinkChunk>,
    control: Receiver<u8>,
    shared: Arc<LinkShared>,
    running: Arc<AtomicBool>,
) {
    let half = settings.frame_interval / 2;
    let mut config = settings.initial_config;
    let mut sweep = 0u64;

    let emit = |bytes: Vec<u8>| {
        shared.record_received(bytes.len());
        let chunk = LinkChunk::Data {
            generation: shared.generation(),
            bytes,
        };
        forward_chunk(&tx, chunk, &running, half.max(Duration::from_millis(1)))
    };

    'device: while running.load(Ordering::SeqCst) {
        // Acquisition in progress
        if !emit(frame_bytes(&config, None)) {
            break;
        }
        match control.recv_timeout(half) {
            Ok(word) => {
                config = decode(word);
                tracing::debug!("Simulated device retuned to {:?}", config);
                continue 'device;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let raw = synthesize(&config, &settings.waveforms, sweep);
        sweep += 1;
        if !emit(frame_bytes(&config, Some(&raw))) {
            break;
        }
        match control.recv_timeout(half) {
            Ok(word) => {
                config = decode(word);
                tracing::debug!("Simulated device retuned to {:?}", config);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!("Simulated device stopped");
}
