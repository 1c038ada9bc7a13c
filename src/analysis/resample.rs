//! Resampling engine
//!
//! Zooming magnifies the leading `N / z` samples of the acquisition so they
//! fill all `N` display points. The gaps between samples are filled either by
//! straight lines or by band-limited reconstruction:
//!
//! ```text
//! out[k·z + l] = s[0] + Σ_m (s[m] − s[0]) · sinc(π·(k + l/z − m))
//! ```
//!
//! Every sinc output point weighs the whole buffer, so the weights for each
//! zoom power are computed once into a [`SincKernelTable`] and shared by all
//! frames. Subtracting `s[0]` before the sum centres the finite, non-periodic
//! record around a baseline; without it the truncated kernel drags points far
//! from dense support towards zero.

use crate::types::{Interpolation, VoltageBuffer, ZoomState, MAX_ZOOM_POWER, SAMPLES_PER_CHANNEL};
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Instant;

/// Below this magnitude `sinc(x)` is taken to be exactly one
const SINC_EPSILON: f64 = 0.001;

/// Cardinal sine, `sin(x) / x`, with the singularity at zero removed
pub fn sinc(x: f64) -> f64 {
    if x.abs() > SINC_EPSILON {
        x.sin() / x
    } else {
        1.0
    }
}

/// Precomputed reconstruction weights for every zoom power
///
/// For power `p` the table is an `N × N` matrix stored row-major: row
/// `k·z + l` holds the weights of every original sample `m` for that output
/// point.
#[derive(Debug)]
pub struct SincKernelTable {
    tables: Vec<Vec<f64>>,
}

impl SincKernelTable {
    /// Compute the tables for powers `0..=max_power`
    ///
    /// This is O(max_power · N²) and is meant to run once at startup.
    pub fn build(max_power: u8) -> Self {
        let started = Instant::now();
        let max_power = max_power.min(MAX_ZOOM_POWER);
        let n = SAMPLES_PER_CHANNEL;

        let tables = (0..=max_power)
            .map(|p| {
                let z = 1usize << p;
                let mut table = Vec::with_capacity(n * n);
                for k in 0..n / z {
                    for l in 0..z {
                        let t = k as f64 + l as f64 / z as f64;
                        table.extend((0..n).map(|m| sinc(PI * (t - m as f64))));
                    }
                }
                table
            })
            .collect();

        tracing::info!(
            "Built sinc kernels for zoom powers 0..={} in {:?}",
            max_power,
            started.elapsed()
        );

        Self { tables }
    }

    /// Highest zoom power covered
    pub fn max_power(&self) -> u8 {
        (self.tables.len() - 1) as u8
    }

    /// The `N × N` table for one zoom power
    pub fn table(&self, power: u8) -> Option<&[f64]> {
        self.tables.get(usize::from(power)).map(Vec::as_slice)
    }
}

/// Linearly interpolate the leading `N / z` samples into `N` points
///
/// `samples` must hold [`SAMPLES_PER_CHANNEL`] values; `z` must be a power of
/// two no larger than that.
pub fn interpolate_linear(z: usize, samples: &[f64]) -> Vec<f64> {
    let n = samples.len();
    let mut out = Vec::with_capacity(n);
    for k in 0..n / z {
        let base = samples[k];
        // Interpolated points need z > 1, where k + 1 <= N / z < N
        let next = samples.get(k + 1).copied().unwrap_or(base);
        out.push(base);
        for l in 1..z {
            let t = l as f64 / z as f64;
            out.push(base + (next - base) * t);
        }
    }
    out
}

/// Band-limited interpolation of the leading `N / z` samples into `N` points
///
/// `kernel` is the table for the zoom power matching `z`.
pub fn interpolate_sinc(z: usize, kernel: &[f64], samples: &[f64]) -> Vec<f64> {
    let n = samples.len();
    let baseline = samples[0];
    kernel
        .chunks_exact(n)
        .take((n / z) * z)
        .map(|weights| {
            let sum: f64 = samples
                .iter()
                .zip(weights)
                .map(|(&s, &w)| (s - baseline) * w)
                .sum();
            sum + baseline
        })
        .collect()
}

/// Applies the selected reconstruction to whole voltage buffers
#[derive(Debug, Clone)]
pub struct Resampler {
    kernels: Arc<SincKernelTable>,
}

impl Resampler {
    /// Create a resampler sharing an already built kernel table
    pub fn new(kernels: Arc<SincKernelTable>) -> Self {
        Self { kernels }
    }

    /// Build the kernel table for every zoom power and wrap it
    pub fn with_default_kernels() -> Self {
        Self::new(Arc::new(SincKernelTable::build(MAX_ZOOM_POWER)))
    }

    /// The shared kernel table
    pub fn kernels(&self) -> &Arc<SincKernelTable> {
        &self.kernels
    }

    /// Resample every channel for display
    pub fn resample(&self, voltages: &VoltageBuffer, zoom: &ZoomState) -> VoltageBuffer {
        let z = zoom.factor();
        let channels = voltages
            .channels()
            .map(|samples| {
                if z == 1 {
                    return samples.to_vec();
                }
                match (zoom.interpolation, self.kernels.table(zoom.power())) {
                    (Interpolation::Sinc, Some(kernel)) => interpolate_sinc(z, kernel, samples),
                    _ => interpolate_linear(z, samples),
                }
            })
            .collect();
        VoltageBuffer::from_channels(channels)
    }
}
