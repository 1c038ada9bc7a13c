//! Analysis module for signal reconstruction
//!
//! This module provides the resampling engine that turns a raw acquisition
//! into a fixed-length display buffer:
//! - Cardinal-sine kernel tables, precomputed once at startup
//! - Linear and band-limited (sinc) interpolation
//! - Leading-window time zoom

pub mod resample;

pub use resample::{interpolate_linear, interpolate_sinc, sinc, Resampler, SincKernelTable};
