//! Instrument link protocol
//!
//! The device streams frames to the host and the host answers with single
//! control-word bytes:
//!
//! ```text
//! [0x00 sync] [control word] [ready flag]
//!   if ready flag == 1:
//!     channel_count × N sample bytes, channel-major
//! ```
//!
//! - [`control_word`] - Bit-exact codec between [`AcquisitionConfig`](crate::types::AcquisitionConfig) and one byte
//! - [`decoder`] - Resynchronizing frame decoder over any `std::io::Read`

pub mod control_word;
pub mod decoder;

pub use control_word::{decode, encode};
pub use decoder::{DecoderStats, FrameDecoder};

/// Byte that starts every frame
pub const SYNC_BYTE: u8 = 0x00;

/// Ready flag value announcing a sample payload
pub const READY_FLAG: u8 = 0x01;
