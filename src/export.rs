//! Raw buffer export
//!
//! Writes the last complete acquisition to disk, either as whitespace
//! separated text (one line per sample index, one column per channel) or as a
//! JSON document carrying the acquisition config.

use crate::error::{Result, ScopeError};
use crate::types::{AcquisitionConfig, RawBuffer, SAMPLES_PER_CHANNEL};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// Read-only copy of an acquisition handed to the exporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    /// Config the samples were acquired with
    pub config: AcquisitionConfig,
    /// Raw ADC samples
    pub raw: RawBuffer,
    /// When the frame was decoded
    pub captured_at: DateTime<Local>,
}

/// On-disk dump format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DumpFormat {
    /// One line per sample index, each channel's byte followed by a space
    #[default]
    Text,
    /// Pretty-printed JSON document
    Json,
}

/// Render a snapshot in the text dump format
pub fn to_text(snapshot: &RawSnapshot) -> String {
    let channels: Vec<&[u8]> = snapshot.raw.channels().collect();
    let mut out = String::with_capacity(SAMPLES_PER_CHANNEL * channels.len() * 4);
    for n in 0..SAMPLES_PER_CHANNEL {
        for channel in &channels {
            if let Some(sample) = channel.get(n) {
                let _ = write!(out, "{} ", sample);
            }
        }
        out.push('\n');
    }
    out
}

/// Render a snapshot as JSON
pub fn to_json(snapshot: &RawSnapshot) -> Result<String> {
    serde_json::to_string_pretty(snapshot)
        .map_err(|e| ScopeError::Serialization(format!("Failed to serialize dump: {}", e)))
}

/// Write a snapshot to `path`, replacing any existing file
pub fn write_dump(path: &Path, snapshot: &RawSnapshot, format: DumpFormat) -> Result<()> {
    let content = match format {
        DumpFormat::Text => to_text(snapshot),
        DumpFormat::Json => to_json(snapshot)?,
    };
    std::fs::write(path, content).map_err(|e| {
        ScopeError::Io(e).with_context(format!("Failed to write {}", path.display()))
    })?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}
