//! Test data builders for frames and byte streams

use ascope_rs::protocol::{encode, READY_FLAG, SYNC_BYTE};
use ascope_rs::types::{AcquisitionConfig, RawBuffer, SAMPLES_PER_CHANNEL};

/// Builder for the wire bytes of one frame
pub struct FrameBuilder {
    config: AcquisitionConfig,
    ready: bool,
    fill: Box<dyn Fn(usize, usize) -> u8>,
}

impl FrameBuilder {
    pub fn new(config: AcquisitionConfig) -> Self {
        Self {
            config,
            ready: true,
            fill: Box::new(|_, _| 128),
        }
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Sample value for (channel, index)
    pub fn fill(mut self, fill: impl Fn(usize, usize) -> u8 + 'static) -> Self {
        self.fill = Box::new(fill);
        self
    }

    /// Samples the frame carries, if ready
    pub fn raw(&self) -> Option<RawBuffer> {
        if !self.ready {
            return None;
        }
        let channels = (0..usize::from(self.config.channel_count))
            .map(|c| (0..SAMPLES_PER_CHANNEL).map(|i| (self.fill)(c, i)).collect())
            .collect();
        RawBuffer::from_channels(channels).ok()
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut out = vec![SYNC_BYTE, encode(&self.config)];
        match self.raw() {
            Some(raw) => {
                out.push(READY_FLAG);
                for channel in raw.channels() {
                    out.extend_from_slice(channel);
                }
            }
            None => out.push(0),
        }
        out
    }
}

/// Concatenate frames into one stream
pub fn stream(frames: &[FrameBuilder]) -> Vec<u8> {
    frames.iter().flat_map(FrameBuilder::bytes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_builder_lengths() {
        let config = AcquisitionConfig::default();
        assert_eq!(FrameBuilder::new(config).bytes().len(), 3 + SAMPLES_PER_CHANNEL);
        assert_eq!(FrameBuilder::new(config).not_ready().bytes().len(), 3);
    }
}
