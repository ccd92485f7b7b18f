use std::time::Duration;

/// Decoded frame: packed RGB24, row-major, no padding.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameData {
    pub buffer: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Duration,
}

impl FrameData {
    pub fn new(buffer: Vec<u8>, width: u32, height: u32, timestamp: Duration) -> Self {
        Self { buffer, width, height, timestamp }
    }

    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// True when the buffer length matches the dimensions and neither is zero.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.buffer.len() == Self::expected_len(self.width, self.height)
    }
}
