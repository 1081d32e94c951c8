//! Captured frame record

use std::time::SystemTime;

/// A raw link-layer frame as handed over by a transport
#[derive(Debug, Clone)]
pub struct Frame {
    /// When the frame was received
    pub timestamp: SystemTime,
    /// Interface the frame was received on
    pub interface: String,
    /// Frame bytes, starting at the Ethernet header
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a new frame stamped with the current time
    pub fn new(interface: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            interface: interface.into(),
            data,
        }
    }

    /// Get frame data as slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get frame length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if frame is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
