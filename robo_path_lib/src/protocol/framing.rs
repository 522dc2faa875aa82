//! Newline-delimited framing with the 1 MiB liveness cap (§4.P).

use crate::error::CoreError;

pub const BUFFER_CAP_BYTES: usize = 1 << 20;

/// Accumulates bytes and yields complete lines (newline stripped) as they
/// appear. Exceeding the cap without a newline is fatal: `feed` returns
/// `BufferOverflow` and the buffer is cleared.
pub struct LineFramer {
    buffer: Vec<u8>,
    cap: usize,
}

impl LineFramer {
    pub fn new(cap: usize) -> Self {
        Self {
            buffer: Vec::new(),
            cap,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>, CoreError> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }

        if self.buffer.len() > self.cap {
            self.buffer.clear();
            return Err(CoreError::BufferOverflow);
        }

        Ok(lines)
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(BUFFER_CAP_BYTES)
    }
}
