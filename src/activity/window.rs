/// Bytes of recent output kept for pattern matching.
pub const OUTPUT_WINDOW_BYTES: usize = 1024;

/// Trailing slice of child output. Appends drop the oldest bytes once full.
#[derive(Debug, Clone)]
pub struct OutputWindow {
    bytes: Vec<u8>,
    capacity: usize,
}

impl Default for OutputWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputWindow {
    pub fn new() -> Self {
        Self::with_capacity(OUTPUT_WINDOW_BYTES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity.saturating_mul(2)),
            capacity,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > self.capacity {
            let excess = self.bytes.len() - self.capacity;
            self.bytes.drain(..excess);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
