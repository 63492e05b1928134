use arrayvec::ArrayVec;

/// Largest ISDU, as limited by the extended length octet.
pub(crate) const ISDU_CAPACITY: usize = 255;

/// Accumulation buffer for a segmented ISDU.
///
/// Keeps track of where the last written chunk starts, so that a
/// retransmitted segment can replace it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Buffer {
    data: ArrayVec<u8, ISDU_CAPACITY>,
    last_chunk: usize,
}

impl Buffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Start of the chunk that the next [`Buffer::replace_last`] overwrites.
    pub(crate) fn last_chunk_start(&self) -> usize {
        self.last_chunk
    }

    /// Append a chunk. Octets beyond the capacity are dropped.
    pub(crate) fn write(&mut self, bytes: &[u8]) {
        self.last_chunk = self.data.len();
        let room = self.data.remaining_capacity().min(bytes.len());
        self.data.extend(bytes[..room].iter().copied());
    }

    /// Overwrite the most recently written chunk.
    pub(crate) fn replace_last(&mut self, bytes: &[u8]) {
        self.data.truncate(self.last_chunk);
        self.write(bytes);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
        self.last_chunk = self.last_chunk.min(len);
    }
}
