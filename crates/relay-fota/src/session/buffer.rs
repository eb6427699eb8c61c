use crate::{
    config::{CHUNK_SIZE, CHUNKS_PER_SECTOR, SECTOR_SIZE},
    error::BufferError,
    protocol::Chunk,
};

/// Result of appending a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorFill {
    /// Room left in the sector
    Partial,
    /// Last slot filled by a full chunk; flush before the next append
    Full,
    /// Short chunk appended; flush (if not empty) and stop
    FullAndLast,
}

/// One erase sector worth of image data, filled chunk by chunk.
///
/// Chunk `n` lands in slot `n % CHUNKS_PER_SECTOR`. Bytes past the last
/// valid byte stay zero.
pub struct SectorBuffer {
    data: [u8; SECTOR_SIZE],
    chunk_index: u32,
    filled: usize,
    flush_pending: bool,
}

impl SectorBuffer {
    pub const fn new() -> Self {
        Self {
            data: [0; SECTOR_SIZE],
            chunk_index: 0,
            filled: 0,
            flush_pending: false,
        }
    }

    pub fn append(&mut self, chunk: &Chunk<'_>) -> Result<SectorFill, BufferError> {
        if self.flush_pending {
            return Err(BufferError::FlushPending);
        }

        let start = self.slot() * CHUNK_SIZE;
        let len = chunk.len();
        let target = self
            .data
            .get_mut(start..start + len)
            .ok_or(BufferError::OutOfBounds { start, len })?;
        target.copy_from_slice(chunk.payload());

        self.filled = start + len;
        self.chunk_index += 1;

        let fill = if chunk.is_last() {
            SectorFill::FullAndLast
        } else if self.slot() == 0 {
            SectorFill::Full
        } else {
            SectorFill::Partial
        };
        self.flush_pending = fill != SectorFill::Partial;
        Ok(fill)
    }

    /// Slot the next chunk goes into
    #[allow(clippy::cast_possible_truncation)]
    pub fn slot(&self) -> usize {
        self.chunk_index as usize % CHUNKS_PER_SECTOR
    }

    /// Chunks appended since the session started
    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }

    /// Valid bytes in the current sector
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn sector(&self) -> &[u8; SECTOR_SIZE] {
        &self.data
    }

    /// Zero the sector after it was flushed; the chunk index keeps counting.
    pub fn reset(&mut self) {
        self.data.fill(0);
        self.filled = 0;
        self.flush_pending = false;
    }

    /// Start over from chunk zero
    pub fn restart(&mut self) {
        self.reset();
        self.chunk_index = 0;
    }
}

impl Default for SectorBuffer {
    fn default() -> Self {
        Self::new()
    }
}
