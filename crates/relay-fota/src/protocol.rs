//! Chunk download protocol.
//!
//! Request: ASCII `GET 0x<offset>:0x<length>;\n`, both six uppercase hex
//! digits. Response: little-endian `u16` payload length followed by the
//! payload. A payload shorter than [`CHUNK_SIZE`] ends the image.

use core::fmt::Write as _;

use heapless::{String, Vec};

use crate::{config::CHUNK_SIZE, error::ProtocolError};

pub const FRAME_HEADER_SIZE: usize = 2;
pub const MAX_FRAME_SIZE: usize = FRAME_HEADER_SIZE + CHUNK_SIZE;
/// `GET 0xFFFFFFFF:0xFFFFFFFF;\n` plus headroom
pub const MAX_REQUEST_LEN: usize = 32;

// Both fields at eight hex digits
const _: () = assert!("GET 0x:0x;\n".len() + 2 * 8 <= MAX_REQUEST_LEN);

/// Build the request for `length` bytes at `offset`.
pub fn encode_request(offset: u32, length: u32) -> String<MAX_REQUEST_LEN> {
    let mut request = String::new();
    let written = writeln!(request, "GET 0x{:06X}:0x{:06X};", offset, length);
    debug_assert!(written.is_ok(), "request exceeds MAX_REQUEST_LEN");
    request
}

/// Byte offset of chunk `index` in the image
#[allow(clippy::cast_possible_truncation)]
pub fn chunk_offset(index: u32) -> u32 {
    index.saturating_mul(CHUNK_SIZE as u32)
}

/// Decoded response payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    payload: &'a [u8],
}

impl<'a> Chunk<'a> {
    pub fn new(payload: &'a [u8]) -> Result<Self, ProtocolError> {
        if payload.len() > CHUNK_SIZE {
            return Err(ProtocolError::Oversized {
                declared: payload.len(),
            });
        }
        Ok(Self { payload })
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Short chunk, the end-of-stream marker
    pub fn is_last(&self) -> bool {
        self.payload.len() < CHUNK_SIZE
    }

    /// Size on the wire including the length prefix
    pub fn frame_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }
}

/// Decode one frame from the start of `bytes`.
///
/// Returns `Ok(None)` while the header or payload is incomplete. Bytes past
/// the frame are left to the caller.
pub fn decode_frame(bytes: &[u8]) -> Result<Option<Chunk<'_>>, ProtocolError> {
    let Some(header) = bytes.get(..FRAME_HEADER_SIZE) else {
        return Ok(None);
    };
    let declared = usize::from(u16::from_le_bytes([header[0], header[1]]));
    if declared > CHUNK_SIZE {
        return Err(ProtocolError::Oversized { declared });
    }

    match bytes.get(FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + declared) {
        Some(payload) => Chunk::new(payload).map(Some),
        None => Ok(None),
    }
}

/// Reassembles one response frame from transport segments.
pub struct FrameReader {
    buffer: Vec<u8, MAX_FRAME_SIZE>,
}

impl FrameReader {
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.buffer
            .extend_from_slice(bytes)
            .map_err(|()| ProtocolError::Overrun)
    }

    /// The buffered frame once complete.
    ///
    /// Only one response can be outstanding, so bytes beyond the first
    /// frame are an error.
    pub fn frame(&self) -> Result<Option<Chunk<'_>>, ProtocolError> {
        let Some(chunk) = decode_frame(&self.buffer)? else {
            return Ok(None);
        };
        let extra = self.buffer.len() - chunk.frame_len();
        if extra > 0 {
            return Err(ProtocolError::TrailingData { extra });
        }
        Ok(Some(chunk))
    }

    /// Bytes buffered for the current frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}
