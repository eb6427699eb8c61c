use core::fmt;

use embedded_io::ErrorKind;
use embedded_storage::nor_flash::NorFlashErrorKind;
use relay_core::{net::EndpointError, storage::StorageError};

use crate::domain::entity::{SessionEvent, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    Erase(NorFlashErrorKind),
    Write(NorFlashErrorKind),
    WriteProtect,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashError::Erase(kind) => write!(f, "sector erase failed: {:?}", kind),
            FlashError::Write(kind) => write!(f, "sector write failed: {:?}", kind),
            FlashError::WriteProtect => write!(f, "cannot disable write protection"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame declares more payload than one chunk
    Oversized { declared: usize },
    /// More bytes received than one frame can hold
    Overrun,
    /// Bytes after a complete frame while no request was outstanding
    TrailingData { extra: usize },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Oversized { declared } => {
                write!(f, "frame length {} exceeds chunk size", declared)
            }
            ProtocolError::Overrun => write!(f, "frame buffer overrun"),
            ProtocolError::TrailingData { extra } => {
                write!(f, "{} unexpected bytes after frame", extra)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Chunk would land outside the sector
    OutOfBounds { start: usize, len: usize },
    /// Sector is complete and must be flushed first
    FlushPending,
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::OutOfBounds { start, len } => {
                write!(f, "chunk at {} (+{}) outside sector", start, len)
            }
            BufferError::FlushPending => write!(f, "sector not flushed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    Resolve,
    Connect,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Resolve => write!(f, "name resolution failed"),
            NetworkError::Connect => write!(f, "connect failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    Storage(StorageError),
}

impl From<StorageError> for BootError {
    fn from(err: StorageError) -> Self {
        BootError::Storage(err)
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::Storage(err) => write!(f, "boot record: {}", err),
        }
    }
}

/// Why a session ended without an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Resolve,
    Connect,
    Flash(FlashError),
    Protocol(ProtocolError),
    Buffer(BufferError),
    Transport(ErrorKind),
    BootFlag,
    /// Image does not fit into the target partition
    ImageTooLarge,
    /// Peer closed before the final chunk
    PrematureDisconnect,
}

impl From<FlashError> for FailureReason {
    fn from(err: FlashError) -> Self {
        FailureReason::Flash(err)
    }
}

impl From<ProtocolError> for FailureReason {
    fn from(err: ProtocolError) -> Self {
        FailureReason::Protocol(err)
    }
}

impl From<BufferError> for FailureReason {
    fn from(err: BufferError) -> Self {
        FailureReason::Buffer(err)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Resolve => write!(f, "host not resolved"),
            FailureReason::Connect => write!(f, "connection failed"),
            FailureReason::Flash(err) => write!(f, "flash: {}", err),
            FailureReason::Protocol(err) => write!(f, "protocol: {}", err),
            FailureReason::Buffer(err) => write!(f, "buffer: {}", err),
            FailureReason::Transport(kind) => write!(f, "send failed: {:?}", kind),
            FailureReason::BootFlag => write!(f, "cannot persist boot flag"),
            FailureReason::ImageTooLarge => write!(f, "image larger than partition"),
            FailureReason::PrematureDisconnect => write!(f, "disconnected before last chunk"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Event not accepted in the current state; nothing changed
    InvalidTransition {
        state: SessionState,
        event: SessionEvent,
    },
    InvalidTarget(EndpointError),
    /// Session was aborted while handling the event
    Aborted(FailureReason),
}

impl From<EndpointError> for SessionError {
    fn from(err: EndpointError) -> Self {
        SessionError::InvalidTarget(err)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidTransition { state, event } => {
                write!(f, "{} not allowed while {}", event, state)
            }
            SessionError::InvalidTarget(err) => write!(f, "invalid target: {}", err),
            SessionError::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}
