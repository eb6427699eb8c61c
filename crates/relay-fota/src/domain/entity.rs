use core::fmt;

use crate::{config::PartitionLayout, error::FailureReason};

/// Firmware bank of the dual-bank flash map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    User1,
    User2,
}

impl ImageSlot {
    /// The bank that is not this one
    pub fn other(self) -> Self {
        match self {
            ImageSlot::User1 => ImageSlot::User2,
            ImageSlot::User2 => ImageSlot::User1,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ImageSlot::User1 => 0,
            ImageSlot::User2 => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ImageSlot::User1),
            1 => Some(ImageSlot::User2),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageSlot::User1 => "user1",
            ImageSlot::User2 => "user2",
        }
    }

    pub fn base_sector(self, layout: &PartitionLayout) -> u32 {
        match self {
            ImageSlot::User1 => layout.user1_base_sector,
            ImageSlot::User2 => layout.user2_base_sector,
        }
    }
}

/// Boot-selector flag read by the bootloader on the next reset.
///
/// Values match the ESP8266 SDK `UPGRADE_FLAG_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpgradeFlag {
    Idle = 0,
    Started = 1,
    Finished = 2,
}

impl UpgradeFlag {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(UpgradeFlag::Idle),
            1 => Some(UpgradeFlag::Started),
            2 => Some(UpgradeFlag::Finished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Resolving,
    Connecting,
    Downloading,
    Finishing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Resolving => "resolving",
            SessionState::Connecting => "connecting",
            SessionState::Downloading => "downloading",
            SessionState::Finishing => "finishing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Entry points of the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Trigger,
    Retry,
    Resolved,
    Connected,
    Data,
    Disconnected,
    ConnectionError,
    RebootIntoUpdate,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionEvent::Trigger => "trigger",
            SessionEvent::Retry => "retry",
            SessionEvent::Resolved => "resolved",
            SessionEvent::Connected => "connected",
            SessionEvent::Data => "data",
            SessionEvent::Disconnected => "disconnected",
            SessionEvent::ConnectionError => "connection error",
            SessionEvent::RebootIntoUpdate => "reboot into update",
        };
        f.write_str(name)
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Image written, "finished" flag set, reboot requested
    Updated,
    Failed(FailureReason),
    /// Connection could not be established; the trigger may call `retry`
    RetryScheduled,
}
