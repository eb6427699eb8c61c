use core::fmt::Write as _;

use heapless::String;

use crate::{
    config::{PartitionLayout, SECTOR_SIZE, STATUS},
    domain::entity::ImageSlot,
};

pub const MAX_STATUS_LEN: usize = 96;
/// Longer versions are cut to this many bytes
pub const MAX_VERSION_LEN: usize = 32;

// Eight hex digits of address, longest slot name and remote state
const _: () = assert!(
    "Image: user1:0x".len() + 8 + ", Version: ".len() + MAX_VERSION_LEN + ", Remote: OFF".len()
        <= MAX_STATUS_LEN
);

/// Periodic status line, e.g.
/// `Image: user1:0x01000, Version: 0.3.0, Remote: ON`.
#[allow(clippy::cast_possible_truncation)]
pub fn format_status(
    executing: Option<ImageSlot>,
    layout: &PartitionLayout,
    version: &str,
    remote_on: bool,
) -> String<MAX_STATUS_LEN> {
    let mut end = version.len().min(MAX_VERSION_LEN);
    while !version.is_char_boundary(end) {
        end -= 1;
    }
    let version = &version[..end];
    let remote = if remote_on { "ON" } else { "OFF" };

    let mut status = String::new();
    let written = match executing {
        Some(slot) => write!(
            status,
            "Image: {}:0x{:05X}",
            slot.name(),
            slot.base_sector(layout).saturating_mul(SECTOR_SIZE as u32)
        ),
        None => status.write_str("Image: unknown"),
    }
    .and_then(|()| write!(status, ", Version: {}, Remote: {}", version, remote));
    debug_assert!(written.is_ok(), "status exceeds MAX_STATUS_LEN");
    status
}

/// Decides when the next status line is due.
///
/// Paused while a download runs so the control-plane link is left to the
/// session.
pub struct StatusTimer {
    interval_ms: u32,
    last_ms: Option<u32>,
    paused: bool,
}

impl StatusTimer {
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_ms: None,
            paused: false,
        }
    }

    /// Whether a report is due at `now_ms`. Marks it as sent if so.
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if self.paused {
            return false;
        }
        let due = self
            .last_ms
            .is_none_or(|last| now_ms.wrapping_sub(last) >= self.interval_ms);
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
        self.last_ms = None;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl Default for StatusTimer {
    fn default() -> Self {
        Self::new(STATUS.interval_ms)
    }
}
