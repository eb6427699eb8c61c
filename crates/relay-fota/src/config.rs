#![allow(clippy::unreadable_literal)]

/// Flash erase unit. One sector buffer is kept in RAM during a download.
pub const SECTOR_SIZE: usize = 4096;
/// Bytes requested per `GET`. A response shorter than this ends the image.
pub const CHUNK_SIZE: usize = 1024;
pub const CHUNKS_PER_SECTOR: usize = SECTOR_SIZE / CHUNK_SIZE;

const _: () = assert!(SECTOR_SIZE % CHUNK_SIZE == 0);
// Frame length prefix is a u16
const _: () = assert!(CHUNK_SIZE <= u16::MAX as usize);

/// Dual-bank flash layout, in sector indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionLayout {
    pub user1_base_sector: u32,
    pub user2_base_sector: u32,
    /// Sectors available to one image
    pub partition_sectors: u32,
    /// Used when the executing bank cannot be determined.
    ///
    /// This may point at a live bank or an unrelated region. Keep it only
    /// for compatibility with deployed bootloaders and review it per board.
    pub fallback_base_sector: u32,
}

impl PartitionLayout {
    /// Whether `sector` belongs to either image bank
    pub const fn contains(&self, sector: u32) -> bool {
        self.bank_contains(self.user1_base_sector, sector)
            || self.bank_contains(self.user2_base_sector, sector)
    }

    const fn bank_contains(&self, base: u32, sector: u32) -> bool {
        sector >= base && sector - base < self.partition_sectors
    }
}

/// What to do when the download connection cannot be established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Close the session and wait for a new trigger
    Teardown,
    /// Close the session with a scheduled retry until `max_attempts`
    /// connection attempts were made
    Reschedule { max_attempts: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FotaConfig {
    pub layout: PartitionLayout,
    pub reconnect: ReconnectPolicy,
}

pub struct StatusConfig {
    pub interval_ms: u32,
}

pub struct FirmwareConfig {
    pub version: &'static str,
}

/// 1 MiB flash, 512 KiB + 512 KiB map: user1 at 0x01000, user2 at 0x81000.
pub const PARTITIONS: PartitionLayout = PartitionLayout {
    user1_base_sector: 0x001,
    user2_base_sector: 0x081,
    partition_sectors: 0x07B,
    fallback_base_sector: 0x001,
};

/// Sector holding the persistent boot record, in the user-data gap after
/// user1 (0x07C..0x080)
pub const BOOT_RECORD_SECTOR: u32 = 0x07C;

// An image download must never erase the boot record
const _: () = assert!(!PARTITIONS.contains(BOOT_RECORD_SECTOR));

/// One retry on connection failure
pub const FOTA: FotaConfig = FotaConfig {
    layout: PARTITIONS,
    reconnect: ReconnectPolicy::Reschedule { max_attempts: 2 },
};

pub const STATUS: StatusConfig = StatusConfig { interval_ms: 3000 };

pub const FIRMWARE: FirmwareConfig = FirmwareConfig {
    version: env!("CARGO_PKG_VERSION"),
};

impl Default for FotaConfig {
    fn default() -> Self {
        FOTA
    }
}
