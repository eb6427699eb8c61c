use bytemuck::{Pod, Zeroable};
use embedded_storage::nor_flash::NorFlash;
use relay_core::storage::{
    Encodable, MAGIC_HEADER_SIZE, NorFlashStorageDriver, PersistentStorage, StorageError,
};

use crate::{
    domain::{
        entity::{ImageSlot, UpgradeFlag},
        ports::BootControl,
    },
    error::BootError,
};

const BOOT_RECORD_SIZE: usize = 6;
const STORAGE_SIZE: usize = BOOT_RECORD_SIZE + MAGIC_HEADER_SIZE;
const SLOT_UNKNOWN: u8 = 0xFF;

/// Boot selector state shared with the bootloader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootRecord {
    pub executing: Option<ImageSlot>,
    pub upgrade_flag: UpgradeFlag,
}

impl Default for BootRecord {
    fn default() -> Self {
        Self {
            executing: None,
            upgrade_flag: UpgradeFlag::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, Zeroable, Pod)]
#[repr(C)]
struct PersistentBootRecord {
    executing: u8,
    upgrade_flag: u8,
    _reserved: [u8; 4],
}

impl From<BootRecord> for PersistentBootRecord {
    fn from(record: BootRecord) -> Self {
        Self {
            executing: record.executing.map_or(SLOT_UNKNOWN, ImageSlot::as_u8),
            upgrade_flag: record.upgrade_flag.as_u8(),
            _reserved: [0; 4],
        }
    }
}

impl Encodable<BOOT_RECORD_SIZE> for BootRecord {
    fn encode(&self) -> [u8; BOOT_RECORD_SIZE] {
        bytemuck::cast(PersistentBootRecord::from(*self))
    }

    fn decode(data: &[u8]) -> Option<Self> {
        let raw: PersistentBootRecord =
            bytemuck::try_pod_read_unaligned(data.get(..BOOT_RECORD_SIZE)?).ok()?;
        let executing = match raw.executing {
            SLOT_UNKNOWN => None,
            value => Some(ImageSlot::from_u8(value)?),
        };
        Some(Self {
            executing,
            upgrade_flag: UpgradeFlag::from_u8(raw.upgrade_flag)?,
        })
    }
}

/// Resets the chip
pub trait Restart {
    fn restart(&mut self);
}

pub type BootStorage<F> = PersistentStorage<NorFlashStorageDriver<F, STORAGE_SIZE>, STORAGE_SIZE>;

/// [`BootControl`] over a boot record kept in its own flash sector.
pub struct BootManager<F: NorFlash, R> {
    storage: BootStorage<F>,
    restart: R,
}

impl<F: NorFlash, R: Restart> BootManager<F, R> {
    /// `addr` must be the start of an erase block used for nothing else.
    pub fn new(flash: F, addr: u32, restart: R) -> Self {
        Self {
            storage: PersistentStorage::new(NorFlashStorageDriver::new(flash, addr)),
            restart,
        }
    }

    /// Stored record. Missing or corrupt records read as `None`.
    pub fn record(&mut self) -> Option<BootRecord> {
        match self.storage.load::<BOOT_RECORD_SIZE, BootRecord>() {
            Ok(record) => Some(record),
            Err(StorageError::InvalidMagicHeader) => None,
            Err(err) => {
                log::warn!("boot: cannot read boot record: {}", err);
                None
            }
        }
    }

    /// Record the bank the running image was started from.
    pub fn set_executing_slot(&mut self, slot: ImageSlot) -> Result<(), BootError> {
        let record = BootRecord {
            executing: Some(slot),
            ..self.record().unwrap_or_default()
        };
        self.save(record)
    }

    pub fn upgrade_flag(&mut self) -> UpgradeFlag {
        self.record()
            .map_or(UpgradeFlag::Idle, |record| record.upgrade_flag)
    }

    pub fn into_inner(self) -> (F, R) {
        (self.storage.into_driver().into_inner(), self.restart)
    }

    fn save(&mut self, record: BootRecord) -> Result<(), BootError> {
        self.storage
            .save::<BOOT_RECORD_SIZE, BootRecord>(&record)
            .map_err(BootError::from)
    }
}

impl<F: NorFlash, R: Restart> BootControl for BootManager<F, R> {
    fn executing_slot(&mut self) -> Option<ImageSlot> {
        self.record().and_then(|record| record.executing)
    }

    fn set_upgrade_flag(&mut self, flag: UpgradeFlag) -> Result<(), BootError> {
        let record = BootRecord {
            upgrade_flag: flag,
            ..self.record().unwrap_or_default()
        };
        self.save(record)?;
        log::debug!("boot: upgrade flag set to {:?}", flag);
        Ok(())
    }

    fn reboot(&mut self) {
        self.restart.restart();
    }
}
