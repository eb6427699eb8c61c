use core::fmt;

use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind};

const MAGIC_HEADER: u16 = 0xBEEF;
pub const MAGIC_HEADER_SIZE: usize = MAGIC_HEADER.to_le_bytes().len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying flash driver failed
    Driver(NorFlashErrorKind),
    InvalidMagicHeader,
    InvalidData,
    /// Encoded record plus header does not fit into the storage area
    TooLarge,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Driver(kind) => write!(f, "storage driver error: {:?}", kind),
            StorageError::InvalidMagicHeader => write!(f, "invalid magic header"),
            StorageError::InvalidData => write!(f, "invalid stored data"),
            StorageError::TooLarge => write!(f, "record does not fit storage area"),
        }
    }
}

pub trait Encodable<const SIZE: usize>
where
    Self: Sized,
{
    fn encode(&self) -> [u8; SIZE];
    fn decode(data: &[u8]) -> Option<Self>;
}

pub trait StorageDriver<const STORAGE_SIZE: usize> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), StorageError>;
    fn write(&mut self, buffer: &[u8]) -> Result<(), StorageError>;
}

/// Persistent storage implementation using a storage driver.
pub struct PersistentStorage<DRIVER: StorageDriver<STORAGE_SIZE>, const STORAGE_SIZE: usize> {
    driver: DRIVER,
}

impl<DRIVER: StorageDriver<STORAGE_SIZE>, const STORAGE_SIZE: usize>
    PersistentStorage<DRIVER, STORAGE_SIZE>
{
    pub fn new(driver: DRIVER) -> Self {
        Self { driver }
    }

    /// Load a record, checking the magic header first
    pub fn load<const SIZE: usize, T: Encodable<SIZE>>(&mut self) -> Result<T, StorageError> {
        if SIZE + MAGIC_HEADER_SIZE > STORAGE_SIZE {
            return Err(StorageError::TooLarge);
        }

        let mut buffer = [0u8; STORAGE_SIZE];
        self.driver.read(&mut buffer)?;

        let magic = u16::from_le_bytes([buffer[0], buffer[1]]);
        if magic != MAGIC_HEADER {
            return Err(StorageError::InvalidMagicHeader);
        }

        T::decode(&buffer[MAGIC_HEADER_SIZE..MAGIC_HEADER_SIZE + SIZE])
            .ok_or(StorageError::InvalidData)
    }

    /// Save a record behind the magic header. Unused tail bytes stay erased (0xFF).
    pub fn save<const SIZE: usize, T: Encodable<SIZE>>(
        &mut self,
        record: &T,
    ) -> Result<(), StorageError> {
        if SIZE + MAGIC_HEADER_SIZE > STORAGE_SIZE {
            return Err(StorageError::TooLarge);
        }

        let mut data = [0xFFu8; STORAGE_SIZE];
        data[0..MAGIC_HEADER_SIZE].copy_from_slice(&MAGIC_HEADER.to_le_bytes());
        data[MAGIC_HEADER_SIZE..MAGIC_HEADER_SIZE + SIZE].copy_from_slice(&record.encode());

        self.driver.write(&data)
    }

    pub fn driver_mut(&mut self) -> &mut DRIVER {
        &mut self.driver
    }

    pub fn into_driver(self) -> DRIVER {
        self.driver
    }
}

/// Storage driver bound to a fixed, erase-aligned area of a NOR flash.
///
/// Every write erases the whole area first, so the area must not share an
/// erase block with anything else.
pub struct NorFlashStorageDriver<F: NorFlash, const SIZE: usize> {
    flash: F,
    addr: u32,
}

impl<F: NorFlash, const SIZE: usize> NorFlashStorageDriver<F, SIZE> {
    pub fn new(flash: F, addr: u32) -> Self {
        Self { flash, addr }
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn into_inner(self) -> F {
        self.flash
    }

    #[allow(clippy::cast_possible_truncation)]
    fn erase_len() -> u32 {
        SIZE.div_ceil(F::ERASE_SIZE) as u32 * F::ERASE_SIZE as u32
    }
}

impl<F: NorFlash, const SIZE: usize> StorageDriver<SIZE> for NorFlashStorageDriver<F, SIZE> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), StorageError> {
        self.flash
            .read(self.addr, buffer)
            .map_err(|e| StorageError::Driver(e.kind()))
    }

    fn write(&mut self, buffer: &[u8]) -> Result<(), StorageError> {
        self.flash
            .erase(self.addr, self.addr + Self::erase_len())
            .map_err(|e| StorageError::Driver(e.kind()))?;
        self.flash
            .write(self.addr, buffer)
            .map_err(|e| StorageError::Driver(e.kind()))
    }
}
