use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind};

use crate::{
    config::SECTOR_SIZE,
    domain::ports::{Watchdog, WriteProtect},
    error::FlashError,
};

/// Erases and programs whole sectors, keeping the watchdog fed around
/// every blocking flash operation.
pub struct SectorWriter<F, W> {
    flash: F,
    watchdog: W,
}

impl<F, W> SectorWriter<F, W>
where
    F: NorFlash,
    W: Watchdog,
{
    pub fn new(flash: F, watchdog: W) -> Self {
        Self { flash, watchdog }
    }

    /// Write `data` to absolute sector `sector`.
    ///
    /// A failed erase skips programming. A sector whose end address does not
    /// fit in `u32` is rejected as `Erase(OutOfBounds)` before any flash
    /// access. `data` is only read.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_sector(&mut self, sector: u32, data: &[u8; SECTOR_SIZE]) -> Result<(), FlashError> {
        let size = SECTOR_SIZE as u32;
        let Some((addr, end)) = sector
            .checked_mul(size)
            .and_then(|addr| Some((addr, addr.checked_add(size)?)))
        else {
            log::error!("flash: sector 0x{:X} is past the address space", sector);
            return Err(FlashError::Erase(NorFlashErrorKind::OutOfBounds));
        };

        self.watchdog.feed();
        let erased = self.flash.erase(addr, end);
        self.watchdog.feed();
        if let Err(e) = erased {
            log::error!("flash: erase of sector 0x{:03X} failed: {:?}", sector, e.kind());
            return Err(FlashError::Erase(e.kind()));
        }

        self.watchdog.feed();
        let written = self.flash.write(addr, data);
        self.watchdog.feed();
        if let Err(e) = written {
            log::error!("flash: write of sector 0x{:03X} failed: {:?}", sector, e.kind());
            return Err(FlashError::Write(e.kind()));
        }

        log::debug!("flash: sector 0x{:03X} written", sector);
        Ok(())
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn watchdog(&self) -> &W {
        &self.watchdog
    }

    pub fn into_parts(self) -> (F, W) {
        (self.flash, self.watchdog)
    }
}

impl<F, W> SectorWriter<F, W>
where
    F: WriteProtect,
{
    pub fn unlock(&mut self) -> Result<(), FlashError> {
        self.flash.disable_write_protection()
    }
}
