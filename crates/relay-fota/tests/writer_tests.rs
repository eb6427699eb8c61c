//! Sector erase/program sequencing.

mod common;

use common::{MockFlash, MockWatchdog};
use embedded_storage::nor_flash::NorFlashErrorKind;
use relay_fota::{config::SECTOR_SIZE, error::FlashError, flash::SectorWriter};

const SECTOR: u32 = 0x081;
const ADDR: u32 = SECTOR * SECTOR_SIZE as u32;

fn pattern() -> [u8; SECTOR_SIZE] {
    let mut data = [0u8; SECTOR_SIZE];
    for (i, byte) in data.iter_mut().enumerate() {
        *byte = (i % 7) as u8;
    }
    data
}

#[test]
fn erases_then_programs_the_whole_sector() {
    let mut writer = SectorWriter::new(MockFlash::new(), MockWatchdog::default());
    let data = pattern();

    writer.write_sector(SECTOR, &data).unwrap();

    let flash = writer.flash();
    assert_eq!(flash.erases, vec![(ADDR, ADDR + SECTOR_SIZE as u32)]);
    assert_eq!(flash.writes, vec![(ADDR, SECTOR_SIZE)]);
    assert_eq!(flash.sector(SECTOR), &data[..]);
    assert_eq!(writer.watchdog().feeds, 4);
}

#[test]
fn sector_past_address_space_is_rejected() {
    let mut writer = SectorWriter::new(MockFlash::new(), MockWatchdog::default());
    let out_of_bounds = Err(FlashError::Erase(NorFlashErrorKind::OutOfBounds));

    assert_eq!(writer.write_sector(0x10_0000, &pattern()), out_of_bounds);
    // Starts in range, ends at 4 GiB
    assert_eq!(writer.write_sector(0xF_FFFF, &pattern()), out_of_bounds);

    assert!(writer.flash().erases.is_empty());
    assert!(writer.flash().writes.is_empty());
    assert_eq!(writer.watchdog().feeds, 0);
}

#[test]
fn erase_failure_skips_programming() {
    let mut flash = MockFlash::new();
    flash.fail_erase_at = Some(ADDR);
    let mut writer = SectorWriter::new(flash, MockWatchdog::default());

    let result = writer.write_sector(SECTOR, &pattern());

    assert_eq!(result, Err(FlashError::Erase(NorFlashErrorKind::Other)));
    assert!(writer.flash().writes.is_empty());
    assert_eq!(writer.watchdog().feeds, 2);
}

#[test]
fn program_failure_is_reported() {
    let mut flash = MockFlash::new();
    flash.fail_write_at = Some(ADDR);
    let mut writer = SectorWriter::new(flash, MockWatchdog::default());

    let result = writer.write_sector(SECTOR, &pattern());

    assert_eq!(result, Err(FlashError::Write(NorFlashErrorKind::Other)));
    assert_eq!(writer.watchdog().feeds, 4);
}

#[test]
fn out_of_range_sector_keeps_driver_error_kind() {
    let mut writer = SectorWriter::new(MockFlash::new(), MockWatchdog::default());

    let result = writer.write_sector(0x200, &pattern());

    assert_eq!(result, Err(FlashError::Erase(NorFlashErrorKind::OutOfBounds)));
}

#[test]
fn unlock_reports_write_protect_failure() {
    let mut flash = MockFlash::new();
    flash.protect_fails = true;
    let mut writer = SectorWriter::new(flash, MockWatchdog::default());

    assert_eq!(writer.unlock(), Err(FlashError::WriteProtect));
    assert!(!writer.flash().unlocked);
}
