//! In-memory hardware for session tests.

#![allow(dead_code)]

use std::{cell::RefCell, net::SocketAddrV4, rc::Rc};

use embedded_io::ErrorKind;
use embedded_storage::nor_flash::{ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash};
use relay_fota::{
    FotaConfig, FotaSession, ImageSlot, ReconnectPolicy, UpgradeFlag,
    config::{CHUNK_SIZE, FOTA, SECTOR_SIZE},
    domain::ports::{BootControl, Connection, Network, Watchdog, WriteProtect},
    error::{BootError, FlashError, NetworkError},
    flash::SectorWriter,
};
use relay_core::storage::StorageError;

pub const FLASH_SIZE: usize = 0x100 * SECTOR_SIZE;

pub struct MockFlash {
    pub data: Vec<u8>,
    pub erases: Vec<(u32, u32)>,
    /// `(offset, len)` of every program call
    pub writes: Vec<(u32, usize)>,
    pub fail_erase_at: Option<u32>,
    pub fail_write_at: Option<u32>,
    pub protect_fails: bool,
    pub unlocked: bool,
}

impl MockFlash {
    pub fn new() -> Self {
        Self {
            data: vec![0xFF; FLASH_SIZE],
            erases: Vec::new(),
            writes: Vec::new(),
            fail_erase_at: None,
            fail_write_at: None,
            protect_fails: false,
            unlocked: false,
        }
    }

    pub fn sector(&self, sector: u32) -> &[u8] {
        let start = sector as usize * SECTOR_SIZE;
        &self.data[start..start + SECTOR_SIZE]
    }

    pub fn written_sectors(&self) -> Vec<u32> {
        self.writes
            .iter()
            .map(|(offset, _)| offset / SECTOR_SIZE as u32)
            .collect()
    }
}

impl ErrorType for MockFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for MockFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        bytes.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for MockFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if self.fail_erase_at == Some(from) {
            return Err(NorFlashErrorKind::Other);
        }
        if from as usize % SECTOR_SIZE != 0 || to as usize % SECTOR_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        if to as usize > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        self.erases.push((from, to));
        self.data[from as usize..to as usize].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_write_at == Some(offset) {
            return Err(NorFlashErrorKind::Other);
        }
        let start = offset as usize;
        if start + bytes.len() > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        self.writes.push((offset, bytes.len()));
        for (cell, byte) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        Ok(())
    }
}

impl WriteProtect for MockFlash {
    fn disable_write_protection(&mut self) -> Result<(), FlashError> {
        if self.protect_fails {
            return Err(FlashError::WriteProtect);
        }
        self.unlocked = true;
        Ok(())
    }
}

#[derive(Default)]
pub struct MockWatchdog {
    pub feeds: u32,
}

impl Watchdog for MockWatchdog {
    fn feed(&mut self) {
        self.feeds += 1;
    }
}

#[derive(Default)]
pub struct NetLog {
    pub resolved: Vec<String>,
    pub connected: Vec<SocketAddrV4>,
    /// One entry per request written
    pub sent: Vec<String>,
    pub closes: u32,
    pub fail_resolve: bool,
    pub fail_connect: bool,
    pub fail_send: bool,
}

pub type SharedLog = Rc<RefCell<NetLog>>;

pub struct MockConnection {
    log: SharedLog,
}

impl embedded_io::ErrorType for MockConnection {
    type Error = ErrorKind;
}

impl embedded_io::Write for MockConnection {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut log = self.log.borrow_mut();
        if log.fail_send {
            return Err(ErrorKind::BrokenPipe);
        }
        log.sent.push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for MockConnection {
    fn close(&mut self) {
        self.log.borrow_mut().closes += 1;
    }
}

pub struct MockNetwork {
    pub log: SharedLog,
}

impl Network for MockNetwork {
    type Connection = MockConnection;

    fn resolve(&mut self, host: &str) -> Result<(), NetworkError> {
        let mut log = self.log.borrow_mut();
        if log.fail_resolve {
            return Err(NetworkError::Resolve);
        }
        log.resolved.push(host.to_owned());
        Ok(())
    }

    fn connect(&mut self, addr: SocketAddrV4) -> Result<MockConnection, NetworkError> {
        let mut log = self.log.borrow_mut();
        if log.fail_connect {
            return Err(NetworkError::Connect);
        }
        log.connected.push(addr);
        Ok(MockConnection {
            log: Rc::clone(&self.log),
        })
    }
}

pub struct MockBoot {
    pub executing: Option<ImageSlot>,
    pub flags: Vec<UpgradeFlag>,
    pub reboots: u32,
    /// Successful flag writes before every further one fails, unlimited if `None`
    pub flag_writes_left: Option<u32>,
}

impl MockBoot {
    pub fn running(executing: Option<ImageSlot>) -> Self {
        Self {
            executing,
            flags: Vec::new(),
            reboots: 0,
            flag_writes_left: None,
        }
    }
}

impl BootControl for MockBoot {
    fn executing_slot(&mut self) -> Option<ImageSlot> {
        self.executing
    }

    fn set_upgrade_flag(&mut self, flag: UpgradeFlag) -> Result<(), BootError> {
        match &mut self.flag_writes_left {
            Some(0) => {
                return Err(BootError::Storage(StorageError::Driver(
                    NorFlashErrorKind::Other,
                )));
            }
            Some(left) => *left -= 1,
            None => {}
        }
        self.flags.push(flag);
        Ok(())
    }

    fn reboot(&mut self) {
        self.reboots += 1;
    }
}

pub type TestSession = FotaSession<MockNetwork, MockFlash, MockWatchdog, MockBoot>;

pub struct Harness {
    pub session: TestSession,
    pub net: SharedLog,
}

pub fn harness(executing: Option<ImageSlot>) -> Harness {
    build(MockFlash::new(), MockBoot::running(executing), FOTA)
}

pub fn harness_with_policy(policy: ReconnectPolicy) -> Harness {
    let config = FotaConfig {
        reconnect: policy,
        ..FOTA
    };
    build(
        MockFlash::new(),
        MockBoot::running(Some(ImageSlot::User1)),
        config,
    )
}

pub fn build(
    flash: MockFlash,
    boot: MockBoot,
    config: FotaConfig,
) -> Harness {
    let net = SharedLog::default();
    let network = MockNetwork {
        log: Rc::clone(&net),
    };
    let writer = SectorWriter::new(flash, MockWatchdog::default());
    Harness {
        session: FotaSession::new(network, writer, boot, config),
        net,
    }
}

/// Length-prefixed response frame
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut bytes = (payload.len() as u16).to_le_bytes().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

/// Image bytes that are never zero, so padding is visible
pub fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 + 1).collect()
}

/// Feed `image` as responses, one frame per outstanding request.
///
/// Ends with a short (possibly empty) chunk.
pub fn serve<F, B>(
    session: &mut FotaSession<MockNetwork, F, MockWatchdog, B>,
    image: &[u8],
) where
    F: NorFlash + WriteProtect,
    B: BootControl,
{
    let mut chunks = image.chunks(CHUNK_SIZE);
    loop {
        assert!(session.awaiting_response(), "no request outstanding");
        let chunk = chunks.next().unwrap_or(&[]);
        session.on_data(&frame(chunk)).unwrap();
        if chunk.len() < CHUNK_SIZE {
            break;
        }
    }
}

pub fn request(index: u32) -> String {
    format!("GET 0x{:06X}:0x000400;\n", index as usize * CHUNK_SIZE)
}
