//! FOTA session state machine.
//!
//! ```text
//! Idle/Closed --start--> Resolving --resolved--> Connecting --connected--> Downloading
//!      |                     |                       |                       |   ^
//!      +--literal IPv4-------|---------------------->|                       +---+ full chunk
//!                            v                       v                       |
//!                          Closed               Closed (retry?)        short chunk
//!                                                                            v
//!                                           Closed <--disconnected--- Finishing
//! ```

use core::net::{Ipv4Addr, SocketAddrV4};

use embedded_io::{Error as _, ErrorKind, Write as _};
use embedded_storage::nor_flash::NorFlash;
use relay_core::net::Endpoint;

use super::buffer::{SectorBuffer, SectorFill};
use crate::{
    config::{CHUNK_SIZE, FotaConfig, ReconnectPolicy},
    domain::{
        entity::{Outcome, SessionEvent, SessionState, UpgradeFlag},
        ports::{BootControl, Connection, Network, Watchdog, WriteProtect},
    },
    error::{FailureReason, ProtocolError, SessionError},
    flash::{SectorWriter, select_target_partition},
    protocol::{FrameReader, chunk_offset, encode_request},
};

/// One firmware download, driven by network events.
///
/// Every `on_*` method is a state machine entry point. Events that are not
/// valid in the current state return [`SessionError::InvalidTransition`]
/// and change nothing.
pub struct FotaSession<N, F, W, B>
where
    N: Network,
{
    network: N,
    writer: SectorWriter<F, W>,
    boot: B,
    config: FotaConfig,

    state: SessionState,
    target: Option<Endpoint>,
    connection: Option<N::Connection>,
    frames: FrameReader,
    buffer: SectorBuffer,

    base_sector: u32,
    sector_cursor: u32,
    bytes_received: u32,
    awaiting_response: bool,
    completed: bool,
    outcome: Option<Outcome>,
    attempt: u8,
}

impl<N, F, W, B> FotaSession<N, F, W, B>
where
    N: Network,
    F: NorFlash + WriteProtect,
    W: Watchdog,
    B: BootControl,
{
    pub fn new(network: N, writer: SectorWriter<F, W>, boot: B, config: FotaConfig) -> Self {
        Self {
            network,
            writer,
            boot,
            config,
            state: SessionState::Idle,
            target: None,
            connection: None,
            frames: FrameReader::new(),
            buffer: SectorBuffer::new(),
            base_sector: 0,
            sector_cursor: 0,
            bytes_received: 0,
            awaiting_response: false,
            completed: false,
            outcome: None,
            attempt: 0,
        }
    }

    /// Start downloading from `target` (`host:port`).
    pub fn start(&mut self, target: &str) -> Result<(), SessionError> {
        self.ensure(&[SessionState::Idle, SessionState::Closed], SessionEvent::Trigger)?;
        let endpoint = Endpoint::parse(target)?;

        log::info!("fota: starting update from {}", endpoint);
        self.target = Some(endpoint);
        self.outcome = None;
        self.attempt = 0;
        self.begin()
    }

    /// Reconnect after a connection failure with a scheduled retry.
    pub fn retry(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Closed || self.outcome != Some(Outcome::RetryScheduled) {
            return Err(SessionError::InvalidTransition {
                state: self.state,
                event: SessionEvent::Retry,
            });
        }

        log::info!("fota: retrying, attempt {}", self.attempt.saturating_add(1));
        self.outcome = None;
        self.begin()
    }

    /// Name resolution finished. `None` means the host has no address.
    pub fn on_resolved(&mut self, addr: Option<Ipv4Addr>) -> Result<(), SessionError> {
        self.ensure(&[SessionState::Resolving], SessionEvent::Resolved)?;

        match addr {
            Some(ip) => {
                log::debug!("fota: resolved to {}", ip);
                self.connect(ip)
            }
            None => Err(self.fail(FailureReason::Resolve)),
        }
    }

    pub fn on_connected(&mut self) -> Result<(), SessionError> {
        self.ensure(&[SessionState::Connecting], SessionEvent::Connected)?;

        if let Err(err) = self.writer.unlock() {
            return Err(self.fail(err.into()));
        }

        let executing = self.boot.executing_slot();
        self.base_sector = select_target_partition(executing, &self.config.layout);
        log::info!(
            "fota: running {}, writing to sector 0x{:03X}",
            executing.map_or("unknown", |slot| slot.name()),
            self.base_sector
        );

        self.sector_cursor = 0;
        self.bytes_received = 0;
        self.completed = false;
        self.buffer.restart();
        self.frames.clear();

        if self.boot.set_upgrade_flag(UpgradeFlag::Started).is_err() {
            return Err(self.fail(FailureReason::BootFlag));
        }

        self.state = SessionState::Downloading;
        self.request_next()
    }

    /// Bytes received on the download connection.
    ///
    /// A response may arrive split over several calls.
    #[allow(clippy::cast_possible_truncation)]
    pub fn on_data(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        match self.state {
            SessionState::Downloading => {}
            SessionState::Finishing => {
                log::debug!("fota: ignoring {} bytes after last chunk", bytes.len());
                return Ok(());
            }
            state => {
                return Err(SessionError::InvalidTransition {
                    state,
                    event: SessionEvent::Data,
                });
            }
        }

        if !self.awaiting_response {
            let unexpected = ProtocolError::TrailingData { extra: bytes.len() };
            return Err(self.fail(unexpected.into()));
        }
        if let Err(err) = self.frames.push(bytes) {
            return Err(self.fail(err.into()));
        }

        let appended: Result<_, FailureReason> = match self.frames.frame() {
            Ok(Some(chunk)) => self
                .buffer
                .append(&chunk)
                .map(|fill| Some((chunk.len(), fill)))
                .map_err(Into::into),
            Ok(None) => Ok(None),
            Err(err) => Err(err.into()),
        };
        let (len, fill) = match appended {
            Ok(Some(appended)) => appended,
            Ok(None) => return Ok(()),
            Err(reason) => return Err(self.fail(reason)),
        };

        self.frames.clear();
        self.awaiting_response = false;
        self.bytes_received += len as u32;
        log::trace!(
            "fota: chunk {} ({} bytes)",
            self.buffer.chunk_index() - 1,
            len
        );

        match fill {
            SectorFill::Partial => self.request_next(),
            SectorFill::Full => {
                self.flush_sector()?;
                self.request_next()
            }
            SectorFill::FullAndLast => {
                if self.buffer.is_empty() {
                    self.buffer.reset();
                } else {
                    self.flush_sector()?;
                }
                self.completed = true;
                log::info!(
                    "fota: download complete, {} bytes in {} sectors",
                    self.bytes_received,
                    self.sector_cursor
                );
                if let Some(connection) = self.connection.as_mut() {
                    connection.close();
                }
                self.state = SessionState::Finishing;
                Ok(())
            }
        }
    }

    /// The download connection is gone.
    pub fn on_disconnected(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Connecting => self.connection_failed(),
            SessionState::Downloading => Err(self.fail(FailureReason::PrematureDisconnect)),
            SessionState::Finishing => self.commit(),
            SessionState::Closed => {
                log::debug!("fota: disconnect after close ignored");
                Ok(())
            }
            state => Err(SessionError::InvalidTransition {
                state,
                event: SessionEvent::Disconnected,
            }),
        }
    }

    /// The transport reported an error on the download connection.
    pub fn on_connection_error(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Connecting => self.connection_failed(),
            SessionState::Downloading => {
                Err(self.fail(FailureReason::Transport(ErrorKind::ConnectionReset)))
            }
            SessionState::Finishing => self.commit(),
            SessionState::Closed => Ok(()),
            state => Err(SessionError::InvalidTransition {
                state,
                event: SessionEvent::ConnectionError,
            }),
        }
    }

    /// Boot the other bank without downloading, e.g. after a manual flash.
    pub fn reboot_into_update(&mut self) -> Result<(), SessionError> {
        self.ensure(
            &[SessionState::Idle, SessionState::Closed],
            SessionEvent::RebootIntoUpdate,
        )?;

        if self.boot.set_upgrade_flag(UpgradeFlag::Finished).is_err() {
            log::error!("fota: cannot set upgrade flag");
            return Err(SessionError::Aborted(FailureReason::BootFlag));
        }
        log::info!("fota: rebooting into update partition");
        self.boot.reboot();
        Ok(())
    }

    fn begin(&mut self) -> Result<(), SessionError> {
        let Some(target) = self.target.as_ref() else {
            return Err(SessionError::InvalidTransition {
                state: self.state,
                event: SessionEvent::Trigger,
            });
        };
        self.attempt = self.attempt.saturating_add(1);
        self.completed = false;

        if let Some(ip) = target.literal_ip() {
            return self.connect(ip);
        }

        self.state = SessionState::Resolving;
        match self.network.resolve(&target.host) {
            Ok(()) => Ok(()),
            Err(err) => {
                log::error!("fota: {}", err);
                Err(self.fail(FailureReason::Resolve))
            }
        }
    }

    fn connect(&mut self, ip: Ipv4Addr) -> Result<(), SessionError> {
        let port = self.target.as_ref().map_or(0, |target| target.port);
        let addr = SocketAddrV4::new(ip, port);

        self.state = SessionState::Connecting;
        match self.network.connect(addr) {
            Ok(connection) => {
                log::debug!("fota: connecting to {}", addr);
                self.connection = Some(connection);
                Ok(())
            }
            Err(err) => {
                log::error!("fota: {}", err);
                self.connection_failed()
            }
        }
    }

    fn connection_failed(&mut self) -> Result<(), SessionError> {
        let outcome = match self.config.reconnect {
            ReconnectPolicy::Reschedule { max_attempts } if self.attempt < max_attempts => {
                log::warn!(
                    "fota: connection failed, retry {}/{} scheduled",
                    self.attempt,
                    max_attempts
                );
                Outcome::RetryScheduled
            }
            _ => {
                log::error!("fota: connection failed");
                Outcome::Failed(FailureReason::Connect)
            }
        };
        self.finish(outcome);
        Err(SessionError::Aborted(FailureReason::Connect))
    }

    fn request_next(&mut self) -> Result<(), SessionError> {
        let offset = chunk_offset(self.buffer.chunk_index());
        #[allow(clippy::cast_possible_truncation)]
        let request = encode_request(offset, CHUNK_SIZE as u32);

        let sent = match self.connection.as_mut() {
            Some(connection) => connection
                .write_all(request.as_bytes())
                .map_err(|err| err.kind()),
            None => Err(ErrorKind::NotConnected),
        };
        match sent {
            Ok(()) => {
                self.awaiting_response = true;
                Ok(())
            }
            Err(kind) => Err(self.fail(FailureReason::Transport(kind))),
        }
    }

    fn flush_sector(&mut self) -> Result<(), SessionError> {
        if self.sector_cursor >= self.config.layout.partition_sectors {
            return Err(self.fail(FailureReason::ImageTooLarge));
        }

        let sector = self.base_sector + self.sector_cursor;
        if let Err(err) = self.writer.write_sector(sector, self.buffer.sector()) {
            return Err(self.fail(err.into()));
        }
        self.buffer.reset();
        self.sector_cursor += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SessionError> {
        self.connection = None;
        if !self.completed {
            return Err(self.fail(FailureReason::PrematureDisconnect));
        }
        if self.boot.set_upgrade_flag(UpgradeFlag::Finished).is_err() {
            return Err(self.fail(FailureReason::BootFlag));
        }

        self.finish(Outcome::Updated);
        log::info!("fota: update finished, rebooting");
        self.boot.reboot();
        Ok(())
    }

    fn fail(&mut self, reason: FailureReason) -> SessionError {
        log::error!("fota: update aborted: {}", reason);
        self.completed = false;
        self.finish(Outcome::Failed(reason));
        SessionError::Aborted(reason)
    }

    fn finish(&mut self, outcome: Outcome) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        self.frames.clear();
        self.buffer.reset();
        self.awaiting_response = false;
        self.state = SessionState::Closed;
        self.outcome = Some(outcome);
    }

    fn ensure(&self, allowed: &[SessionState], event: SessionEvent) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                state: self.state,
                event,
            })
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// How the last session ended, `None` while one is running
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Whether a download is in progress
    pub fn is_active(&self) -> bool {
        !matches!(self.state, SessionState::Idle | SessionState::Closed)
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn chunk_index(&self) -> u32 {
        self.buffer.chunk_index()
    }

    pub fn sector_cursor(&self) -> u32 {
        self.sector_cursor
    }

    pub fn base_sector(&self) -> u32 {
        self.base_sector
    }

    pub fn bytes_received(&self) -> u32 {
        self.bytes_received
    }

    pub fn awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    pub fn target(&self) -> Option<&Endpoint> {
        self.target.as_ref()
    }

    pub fn attempt(&self) -> u8 {
        self.attempt
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn boot(&self) -> &B {
        &self.boot
    }

    pub fn writer(&self) -> &SectorWriter<F, W> {
        &self.writer
    }

    /// Hand the hardware back, dropping any open connection
    pub fn into_parts(self) -> (N, SectorWriter<F, W>, B) {
        (self.network, self.writer, self.boot)
    }
}
