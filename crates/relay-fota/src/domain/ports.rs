use core::net::SocketAddrV4;

use crate::{
    domain::entity::{ImageSlot, UpgradeFlag},
    error::{BootError, FlashError, NetworkError},
};

/// Established download connection.
///
/// Requests are written through [`embedded_io::Write`]; responses arrive
/// as [`FotaSession::on_data`](crate::FotaSession::on_data) events.
pub trait Connection: embedded_io::Write {
    /// Start closing from this side. Completion is reported as a
    /// disconnect event.
    fn close(&mut self);
}

/// Name resolution and connect, both started here and finished by an
/// event delivered to the session.
pub trait Network {
    type Connection: Connection;

    /// Start resolving `host`. The result arrives through `on_resolved`.
    fn resolve(&mut self, host: &str) -> Result<(), NetworkError>;

    /// Start connecting to `addr`. The connection is usable once
    /// `on_connected` is delivered.
    fn connect(&mut self, addr: SocketAddrV4) -> Result<Self::Connection, NetworkError>;
}

/// Flash write-protection control
pub trait WriteProtect {
    fn disable_write_protection(&mut self) -> Result<(), FlashError>;
}

/// Hardware watchdog keep-alive
pub trait Watchdog {
    fn feed(&mut self);
}

/// Boot selector and reset
pub trait BootControl {
    /// Bank the running image was booted from, if known
    fn executing_slot(&mut self) -> Option<ImageSlot>;

    fn set_upgrade_flag(&mut self, flag: UpgradeFlag) -> Result<(), BootError>;

    fn reboot(&mut self);
}
