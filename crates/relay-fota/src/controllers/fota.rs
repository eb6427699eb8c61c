//! FOTA Controller
//!
//! Applies messages from the control-plane FOTA queue to a session.

use core::fmt;

use embedded_storage::nor_flash::NorFlash;

use crate::{
    domain::{
        entity::SessionEvent,
        ports::{BootControl, Network, Watchdog, WriteProtect},
    },
    error::SessionError,
    session::FotaSession,
};

/// Parsed control-plane message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FotaCommand<'a> {
    /// `S<host>:<port>`
    Start(&'a str),
    /// `F`
    RebootIntoUpdate,
}

impl<'a> FotaCommand<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, CommandError> {
        let text = core::str::from_utf8(payload).map_err(|_| CommandError::Encoding)?;
        let text = text.trim_end_matches(['\r', '\n', '\0']);

        if text.is_empty() {
            return Err(CommandError::Empty);
        }
        match text.split_at_checked(1) {
            Some(("S", target)) => Ok(FotaCommand::Start(target)),
            Some(("F", "")) => Ok(FotaCommand::RebootIntoUpdate),
            _ => Err(CommandError::Unknown),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    Encoding,
    Unknown,
    Session(SessionError),
}

impl From<SessionError> for CommandError {
    fn from(err: SessionError) -> Self {
        CommandError::Session(err)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "empty command"),
            CommandError::Encoding => write!(f, "command is not UTF-8"),
            CommandError::Unknown => write!(f, "unknown command"),
            CommandError::Session(err) => write!(f, "{}", err),
        }
    }
}

/// What the caller should do after a command was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAck {
    /// Download running; pause periodic status reports until it closes
    SessionStarted,
    Rebooting,
}

/// FOTA Controller
///
/// Bridges the control-plane client and the session. Holds no state of its
/// own, the session is owned by the platform event loop.
pub struct FotaController;

impl FotaController {
    pub fn new() -> Self {
        Self
    }

    /// Handle one FOTA queue message
    pub fn on_message<N, F, W, B>(
        &self,
        session: &mut FotaSession<N, F, W, B>,
        payload: &[u8],
    ) -> Result<CommandAck, CommandError>
    where
        N: Network,
        F: NorFlash + WriteProtect,
        W: Watchdog,
        B: BootControl,
    {
        let command = FotaCommand::parse(payload).inspect_err(|err| {
            log::warn!("fota: rejected command: {}", err);
        })?;

        match command {
            FotaCommand::Start(target) => {
                log::info!("fota: update requested from {}", target);
                session.start(target)?;
                Ok(CommandAck::SessionStarted)
            }
            FotaCommand::RebootIntoUpdate => {
                if session.is_active() {
                    log::warn!("fota: reboot refused, update in progress");
                    return Err(CommandError::Session(SessionError::InvalidTransition {
                        state: session.state(),
                        event: SessionEvent::RebootIntoUpdate,
                    }));
                }
                session.reboot_into_update()?;
                Ok(CommandAck::Rebooting)
            }
        }
    }
}

impl Default for FotaController {
    fn default() -> Self {
        Self::new()
    }
}
