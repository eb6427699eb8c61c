//! # Relay FOTA
//!
//! Firmware-over-the-air update engine for a dual-bank relay controller.
//!
//! The image is pulled over one TCP connection in fixed-size chunks
//! (`GET 0x<offset>:0x<length>;\n` requests, length-prefixed binary
//! responses), collected into erase-sector sized buffers and written into
//! the flash bank that is *not* executing. Only after the last sector is on
//! flash is the boot flag switched to "finished" and the device rebooted.
//!
//! The engine is callback driven: the platform's event loop forwards
//! resolver, connect, receive and disconnect notifications to a
//! [`FotaSession`], which reacts synchronously and returns. Hardware is
//! reached through the ports in [`domain::ports`] and the
//! `embedded-storage` / `embedded-io` traits.

#![no_std]

pub mod config;
pub mod controllers;
pub mod domain;
pub mod error;
pub mod flash;
pub mod infrastructure;
pub mod protocol;
pub mod session;

pub use config::{FotaConfig, PartitionLayout, ReconnectPolicy};
pub use domain::entity::{ImageSlot, Outcome, SessionEvent, SessionState, UpgradeFlag};
pub use error::{FailureReason, SessionError};
pub use session::FotaSession;
