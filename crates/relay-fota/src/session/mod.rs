mod buffer;
mod controller;

pub use buffer::{SectorBuffer, SectorFill};
pub use controller::FotaSession;
