mod partition;
mod writer;

pub use partition::select_target_partition;
pub use writer::SectorWriter;
