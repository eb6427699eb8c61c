use crate::{config::PartitionLayout, domain::entity::ImageSlot};

/// Base sector of the bank the download may overwrite.
///
/// Never the executing bank. If the executing bank is unknown the layout's
/// fallback sector is returned, which may be live code.
pub fn select_target_partition(executing: Option<ImageSlot>, layout: &PartitionLayout) -> u32 {
    match executing {
        Some(slot) => slot.other().base_sector(layout),
        None => {
            log::warn!(
                "flash: executing image unknown, falling back to sector 0x{:03X}; this may overwrite live firmware",
                layout.fallback_base_sector
            );
            layout.fallback_base_sector
        }
    }
}
