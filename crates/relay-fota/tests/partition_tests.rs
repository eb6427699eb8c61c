//! Target bank selection.

use relay_fota::{
    ImageSlot,
    config::{PARTITIONS, PartitionLayout},
    flash::select_target_partition,
};

#[test]
fn user1_running_targets_user2() {
    assert_eq!(select_target_partition(Some(ImageSlot::User1), &PARTITIONS), 0x081);
}

#[test]
fn user2_running_targets_user1() {
    assert_eq!(select_target_partition(Some(ImageSlot::User2), &PARTITIONS), 0x001);
}

#[test]
fn never_selects_the_executing_bank() {
    for slot in [ImageSlot::User1, ImageSlot::User2] {
        let target = select_target_partition(Some(slot), &PARTITIONS);
        assert_ne!(target, slot.base_sector(&PARTITIONS));
    }
}

#[test]
fn unknown_slot_uses_fallback() {
    assert_eq!(select_target_partition(None, &PARTITIONS), 0x001);

    let layout = PartitionLayout {
        fallback_base_sector: 0x0C0,
        ..PARTITIONS
    };
    assert_eq!(select_target_partition(None, &layout), 0x0C0);
}

#[test]
fn slot_ids_round_trip_through_u8() {
    assert_eq!(ImageSlot::from_u8(ImageSlot::User2.as_u8()), Some(ImageSlot::User2));
    assert_eq!(ImageSlot::from_u8(7), None);
    assert_eq!(ImageSlot::User1.other(), ImageSlot::User2);
}
